use crate::{
    cli::handlers::commons::{self, AssumeArgs, ResolveArgs},
    core::processor::{BulkRequest, Processor},
    system::executor::{self, SystemRunner},
};
use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Runs one command in every account matching the filters."
)]
struct XargsArgs {
    /// Tag filters (`name:regex` or `regex`) or a single account id.
    filters: Vec<String>,
    /// The command line to run, e.g. "aws s3 ls".
    #[arg(short, long)]
    command: String,
    #[command(flatten)]
    resolve: ResolveArgs,
    #[command(flatten)]
    assume: AssumeArgs,
    /// Skip the typed confirmation.
    #[arg(short, long)]
    yes: bool,
    /// Reuse the role and profile picked for the first account.
    #[arg(long)]
    pin: bool,
    #[arg(long)]
    no_progress: bool,
}

/// The main handler for the `xargs` command. Prints a JSON object keyed by
/// account id.
pub fn handle(args: Vec<String>) -> Result<()> {
    let Some(xargs_args) = commons::parse_args::<XargsArgs>(&args)? else {
        return Ok(());
    };
    let command = executor::split_command(&xargs_args.command)?;
    let session = commons::open_session(&xargs_args.resolve, &xargs_args.assume)?;

    let processor = Processor::new(session.grapher, session.options, Arc::new(SystemRunner));
    let request = BulkRequest {
        args: xargs_args.filters,
        role_names: xargs_args.resolve.role,
        profile_names: xargs_args.resolve.profile,
        command,
        skip_confirm: xargs_args.yes,
        pin_selection: xargs_args.pin,
        show_progress: !xargs_args.no_progress,
    };

    let results = processor.exec(&request)?;
    let failures = results
        .values()
        .filter(|r| r.error.is_some() || r.exit_code != 0)
        .count();
    println!("{}", serde_json::to_string_pretty(&results)?);

    if failures > 0 {
        eprintln!(
            "{} {} of {} account(s) did not succeed.",
            "Warning:".yellow().bold(),
            failures,
            results.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xargs_flags() {
        let args: Vec<String> = ["env:prod", "-c", "aws s3 ls", "--yes", "--pin", "-r", "deploy"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let parsed = XargsArgs::try_parse_from(&args).unwrap();
        assert_eq!(parsed.filters, vec!["env:prod"]);
        assert_eq!(parsed.command, "aws s3 ls");
        assert!(parsed.yes && parsed.pin && !parsed.no_progress);
        assert_eq!(parsed.resolve.role, vec!["deploy"]);
    }

    #[test]
    fn test_command_is_required() {
        let args = vec!["env:prod".to_string()];
        assert!(XargsArgs::try_parse_from(&args).is_err());
    }
}
