use crate::{
    cli::handlers::commons::{self, AssumeArgs, ResolveArgs},
    models::Credentials,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;

#[derive(ValueEnum, Debug, Default, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// `export VAR=value` lines for `eval`.
    #[default]
    Env,
    Json,
}

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Resolves one account and prints credentials for the chosen role."
)]
struct TravelArgs {
    /// An account id (optionally `id/role`) or tag filters.
    targets: Vec<String>,
    #[command(flatten)]
    resolve: ResolveArgs,
    #[command(flatten)]
    assume: AssumeArgs,
    #[arg(short, long, value_enum, default_value_t)]
    format: OutputFormat,
}

/// The main handler for the `travel` command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let Some(travel_args) = commons::parse_args::<TravelArgs>(&args)? else {
        return Ok(());
    };
    let session = commons::open_session(&travel_args.resolve, &travel_args.assume)?;

    let path = session.grapher.resolve(
        &travel_args.targets,
        &travel_args.resolve.role,
        &travel_args.resolve.profile,
    )?;
    eprintln!("{} {}", "Traveling".green().bold(), path);

    let credentials = path
        .traverse(&session.options)
        .with_context(|| format!("Failed to traverse {}", path))?;

    print!("{}", render(&credentials, travel_args.format)?);
    Ok(())
}

fn render(credentials: &Credentials, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(credentials)?)),
        OutputFormat::Env => {
            let mut out = String::new();
            for (key, value) in credentials.to_env_vars() {
                let quoted = shlex::try_quote(&value)
                    .with_context(|| format!("Cannot quote value of {}", key))?;
                out.push_str(&format!("export {}={}\n", key, quoted));
            }
            Ok(out)
        }
    }
}
