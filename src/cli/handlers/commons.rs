// src/cli/handlers/commons.rs

// Shared flag groups and the wiring from settings to live collaborators.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, error::ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    core::{
        catalog_loader,
        grapher::Grapher,
        path::TraverseOptions,
        settings::Settings,
    },
    system::{
        mfa::{self, DefaultMfaPrompt},
        profiles::MultiStore,
        prompt,
        sts::AwsCliAssumer,
    },
};

/// Parses handler arguments. `Ok(None)` means help or version was printed.
pub fn parse_args<T: Parser>(args: &[String]) -> Result<Option<T>> {
    match T::try_parse_from(args) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Flags that steer resolution.
#[derive(Args, Debug, Default, Clone)]
pub struct ResolveArgs {
    /// Preferred role name (repeatable).
    #[arg(short, long = "role")]
    pub role: Vec<String>,
    /// Preferred origin profile (repeatable).
    #[arg(short, long = "profile")]
    pub profile: Vec<String>,
    /// Selection prompt: `select` or `fuzzy`.
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Flags that steer role assumption.
#[derive(Args, Debug, Default, Clone)]
pub struct AssumeArgs {
    #[arg(long)]
    pub session_name: Option<String>,
    /// Requested credential lifetime, in seconds.
    #[arg(long)]
    pub lifetime: Option<u64>,
    /// One-time code to use instead of prompting.
    #[arg(long)]
    pub mfa_code: Option<String>,
    /// MFA device ARN; derived from the caller identity when absent.
    #[arg(long)]
    pub mfa_serial: Option<String>,
    /// Inline session policy (JSON) attached to every assumption.
    #[arg(long)]
    pub policy: Option<String>,
}

/// Everything a command needs to resolve and traverse.
#[derive(Debug)]
pub struct Session {
    pub grapher: Grapher,
    pub options: TraverseOptions,
}

/// Loads settings and catalogs and wires the live collaborators.
pub fn open_session(resolve: &ResolveArgs, assume: &AssumeArgs) -> Result<Session> {
    let settings = Settings::load().context("Failed to load settings")?;

    let prompt_name = resolve.prompt.as_deref().unwrap_or(&settings.prompt);
    let selector = prompt::prompt_by_name(prompt_name)?;

    let catalog_dir = settings.catalog_dir()?;
    let pack = catalog_loader::load_pack(&catalog_dir)
        .with_context(|| format!("Failed to load catalogs from '{}'", catalog_dir.display()))?;
    if pack.is_empty() {
        bail!("No accounts found in '{}'.", catalog_dir.display());
    }

    let store = MultiStore::default_chain(settings.profiles_file()?);
    let mut options = TraverseOptions::new(
        Arc::new(store),
        Arc::new(AwsCliAssumer::new(settings.aws_cli.clone())),
        Arc::new(DefaultMfaPrompt::default()),
    );
    options.session_name = assume
        .session_name
        .clone()
        .unwrap_or_else(|| settings.session_name());
    options.lifetime = assume
        .lifetime
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.lifetime());
    options.default_region = settings.default_region.clone();
    options.policy = assume.policy.clone();
    options.mfa_serial = assume.mfa_serial.clone();
    options.mfa_code = assume
        .mfa_code
        .as_deref()
        .map(mfa::validate_code)
        .transpose()?;

    Ok(Session {
        grapher: Grapher::new(Arc::new(pack), selector),
        options,
    })
}
