use crate::{
    cli::handlers::commons,
    core::{catalog_loader, settings::Settings},
    system::profiles::{FileStore, MultiStore, ProfileStore, PromptStore, WritableStore},
};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manages stored long-lived credentials.")]
struct ProfilesArgs {
    #[command(subcommand)]
    action: ProfilesAction,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum ProfilesAction {
    /// Asks for an access key pair and stores it.
    Add { name: String },
    /// Reports whether a profile is stored.
    Check { name: String },
    /// Lists the catalog's profiles that are stored, with their access key ids.
    #[command(alias = "ls")]
    List,
    /// Prints a stored profile's key pair.
    Show { name: String },
    /// Removes a profile from every store.
    #[command(alias = "rm")]
    Delete { name: String },
}

/// The main handler for the `profiles` command.
pub fn handle(args: Vec<String>) -> Result<()> {
    let Some(profiles_args) = commons::parse_args::<ProfilesArgs>(&args)? else {
        return Ok(());
    };
    let settings = Settings::load().context("Failed to load settings")?;
    let file = settings.profiles_file()?;

    match profiles_args.action {
        ProfilesAction::Add { name } => {
            let credentials = PromptStore::default().lookup(&name)?;
            FileStore::new(&file).write(&name, &credentials)?;
            println!("{} '{}' stored in {}", "Profile".green(), name.cyan(), file.display());
        }
        ProfilesAction::Check { name } => {
            if !MultiStore::default_chain(&file).check(&name) {
                bail!("Profile '{}' is not stored.", name);
            }
            println!("{} '{}' is available.", "Profile".green(), name.cyan());
        }
        ProfilesAction::List => {
            let catalog_dir = settings.catalog_dir()?;
            let pack = catalog_loader::load_pack(&catalog_dir).with_context(|| {
                format!("Failed to load catalogs from '{}'", catalog_dir.display())
            })?;
            let store = MultiStore::default_chain(&file);
            let stored = stored_profiles(&store, pack.profile_labels())?;
            if stored.is_empty() {
                println!("No credentials found.");
            }
            for (name, access_key_id) in stored {
                println!("{} ({})", name.cyan(), access_key_id);
            }
        }
        ProfilesAction::Show { name } => {
            let store = MultiStore::default_chain(&file);
            let (access_key_id, secret_access_key) = show_profile(&store, &name)?;
            println!("Access Key ID: {}", access_key_id);
            println!("Secret Access Key: {}", secret_access_key);
        }
        ProfilesAction::Delete { name } => {
            MultiStore::default_chain(&file).delete(&name)?;
            println!("{} '{}' deleted.", "Profile".yellow(), name.cyan());
        }
    }
    Ok(())
}

/// Labels that `store` holds without prompting, paired with their access key ids.
fn stored_profiles<'a>(
    store: &dyn ProfileStore,
    labels: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<(String, String)>> {
    labels
        .into_iter()
        .filter(|label| store.check(label))
        .map(|label| {
            let credentials = store.lookup(label)?;
            Ok((label.to_string(), credentials.access_key_id))
        })
        .collect()
}

/// The key pair of a stored profile. Never falls back to prompting.
fn show_profile(store: &dyn ProfileStore, name: &str) -> Result<(String, String)> {
    if !store.check(name) {
        bail!("No credentials stored for profile '{}'.", name);
    }
    let credentials = store.lookup(name)?;
    Ok((credentials.access_key_id, credentials.secret_access_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StaticStore;

    #[test]
    fn test_parse_actions() {
        let parse = |argv: &[&str]| {
            ProfilesArgs::try_parse_from(argv.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                .map(|p| p.action)
        };
        assert_eq!(
            parse(&["add", "work"]).unwrap(),
            ProfilesAction::Add { name: "work".to_string() }
        );
        assert_eq!(
            parse(&["rm", "work"]).unwrap(),
            ProfilesAction::Delete { name: "work".to_string() }
        );
        assert_eq!(parse(&["ls"]).unwrap(), ProfilesAction::List);
        assert_eq!(
            parse(&["show", "work"]).unwrap(),
            ProfilesAction::Show { name: "work".to_string() }
        );
        assert!(parse(&["show"]).is_err());
        assert!(parse(&["rotate", "work"]).is_err());
    }

    #[test]
    fn test_stored_profiles_skips_missing_labels() {
        let store = StaticStore::new(&[("work", "AKIAWORK", "s1"), ("unused", "AKIAX", "s2")]);
        let stored = stored_profiles(&store, ["audit", "work"]).unwrap();
        assert_eq!(stored, vec![("work".to_string(), "AKIAWORK".to_string())]);
    }

    #[test]
    fn test_show_profile() {
        let store = StaticStore::new(&[("work", "AKIAWORK", "secret")]);
        assert_eq!(
            show_profile(&store, "work").unwrap(),
            ("AKIAWORK".to_string(), "secret".to_string())
        );
        assert!(show_profile(&store, "audit").is_err());
    }
}
