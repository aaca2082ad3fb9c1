use anyhow::{Result, bail};

use crate::cli::handlers;

/// A system command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "travel",
        aliases: &["t"],
        handler: handlers::travel::handle,
    },
    CommandDefinition {
        name: "xargs",
        aliases: &["x"],
        handler: handlers::xargs::handle,
    },
    CommandDefinition {
        name: "profiles",
        aliases: &["profile"],
        handler: handlers::profiles::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `wayfarer <command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let Some((name, rest)) = all_args.split_first() else {
        bail!("No command given. Run 'wayfarer --help' for usage.");
    };

    match find_command(name) {
        Some(command) => (command.handler)(rest.to_vec()),
        None => {
            let known: Vec<&str> = COMMAND_REGISTRY.iter().map(|c| c.name).collect();
            bail!("Unknown command '{}'. Expected one of: {}", name, known.join(", "))
        }
    }
}
