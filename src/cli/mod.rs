use clap::Parser;

pub mod dispatcher;
pub mod handlers;

const HELP_TEMPLATE: &str = "\
<title>{name}</title> {version}
{about}

<title>USAGE:</title>
  <cmd>wayfarer travel</cmd> [TARGET...] [--role R] [--profile P] [--format env|json]
  <cmd>wayfarer xargs</cmd> [FILTER...] -c <hl>COMMAND</hl> [--yes] [--pin] [--no-progress]
  <cmd>wayfarer profiles</cmd> add|check|delete <hl>NAME</hl>

<title>TARGETS:</title>
  <hl>123456789012</hl>[/role]   a single account, optionally with a role
  <hl>name:regex</hl>            accounts whose tag <dim>name</dim> matches
  <hl>regex</hl>                 accounts with any tag value matching

Run <cmd>wayfarer <<command>> --help</cmd> for command options.
";

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = HELP_TEMPLATE
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset)
        .replace("<<command>>", "<command>");

    Box::leak(formatted_string.into_boxed_str())
}

/// wayfarer: resolves and travels multi-hop AWS role chains.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
#[command(disable_help_subcommand = true)]
#[command(trailing_var_arg = true)]
pub struct Cli {
    /// The command followed by its own arguments; each handler parses the rest.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}
