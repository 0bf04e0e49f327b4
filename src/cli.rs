use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Parser};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

#[derive(Debug, Default, Parser)]
#[command(name = "nbtags")]
#[command(bin_name = "nbtags")]
#[command(version)]
#[command(about = "Tag every Joplin note with a tag named after its notebook")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        long,
        env = "JOPLIN_TOKEN",
        hide_env_values = true,
        help = "Joplin Web Clipper API token."
    )]
    pub token: Option<String>,

    #[arg(
        long,
        env = "JOPLIN_API_BASE",
        help = "Base URL of the Joplin Data API [default: http://localhost:41184]."
    )]
    pub base_url: Option<String>,

    #[arg(
        long,
        env = "NBTAGS_PREFIX",
        help = "Prefix prepended to notebook titles to form tag names [default: notebook.]."
    )]
    pub prefix: Option<String>,

    #[arg(
        short = 'c',
        long,
        env = "NBTAGS_CONFIG",
        help = "Optional TOML file with base_url, prefix and refetch_on_conflict."
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Load everything and report the plan without writing.")]
    pub dry_run: bool,

    #[arg(
        long,
        help = "Re-load tags after 'already exists' conflicts to resolve their ids."
    )]
    pub refetch_on_conflict: bool,

    #[arg(long, help = "Print the summary as JSON.")]
    pub json: bool,

    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides."
    )]
    pub verbose: u8,
}
