use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

use crate::dispatcher::HttpMethod;

/// Inspect, edit and send JSON documents to an HTTP endpoint
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML config file, `jsonsend.toml` is used when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Destination URL, overrides the config file
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// GET or POST, overrides the config file
    #[arg(short = 'X', long, global = true)]
    pub method: Option<HttpMethod>,

    /// Relay used when the direct request fails
    #[arg(long, global = true)]
    pub relay_base: Option<String>,

    /// Never fall back to the relay
    #[arg(long, global = true, conflicts_with = "relay_base")]
    pub no_relay: bool,

    /// More diagnostics on stderr, repeat for more
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive session (the default)
    Shell,

    /// Send a document once and print the response
    Send(SourceArgs),

    /// Check that a document is valid JSON
    Validate(SourceArgs),

    /// Print the built-in example document
    Example,
}

#[derive(Args, Debug, Default)]
pub struct SourceArgs {
    /// Read the document from a file, `-` for stdin
    #[arg(short, long, conflicts_with = "data")]
    pub file: Option<PathBuf>,

    /// The document as an inline JSON string
    #[arg(short, long)]
    pub data: Option<String>,
}
