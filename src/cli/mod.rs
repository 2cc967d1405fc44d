//! CLI argument parsing for feather
//!
//! Global flags: --format, --quiet, --verbose, --log-level, --log-json

pub mod args;
pub mod commands;
pub mod installs;
pub mod output;
pub mod parse;

use clap::Parser;

pub use commands::Commands;
pub use output::OutputFormat;
use parse::parse_format;

/// Feather - shrink Blender project files by purging unused data blocks
#[derive(Parser, Debug)]
#[command(name = "feather")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (human or json)
    #[arg(long, global = true, default_value = "human", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Debug-level logging and per-stage timing
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log filter, e.g. "debug" or "feather_core=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
