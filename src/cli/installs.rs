//! Installs subcommands for the Blender installation table

use std::path::PathBuf;

use clap::Subcommand;

use crate::cli::parse::{parse_input_path, parse_version};

/// Installs subcommands
#[derive(Subcommand, Debug)]
pub enum InstallsCommands {
    /// List configured installations
    List,

    /// Register a Blender executable
    Add {
        /// Short name, usable with `slim --blender`
        name: String,

        /// Path to the Blender executable
        #[arg(value_parser = parse_input_path)]
        path: PathBuf,

        /// Blender version, e.g. 4.5 (asked from the executable when omitted)
        #[arg(long, value_parser = parse_version)]
        version: Option<String>,
    },

    /// Forget an installation
    Remove {
        /// Installation name
        name: String,
    },
}
