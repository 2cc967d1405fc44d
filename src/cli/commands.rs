//! Main CLI commands enum

use clap::Subcommand;

use crate::cli::args::{InspectArgs, SlimArgs};
use crate::cli::installs::InstallsCommands;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a lighter copy of each file: <stem>_L<level>.<ext>
    Slim(SlimArgs),

    /// Show what a .blend file header says (version, pointer size, compression)
    Inspect(InspectArgs),

    /// Manage known Blender installations
    Installs {
        #[command(subcommand)]
        command: InstallsCommands,
    },
}
