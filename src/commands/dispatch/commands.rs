//! Command implementations for all feather commands

use feather_core::error::Result;

use crate::cli::Commands;
use crate::commands::dispatch::command::{Command, CommandContext};
use crate::commands::{inspect, installs, slim};

impl Command for Commands {
    fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            Commands::Slim(args) => slim::execute(ctx, args),
            Commands::Inspect(args) => inspect::execute(ctx, args),
            Commands::Installs { command } => installs::execute(ctx, command),
        }
    }
}
