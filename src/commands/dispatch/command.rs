//! Command trait and context for dispatching commands

use std::path::PathBuf;
use std::time::Instant;

use feather_core::config::FeatherConfig;
use feather_core::error::Result;
use tracing::debug;

use crate::cli::Cli;

/// Shared context for command execution
pub struct CommandContext<'a> {
    pub cli: &'a Cli,
    pub start: Instant,
}

impl<'a> CommandContext<'a> {
    pub fn new(cli: &'a Cli, start: Instant) -> Self {
        Self { cli, start }
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        FeatherConfig::default_path()
    }

    pub fn load_config(&self) -> Result<FeatherConfig> {
        let config = FeatherConfig::load_default()?;
        debug!(
            elapsed = ?self.start.elapsed(),
            installations = config.installations.len(),
            "load_config"
        );
        Ok(config)
    }
}

/// Trait for commands that can be executed
pub trait Command {
    fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// No-op command (when no subcommand is provided)
pub struct NoCommand;

impl Command for NoCommand {
    fn execute(&self, _ctx: &CommandContext) -> Result<()> {
        println!("feather {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Shrink Blender project files by purging unused data blocks.");
        println!();
        println!("Run `feather --help` for usage information.");
        Ok(())
    }
}
