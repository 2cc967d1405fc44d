//! `feather installs` - manage the Blender installation table

use std::path::Path;

use feather_core::config::{FeatherConfig, Installation};
use feather_core::error::{FeatherError, Result};
use feather_core::host;
use tracing::debug;

use crate::cli::installs::InstallsCommands;
use crate::commands::dispatch::CommandContext;
use crate::output_by_format;

pub fn execute(ctx: &CommandContext, command: &InstallsCommands) -> Result<()> {
    match command {
        InstallsCommands::List => list(ctx),
        InstallsCommands::Add {
            name,
            path,
            version,
        } => add(ctx, name, path, version.as_deref()),
        InstallsCommands::Remove { name } => remove(ctx, name),
    }
}

fn list(ctx: &CommandContext) -> Result<()> {
    let config = ctx.load_config()?;

    output_by_format!(ctx.cli.format, json => {
        println!("{}", serde_json::to_string_pretty(&config.installations)?);
    }, human => {
        if config.installations.is_empty() {
            if !ctx.cli.quiet {
                println!("No installations configured. Add one with `feather installs add NAME PATH`.");
            }
        } else {
            for installation in &config.installations {
                println!(
                    "{}\t{}\t{}",
                    installation.name,
                    installation.version,
                    installation.path.display()
                );
            }
        }
    });
    Ok(())
}

fn add(ctx: &CommandContext, name: &str, path: &Path, version: Option<&str>) -> Result<()> {
    if !path.is_file() {
        return Err(FeatherError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let path = path
        .canonicalize()
        .map_err(|e| FeatherError::io_operation("resolve", path.display(), e))?;
    let version = match version {
        Some(version) => version.to_string(),
        None => host::probe_version(&path)?.to_string(),
    };

    let config_path = ctx.config_path()?;
    let mut config = if config_path.exists() {
        FeatherConfig::load(&config_path)?
    } else {
        FeatherConfig::default()
    };
    let installation = Installation {
        name: name.to_string(),
        version,
        path,
    };
    config.add_installation(installation.clone())?;
    config.save(&config_path)?;
    debug!(config = %config_path.display(), name, "installation_added");

    output_by_format!(ctx.cli.format, json => {
        println!("{}", serde_json::to_string_pretty(&installation)?);
    }, human => {
        if !ctx.cli.quiet {
            println!(
                "Added {} (Blender {}) at {}",
                installation.name,
                installation.version,
                installation.path.display()
            );
        }
    });
    Ok(())
}

fn remove(ctx: &CommandContext, name: &str) -> Result<()> {
    let config_path = ctx.config_path()?;
    let mut config = ctx.load_config()?;
    let removed = config.remove_installation(name)?;
    config.save(&config_path)?;
    debug!(config = %config_path.display(), name, "installation_removed");

    output_by_format!(ctx.cli.format, json => {
        println!("{}", serde_json::to_string_pretty(&removed)?);
    }, human => {
        if !ctx.cli.quiet {
            println!("Removed {}", removed.name);
        }
    });
    Ok(())
}
