//! Argument structures for the slim and inspect commands

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use feather_core::pipeline::Level;

use crate::cli::parse::{parse_input_path, parse_level};

/// Which document backend `slim` drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HostKind {
    /// Blender in background mode on a .blend file
    #[default]
    Blender,
    /// The built-in JSON document model (no Blender needed)
    Memory,
}

impl HostKind {
    /// Input extension this host accepts
    pub fn extension(self) -> &'static str {
        match self {
            HostKind::Blender => "blend",
            HostKind::Memory => "json",
        }
    }
}

/// Arguments for the slim command.
#[derive(Args, Debug)]
pub struct SlimArgs {
    /// Files to process (directories with --recursive)
    #[arg(required = true, value_parser = parse_input_path)]
    pub paths: Vec<PathBuf>,

    /// Cleanup level: 1 purge, 2 also extras, 3 also rebuild
    #[arg(long, short, value_parser = parse_level)]
    pub level: Option<Level>,

    /// Write the output compressed
    #[arg(long, short, overrides_with = "no_compress")]
    pub compress: bool,

    /// Write the output uncompressed, even when the config enables compression
    #[arg(long, overrides_with = "compress")]
    pub no_compress: bool,

    /// Remove every world before purging
    #[arg(long)]
    pub delete_worlds: bool,

    /// Level 3: also bring back objects outside any collection
    #[arg(long)]
    pub experimental_append: bool,

    /// Run exactly this many purge passes instead of purging until stable
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub purge_passes: Option<u32>,

    /// Installation name or path to a Blender executable
    #[arg(long, env = "FEATHER_BLENDER")]
    pub blender: Option<String>,

    /// Document backend
    #[arg(long, value_enum, default_value_t = HostKind::Blender)]
    pub host: HostKind,

    /// Seconds to wait for any single host request
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Descend into directories
    #[arg(long, short)]
    pub recursive: bool,
}

/// Arguments for the inspect command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// .blend file to inspect
    #[arg(value_parser = parse_input_path)]
    pub path: PathBuf,
}
