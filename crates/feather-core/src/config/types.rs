//! Configuration type definitions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Top-level feather configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatherConfig {
    /// Config format version for compatibility checking
    #[serde(default = "default_version")]
    pub version: u32,

    /// Defaults applied when a flag is not given
    #[serde(default)]
    pub defaults: Defaults,

    /// Known Blender installations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installations: Vec<Installation>,
}

/// One Blender installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// Short name used with `--blender`
    pub name: String,

    /// Blender version, e.g. "4.5"
    pub version: String,

    /// Path to the Blender executable
    pub path: PathBuf,
}

/// Defaults for `feather slim`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_level")]
    pub level: u8,

    #[serde(default)]
    pub compress: bool,

    /// Seconds to wait for a single host request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed orphan-purge pass count; unset means "until nothing is left"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_passes: Option<u32>,
}

impl Default for FeatherConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            defaults: Defaults::default(),
            installations: Vec::new(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            level: default_level(),
            compress: false,
            timeout_secs: default_timeout_secs(),
            purge_passes: None,
        }
    }
}

fn default_version() -> u32 {
    CONFIG_FORMAT_VERSION
}

fn default_level() -> u8 {
    1
}

fn default_timeout_secs() -> u64 {
    600
}
