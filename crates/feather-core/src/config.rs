//! Feather configuration
//!
//! Stored in `~/.config/feather/config.toml` (platform config dir), or in
//! `$FEATHER_CONFIG_DIR/config.toml` when that variable is set. The
//! installation table is only consulted by the launcher; the cleanup pipeline
//! never sees it.

pub mod types;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FeatherError, Result};
use crate::header::BlendVersion;

pub use types::{Defaults, FeatherConfig, Installation, CONFIG_FORMAT_VERSION};

const CONFIG_DIR: &str = "feather";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV_VAR: &str = "FEATHER_CONFIG_DIR";

impl FeatherConfig {
    /// Resolve the config file location
    pub fn default_path() -> Result<PathBuf> {
        // Allow environment variable override for testing
        let config_dir = if let Ok(env_dir) = std::env::var(CONFIG_DIR_ENV_VAR) {
            PathBuf::from(env_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| {
                    FeatherError::Other("unable to determine config directory".to_string())
                })?
                .join(CONFIG_DIR)
        };

        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load from the default location; a missing file yields the defaults
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "config_missing");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| FeatherError::io_operation("read config", path.display(), e))?;
        let config: FeatherConfig = toml::from_str(&content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            tracing::warn!(
                version = config.version,
                supported = CONFIG_FORMAT_VERSION,
                "config written by a newer feather"
            );
        }
        Ok(config)
    }

    /// Save configuration to a file, creating its directory
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| FeatherError::io_operation("create config directory", dir.display(), e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| FeatherError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)
            .map_err(|e| FeatherError::io_operation("write config", path.display(), e))?;
        Ok(())
    }

    /// Add an installation; names are unique
    pub fn add_installation(&mut self, installation: Installation) -> Result<()> {
        BlendVersion::parse(&installation.version)?;
        if self.installation(&installation.name).is_some() {
            crate::bail_invalid!("installation name (already configured)", installation.name);
        }
        self.installations.push(installation);
        Ok(())
    }

    /// Remove an installation by name
    pub fn remove_installation(&mut self, name: &str) -> Result<Installation> {
        let index = self
            .installations
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(|| FeatherError::not_found("installation", name))?;
        Ok(self.installations.remove(index))
    }

    pub fn installation(&self, name: &str) -> Option<&Installation> {
        self.installations.iter().find(|i| i.name == name)
    }

    /// Pick the executable for a file.
    ///
    /// An explicit choice wins (installation name first, then a literal path).
    /// Otherwise the oldest installation able to open `file_version`, else the
    /// newest one.
    pub fn select_blender(
        &self,
        explicit: Option<&str>,
        file_version: Option<BlendVersion>,
    ) -> Result<PathBuf> {
        if let Some(choice) = explicit {
            if let Some(installation) = self.installation(choice) {
                return Ok(installation.path.clone());
            }
            let path = PathBuf::from(choice);
            if path.is_file() {
                return Ok(path);
            }
            return Err(FeatherError::not_found("Blender installation", choice));
        }

        let mut known: Vec<(BlendVersion, &Installation)> = self
            .installations
            .iter()
            .filter_map(|i| match BlendVersion::parse(&i.version) {
                Ok(version) => Some((version, i)),
                Err(_) => {
                    warn!(
                        installation = %i.name,
                        version = %i.version,
                        "skipping installation with unreadable version"
                    );
                    None
                }
            })
            .collect();
        known.sort_by_key(|(v, _)| *v);

        let compatible = file_version.and_then(|wanted| known.iter().find(|(v, _)| *v >= wanted));
        let chosen = compatible
            .or_else(|| known.last())
            .ok_or(FeatherError::NoInstallation)?;

        debug!(
            installation = %chosen.1.name,
            version = %chosen.0,
            file_version = ?file_version.map(|v| v.to_string()),
            "select_blender"
        );
        Ok(chosen.1.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn install(name: &str, version: &str) -> Installation {
        Installation {
            name: name.to_string(),
            version: version.to_string(),
            path: PathBuf::from(format!("/opt/{name}/blender")),
        }
    }

    fn three_installs() -> FeatherConfig {
        let mut config = FeatherConfig::default();
        config.add_installation(install("lts45", "4.5")).unwrap();
        config.add_installation(install("lts36", "3.6")).unwrap();
        config.add_installation(install("stable50", "5.0")).unwrap();
        config
    }

    #[test]
    fn test_default_config() {
        let config = FeatherConfig::default();
        assert_eq!(config.version, CONFIG_FORMAT_VERSION);
        assert_eq!(config.defaults.level, 1);
        assert!(!config.defaults.compress);
        assert!(config.defaults.purge_passes.is_none());
        assert!(config.installations.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = three_installs();
        config.defaults.purge_passes = Some(5);
        config.save(&path).unwrap();

        let loaded = FeatherConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[[installations]]\nname = \"b\"\nversion = \"4.2\"\npath = \"/usr/bin/blender\"\n",
        )
        .unwrap();

        let loaded = FeatherConfig::load(&path).unwrap();
        assert_eq!(loaded.defaults, Defaults::default());
        assert_eq!(loaded.installations.len(), 1);
    }

    #[test]
    fn test_duplicate_installation_rejected() {
        let mut config = three_installs();
        let err = config.add_installation(install("lts45", "4.5")).unwrap_err();
        assert!(matches!(err, FeatherError::InvalidValue { .. }));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut config = FeatherConfig::default();
        assert!(config.add_installation(install("x", "latest")).is_err());
    }

    #[test]
    fn test_remove_installation() {
        let mut config = three_installs();
        let removed = config.remove_installation("lts36").unwrap();
        assert_eq!(removed.version, "3.6");
        assert!(config.remove_installation("lts36").is_err());
    }

    #[test]
    fn test_select_oldest_compatible() {
        let config = three_installs();
        let path = config
            .select_blender(None, Some(BlendVersion::new(4, 2)))
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/lts45/blender"));
    }

    #[test]
    fn test_select_newest_when_file_is_newer() {
        let config = three_installs();
        let path = config
            .select_blender(None, Some(BlendVersion::new(5, 1)))
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/stable50/blender"));
    }

    #[test]
    fn test_select_by_name() {
        let config = three_installs();
        let path = config.select_blender(Some("lts36"), None).unwrap();
        assert_eq!(path, PathBuf::from("/opt/lts36/blender"));
    }

    #[test]
    fn test_select_unknown_name() {
        let config = three_installs();
        assert!(matches!(
            config.select_blender(Some("nope"), None),
            Err(FeatherError::NotFound { .. })
        ));
    }

    #[test]
    fn test_select_skips_unreadable_versions() {
        let mut config = FeatherConfig::default();
        config.installations.push(install("broken", "latest"));
        config.add_installation(install("lts42", "4.2")).unwrap();

        let path = config
            .select_blender(None, Some(BlendVersion::new(4, 0)))
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/lts42/blender"));

        config.remove_installation("lts42").unwrap();
        assert!(matches!(
            config.select_blender(None, None),
            Err(FeatherError::NoInstallation)
        ));
        // still reachable by name
        assert_eq!(
            config.select_blender(Some("broken"), None).unwrap(),
            PathBuf::from("/opt/broken/blender")
        );
    }

    #[test]
    fn test_select_two_digit_minor_from_short_form() {
        let mut config = FeatherConfig::default();
        config.add_installation(install("old", "2.8")).unwrap();
        let path = config
            .select_blender(None, Some(BlendVersion::from_packed(280)))
            .unwrap();
        assert_eq!(path, PathBuf::from("/opt/old/blender"));
    }

    #[test]
    fn test_select_without_installations() {
        let config = FeatherConfig::default();
        assert!(matches!(
            config.select_blender(None, None),
            Err(FeatherError::NoInstallation)
        ));
    }
}
