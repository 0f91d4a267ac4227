//! Infrastructure implementation of the `ConfigStore` port.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::ClusterConfig;

/// System-wide config location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hzkube/config.yaml";

/// Production implementation of `ConfigStore` that uses a YAML file on disk.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    /// Store at `path`, or [`DEFAULT_CONFIG_PATH`].
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<ClusterConfig> {
        if !self.path.exists() {
            return Ok(ClusterConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))
    }

    fn save(&self, config: &ClusterConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("cannot write {}", self.path.display()))?;

        std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("cannot set permissions on {}", self.path.display()))?;
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }
}
