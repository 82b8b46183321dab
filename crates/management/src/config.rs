//! Management configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Management configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// Pending updates buffered per connected peer before it counts as unreachable
    pub peer_update_buffer: usize,

    /// Audit trail configuration
    pub events: EventsConfig,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            store_path: meshplane_common::default_store_path(),
            peer_update_buffer: 100,
            events: EventsConfig::default(),
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Record an event for every committed change
    pub enabled: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ManagementConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("state.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ManagementConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ManagementConfig::default());
        assert_eq!(config.peer_update_buffer, 100);
        assert!(config.events.enabled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ManagementConfig {
            store_path: dir.path().to_path_buf(),
            peer_update_buffer: 8,
            events: EventsConfig { enabled: false },
        };
        config.save(&path).unwrap();

        let loaded = ManagementConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.db_path(), dir.path().join("state.db"));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "peer_update_buffer = 4\n").unwrap();

        let config = ManagementConfig::load(&path).unwrap();
        assert_eq!(config.peer_update_buffer, 4);
        assert!(config.events.enabled);
    }
}
