//! Engine configuration storage
//!
//! Handles persistent storage of timing, persistence, connection and layout
//! settings. Every section falls back to the defaults in `constants`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{history, layout, persistence, polling};
use crate::layout::Direction;
use crate::validation::ConnectionOptions;

const CONFIG_FILE: &str = "config.json";

/// Polling behaviour for asynchronous provider jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Delay between status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Delay before retrying after a failed poll
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    polling::INTERVAL_MS
}

fn default_retry_interval() -> u64 {
    polling::RETRY_INTERVAL_MS
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            retry_interval_ms: default_retry_interval(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// What happens to a locally created edge when persisting it fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeWritePolicy {
    /// Keep the edge and retry on the next reconcile pass
    #[default]
    KeepOnFailure,
    /// Remove the edge again and notify the user
    RollbackOnFailure,
}

/// Write behaviour towards the persistence backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Quiet period before coalesced parameter edits are written
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub edge_write_policy: EdgeWritePolicy,
}

fn default_debounce() -> u64 {
    persistence::DEBOUNCE_MS
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            edge_write_policy: EdgeWritePolicy::default(),
        }
    }
}

impl PersistenceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Spatial layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub grid_size: f64,
    pub node_spacing: f64,
    pub rank_spacing: f64,
    /// Gap kept between footprints when resolving collisions
    pub collision_padding: f64,
    /// Rings probed by the free-position search
    pub max_search_rings: usize,
    pub direction: Direction,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_size: layout::GRID_SIZE,
            node_spacing: layout::NODE_SPACING,
            rank_spacing: layout::RANK_SPACING,
            collision_padding: layout::COLLISION_PADDING,
            max_search_rings: layout::MAX_SEARCH_RINGS,
            direction: Direction::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
}

fn default_max_snapshots() -> usize {
    history::MAX_SNAPSHOTS
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Validator options applied to every new connection
    #[serde(default)]
    pub connections: ConnectionOptions,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl EngineConfig {
    /// Load configuration from `config.json` in the given directory
    ///
    /// A missing file yields the defaults.
    pub async fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if !fs::try_exists(&config_path).await? {
            log::debug!("No config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to `config.json` in the given directory
    pub async fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(config_dir).await?;

        let config_path = config_dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.execution.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.execution.retry_interval(), Duration::from_secs(3));
        assert_eq!(config.persistence.debounce(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.execution.poll_interval_ms = 250;
        config.persistence.edge_write_policy = EdgeWritePolicy::RollbackOnFailure;
        config.connections.strict_type_checking = true;
        config.layout.direction = Direction::TopBottom;

        config.save(dir.path()).await.unwrap();
        let loaded = EngineConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.json"),
            r#"{"execution": {"pollIntervalMs": 1000}, "layout": {"gridSize": 10.0}}"#,
        )
        .await
        .unwrap();

        let config = EngineConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.execution.poll_interval_ms, 1000);
        assert_eq!(config.execution.retry_interval_ms, polling::RETRY_INTERVAL_MS);
        assert_eq!(config.layout.grid_size, 10.0);
        assert_eq!(config.layout.node_spacing, layout::NODE_SPACING);
        assert_eq!(config.history.max_snapshots, history::MAX_SNAPSHOTS);
    }

    #[tokio::test]
    async fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("config.json"), "{not json")
            .await
            .unwrap();
        assert!(matches!(
            EngineConfig::load(dir.path()).await,
            Err(ConfigError::Parse(_))
        ));
    }
}
