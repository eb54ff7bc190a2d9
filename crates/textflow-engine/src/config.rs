//! Configuration for an engine session

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::Result;

/// Tunables for a [`Session`](crate::Session)
///
/// Every field has a default, so a config file only needs the keys it
/// wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of undo entries
    pub undo_limit: usize,
    /// zstd level for full-graph snapshots
    pub snapshot_compression_level: i32,
    /// Attempts made to draw a fresh session id before failing
    pub max_id_attempts: u32,
    /// Default Looper timeout in seconds
    pub loop_timeout_secs: f64,
    /// Default Looper soft data limit (characters)
    pub loop_data_limit: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_limit: defaults::UNDO_LIMIT,
            snapshot_compression_level: defaults::SNAPSHOT_COMPRESSION_LEVEL,
            max_id_attempts: defaults::MAX_ID_ATTEMPTS,
            loop_timeout_secs: defaults::LOOP_TIMEOUT_SECS,
            loop_data_limit: defaults::LOOP_DATA_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let config: EngineConfig = serde_json::from_slice(&bytes)?;
        log::debug!("Loaded engine config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
