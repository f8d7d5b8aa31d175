use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// RocksDB can resolve write conflicts slowly under contention, so this is
/// well above the in-memory store's default.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RocksKvConfig {
    /// Database directory, created when missing.
    pub path: PathBuf,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// fsync the WAL on every commit
    #[serde(default)]
    pub sync_writes: bool,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl RocksKvConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sync_writes: false,
        }
    }
}
