use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkLayout, DEFAULT_CHUNK_SIZE};
use crate::errors::{BlobError, BlobResult};
use crate::subspace::validate_path;

pub const DEFAULT_NAMESPACE: &str = "blobs";

/// Settings of one blob store. `chunk_size` is fixed for the lifetime of a
/// namespace: reopening populated data with another size misreads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub chunk_size: u64,
    pub namespace: Vec<String>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            namespace: vec![DEFAULT_NAMESPACE.to_string()],
        }
    }
}

impl BlobConfig {
    pub fn validate(&self) -> BlobResult<()> {
        if self.chunk_size == 0 {
            return Err(BlobError::InvalidConfig("chunk_size must be positive".into()));
        }
        validate_path(&self.namespace)
    }

    pub fn layout(&self) -> BlobResult<ChunkLayout> {
        ChunkLayout::new(self.chunk_size)
    }
}
