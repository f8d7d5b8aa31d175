use std::io;

use blob_store::{BlobError, KvError};
use serde_json::error::Error as SerdeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("Failed to open the database")]
    Store(#[from] KvError),

    #[error("I/O failed")]
    Io(#[from] io::Error),

    #[error("Offset {offset} is past the end of the blob ({size} bytes)")]
    OffsetPastEnd { offset: u64, size: u64 },

    #[error("Failed to render JSON")]
    Json(#[from] SerdeError),
}
