use thiserror::Error;

use crate::store::KvError;
use crate::tuple::TupleError;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Can not access closed blob")]
    ClosedHandle,

    #[error("Chunk {index} is missing; partial writes into a nonexistent chunk are not supported")]
    MissingChunkDuringMerge { index: u64 },

    #[error("Unsupported seek mode {0}")]
    UnsupportedSeekMode(i32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid namespace path {0:?}")]
    InvalidNamespace(Vec<String>),

    #[error("Namespace {0:?} does not exist")]
    NamespaceNotFound(Vec<String>),

    #[error("Blob offset does not fit the chunk key space")]
    OffsetOverflow,

    #[error("Malformed chunk key {key:02x?}")]
    CorruptKey { key: Vec<u8> },

    #[error("Failed to decode key")]
    Tuple(#[from] TupleError),

    #[error(transparent)]
    Kv(#[from] KvError),
}

impl BlobError {
    /// True when the failed transaction body may simply be run again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BlobError::Kv(KvError::Conflict))
    }
}

impl From<BlobError> for std::io::Error {
    fn from(err: BlobError) -> Self {
        let kind = match err {
            BlobError::UnsupportedSeekMode(_) | BlobError::OffsetOverflow => {
                std::io::ErrorKind::InvalidInput
            }
            BlobError::MissingChunkDuringMerge { .. }
            | BlobError::CorruptKey { .. }
            | BlobError::Tuple(_) => std::io::ErrorKind::InvalidData,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
