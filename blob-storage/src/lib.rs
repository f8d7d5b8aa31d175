//! Seekable, chunked blobs on top of an ordered transactional key-value store.
//!
//! A blob is split into fixed-size chunks, one value per chunk, keyed by
//! `namespace / blob key / chunk index`. Its length is never stored; it is
//! derived from the highest chunk present.

pub mod chunk;
pub mod config;
pub mod errors;
pub mod handle;
pub mod manager;
pub mod memory_store;
pub mod reader;
pub mod size;
pub mod store;
pub mod subspace;
pub mod tuple;
pub mod writer;

pub use chunk::{ChunkLayout, ChunkSpan, DEFAULT_CHUNK_SIZE};
pub use config::BlobConfig;
pub use errors::{BlobError, BlobResult};
pub use handle::{Whence, SEEK_CUR, SEEK_END, SEEK_SET};
pub use manager::BlobManager;
pub use memory_store::MemoryKv;
pub use reader::BlobReader;
pub use store::{retry_on_conflict, KeyValue, KvError, KvResult, Transaction, TransactionRunner};
pub use subspace::{Namespace, Subspace};
pub use tuple::{Element, Tuple, TupleError};
pub use writer::BlobWriter;
