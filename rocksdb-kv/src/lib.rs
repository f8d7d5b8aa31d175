//! RocksDB backing store for `blob_store`.

pub mod config;
pub mod kv_store;

pub use config::RocksKvConfig;
pub use kv_store::RocksKv;
