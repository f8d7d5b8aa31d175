use std::path::PathBuf;

use blob_store::{BlobConfig, DEFAULT_CHUNK_SIZE};
use clap::{Parser, Subcommand};
use rocksdb_kv::RocksKvConfig;

#[derive(Parser, Debug)]
#[clap(name = "blob-cli", about = "Chunked blobs stored in a local RocksDB")]
pub struct Args {
    #[clap(long, env = "BLOB_DB_PATH")]
    pub(crate) db_path: PathBuf,
    #[clap(long, env = "BLOB_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub(crate) chunk_size: u64,
    /// Slash separated, e.g. `app/media`
    #[clap(long, env = "BLOB_NAMESPACE", value_delimiter = '/', default_value = "blobs")]
    pub(crate) namespace: Vec<String>,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Store a file (stdin when omitted). Without --offset the blob is deleted
    /// first and the input then written in 8 KiB transactions, so a failed
    /// replace leaves a truncated blob. --offset overwrites in place and must
    /// not be past the end of the blob.
    Put {
        key: String,
        file: Option<PathBuf>,
        #[clap(long)]
        offset: Option<u64>,
    },
    /// Write a blob, or a window of it, to stdout
    Get {
        key: String,
        #[clap(long, default_value_t = 0)]
        offset: u64,
        #[clap(long)]
        len: Option<u64>,
    },
    Delete {
        key: String,
    },
    /// Exit status 0 when the blob exists, 1 otherwise
    Exists {
        key: String,
    },
    /// Print size, chunk count and SHA-256 digest as JSON
    Stat {
        key: String,
    },
}

impl Args {
    pub(crate) fn blob_config(&self) -> BlobConfig {
        BlobConfig {
            chunk_size: self.chunk_size,
            namespace: self.namespace.clone(),
        }
    }

    pub(crate) fn kv_config(&self) -> RocksKvConfig {
        RocksKvConfig::new(&self.db_path)
    }
}
