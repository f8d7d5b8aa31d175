//! Entry point: a blob store bound to one namespace and chunk size.

use std::sync::Arc;

use crate::chunk::ChunkLayout;
use crate::config::BlobConfig;
use crate::errors::BlobResult;
use crate::reader::BlobReader;
use crate::size::{has_chunks, resolve_size};
use crate::store::TransactionRunner;
use crate::subspace::{Namespace, Subspace};
use crate::tuple::Tuple;
use crate::writer::BlobWriter;

/// Hands out blob handles and runs whole-blob operations.
///
/// Cloning is cheap; clones share the runner.
pub struct BlobManager<R: TransactionRunner> {
    runner: Arc<R>,
    namespace: Namespace,
    layout: ChunkLayout,
}

impl<R: TransactionRunner> Clone for BlobManager<R> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            namespace: self.namespace.clone(),
            layout: self.layout,
        }
    }
}

impl<R: TransactionRunner> BlobManager<R> {
    /// Opens the configured namespace, registering it if it is new.
    pub fn open(runner: Arc<R>, config: &BlobConfig) -> BlobResult<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let namespace = Namespace::create_or_open(runner.as_ref(), &config.namespace)?;
        tracing::debug!(
            "opened blob store {:?} with chunk size {}",
            namespace.path(),
            layout.chunk_size()
        );
        Ok(Self {
            runner,
            namespace,
            layout,
        })
    }

    /// A reader at offset 0 (`get_reader`).
    pub fn reader(&self, key: impl Into<Tuple>) -> BlobReader<R> {
        BlobReader::new(self.runner.clone(), self.blob(&key.into()), self.layout)
    }

    /// A writer at offset 0 (`get_writer`).
    pub fn writer(&self, key: impl Into<Tuple>) -> BlobWriter<R> {
        BlobWriter::new(self.runner.clone(), self.blob(&key.into()), self.layout)
    }

    /// The whole blob, empty when it does not exist.
    pub fn read(&self, key: impl Into<Tuple>) -> BlobResult<Vec<u8>> {
        self.reader(key).read(None)
    }

    /// Writes `data` from offset 0, overwriting what is there. Bytes past the
    /// end of `data` are left in place.
    pub fn write(&self, key: impl Into<Tuple>, data: &[u8]) -> BlobResult<()> {
        self.writer(key).write(data)?;
        Ok(())
    }

    /// Removes every chunk of the blob in one transaction.
    #[tracing::instrument(level = "debug", skip(self, key))]
    pub fn delete(&self, key: impl Into<Tuple>) -> BlobResult<()> {
        let (begin, end) = self.blob(&key.into()).range();
        self.runner.run(|tr| Ok(tr.clear_range(&begin, &end)?))
    }

    pub fn exists(&self, key: impl Into<Tuple>) -> BlobResult<bool> {
        let blob = self.blob(&key.into());
        self.runner.run(|tr| has_chunks(tr, &blob))
    }

    pub fn size(&self, key: impl Into<Tuple>) -> BlobResult<u64> {
        let blob = self.blob(&key.into());
        self.runner.run(|tr| resolve_size(tr, &blob, self.layout))
    }

    pub fn chunk_size(&self) -> u64 {
        self.layout.chunk_size()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn blob(&self, key: &Tuple) -> Subspace {
        self.namespace.blob(key)
    }
}
