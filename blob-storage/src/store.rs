//! The capability the blob layer needs from its backing key-value store.
//!
//! A store hands out [`Transaction`]s over an ordered byte key space and runs
//! transaction bodies through a [`TransactionRunner`], which commits them and
//! re-runs a body whose attempt hit a conflict.

use std::error::Error;

use thiserror::Error;

use crate::errors::{BlobError, BlobResult};

pub type KeyValue = (Vec<u8>, Vec<u8>);

pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Transaction conflict")]
    Conflict,

    #[error("Transaction did not commit after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Store backend failure: {0}")]
    Backend(#[source] Box<dyn Error + Send + Sync>),
}

impl KvError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        KvError::Backend(Box::new(err))
    }
}

/// Reads and writes made inside one atomic unit.
///
/// Range scans take an inclusive `begin` and an exclusive `end`.
pub trait Transaction {
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// Reads a key that the transaction is about to rewrite.
    ///
    /// Stores with optimistic concurrency register the key so that a
    /// concurrent commit touching it fails this transaction.
    fn get_for_update(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    fn clear(&mut self, key: &[u8]) -> KvResult<()>;

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> KvResult<()>;

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> KvResult<Vec<KeyValue>>;
}

pub trait TransactionRunner {
    /// Runs `body` inside a transaction and commits it.
    ///
    /// `body` may be invoked more than once: an attempt failing with a
    /// retryable error is discarded and the body re-run against a fresh
    /// transaction. Any other error is returned unchanged and nothing the
    /// attempt wrote becomes visible.
    fn run<T, F>(&self, body: F) -> BlobResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> BlobResult<T>;
}

/// Drives `attempt` until it stops failing with a retryable error.
pub fn retry_on_conflict<T, F>(max_attempts: u32, mut attempt: F) -> BlobResult<T>
where
    F: FnMut() -> BlobResult<T>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt() {
            Err(err) if err.is_retryable() => {
                if attempts >= max_attempts {
                    tracing::warn!("giving up after {} conflicting attempts", attempts);
                    return Err(BlobError::Kv(KvError::RetriesExhausted { attempts }));
                }
                tracing::debug!("transaction conflict on attempt {}, retrying", attempts);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_until_commit() {
        let mut calls = 0;
        let out = retry_on_conflict(5, || {
            calls += 1;
            if calls < 3 {
                Err(BlobError::Kv(KvError::Conflict))
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(out, 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let err = retry_on_conflict::<(), _>(2, || Err(BlobError::Kv(KvError::Conflict))).unwrap_err();
        assert!(matches!(err, BlobError::Kv(KvError::RetriesExhausted { attempts: 2 })));
    }

    #[test]
    fn test_non_retryable_error_surfaces_once() {
        let mut calls = 0;
        let err = retry_on_conflict::<(), _>(5, || {
            calls += 1;
            Err(BlobError::MissingChunkDuringMerge { index: 1 })
        })
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, BlobError::MissingChunkDuringMerge { index: 1 }));
    }
}
