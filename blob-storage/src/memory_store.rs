//! In-memory [`TransactionRunner`] for local development and tests.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::BlobResult;
use crate::store::{retry_on_conflict, KeyValue, KvError, KvResult, Transaction, TransactionRunner};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// An ordered map guarded by one lock.
///
/// A transaction holds the lock for its whole body and works on a private
/// copy of the map, so transactions are trivially serializable and a failed
/// attempt leaves nothing behind. Commit conflicts can be injected to
/// exercise retry paths.
#[derive(Debug)]
pub struct MemoryKv {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    max_attempts: u32,
    pending_conflicts: AtomicU32,
    attempts: AtomicU64,
    commits: AtomicU64,
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            max_attempts: max_attempts.max(1),
            pending_conflicts: AtomicU32::new(0),
            attempts: AtomicU64::new(0),
            commits: AtomicU64::new(0),
        }
    }

    /// Makes the next `n` commits fail with [`KvError::Conflict`].
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    /// Transaction bodies started so far, retries included.
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// A copy of the committed contents.
    pub fn snapshot(&self) -> KvResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> KvResult<MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.data
            .lock()
            .map_err(|_| KvError::Backend("memory store lock poisoned".into()))
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl TransactionRunner for MemoryKv {
    fn run<T, F>(&self, mut body: F) -> BlobResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> BlobResult<T>,
    {
        retry_on_conflict(self.max_attempts, || {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut committed = self.lock()?;
            let mut tr = MemoryTransaction {
                working: committed.clone(),
                dirty: false,
            };
            let out = body(&mut tr)?;
            if self.take_conflict() {
                return Err(KvError::Conflict.into());
            }
            if tr.dirty {
                *committed = tr.working;
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(out)
        })
    }
}

struct MemoryTransaction {
    working: BTreeMap<Vec<u8>, Vec<u8>>,
    dirty: bool,
}

impl Transaction for MemoryTransaction {
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        Ok(self.working.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.working.insert(key.to_vec(), value.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        self.dirty |= self.working.remove(key).is_some();
        Ok(())
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> KvResult<()> {
        let before = self.working.len();
        self.working
            .retain(|key, _| key.as_slice() < begin || key.as_slice() >= end);
        self.dirty |= self.working.len() != before;
        Ok(())
    }

    fn get_range(
        &mut self,
        begin: &[u8],
        end: &[u8],
        limit: Option<usize>,
        reverse: bool,
    ) -> KvResult<Vec<KeyValue>> {
        if begin >= end {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(usize::MAX);
        let pairs = self
            .working
            .range::<[u8], _>((Bound::Included(begin), Bound::Excluded(end)))
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(if reverse {
            pairs.rev().take(limit).collect()
        } else {
            pairs.take(limit).collect()
        })
    }
}
