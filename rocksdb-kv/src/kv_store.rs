use blob_store::{retry_on_conflict, BlobResult, KeyValue, KvError, KvResult, Transaction, TransactionRunner};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, OptimisticTransactionDB,
    OptimisticTransactionOptions, Options, ReadOptions, WriteOptions,
};

use crate::config::RocksKvConfig;

/// Column family holding every key of the store.
const KV_CF: &str = "kv";

/// A [`TransactionRunner`] over a RocksDB optimistic transaction database.
///
/// Writes are buffered in the transaction and validated at commit: if a key
/// written or read for update changed after the transaction began, the commit
/// fails with [`KvError::Conflict`] and the body is run again.
pub struct RocksKv {
    db: OptimisticTransactionDB,
    max_attempts: u32,
    sync_writes: bool,
}

fn map_err(err: rocksdb::Error) -> KvError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TryAgain => KvError::Conflict,
        _ => KvError::backend(err),
    }
}

impl RocksKv {
    #[tracing::instrument(level = "debug")]
    pub fn open(config: &RocksKvConfig) -> KvResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        let kv = ColumnFamilyDescriptor::new(KV_CF, Options::default());
        let db = OptimisticTransactionDB::open_cf_descriptors(&db_opts, &config.path, vec![kv])
            .map_err(KvError::backend)?;
        Ok(Self {
            db,
            max_attempts: config.max_attempts.max(1),
            sync_writes: config.sync_writes,
        })
    }

    fn kv(&self) -> KvResult<&ColumnFamily> {
        self.db
            .cf_handle(KV_CF)
            .ok_or_else(|| KvError::Backend(format!("missing column family {KV_CF}").into()))
    }
}

impl TransactionRunner for RocksKv {
    fn run<T, F>(&self, mut body: F) -> BlobResult<T>
    where
        F: FnMut(&mut dyn Transaction) -> BlobResult<T>,
    {
        let cf = self.kv()?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        let mut txn_opts = OptimisticTransactionOptions::new();
        txn_opts.set_snapshot(true);

        retry_on_conflict(self.max_attempts, || {
            let mut tr = RocksTransaction {
                txn: self.db.transaction_opt(&write_opts, &txn_opts),
                cf,
            };
            let out = body(&mut tr)?;
            tr.txn.commit().map_err(map_err)?;
            Ok(out)
        })
    }
}

/// One attempt. Dropping it without committing rolls it back.
struct RocksTransaction<'db> {
    txn: rocksdb::Transaction<'db, OptimisticTransactionDB>,
    cf: &'db ColumnFamily,
}

impl RocksTransaction<'_> {
    fn bounded(begin: &[u8], end: &[u8]) -> ReadOptions {
        let mut opts = ReadOptions::default();
        opts.set_iterate_lower_bound(begin.to_vec());
        opts.set_iterate_upper_bound(end.to_vec());
        opts
    }
}

impl Transaction for RocksTransaction<'_> {
    fn get(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.txn.get_cf(self.cf, key).map_err(map_err)
    }

    fn get_for_update(&mut self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.txn.get_for_update_cf(self.cf, key, true).map_err(map_err)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.txn.put_cf(self.cf, key, value).map_err(map_err)
    }

    fn clear(&mut self, key: &[u8]) -> KvResult<()> {
        self.txn.delete_cf(self.cf, key).map_err(map_err)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn clear_range(&mut self, begin: &[u8], end: &[u8]) -> KvResult<()> {
        // the transaction has no range tombstone, so delete key by key
        let keys = self.get_range(begin, end, None, false)?;
        tracing::debug!("clearing {} keys", keys.len());
        for (key, _) in keys {
            self.txn.delete_cf(self.cf, &key).map_err(map_err)?;
        }
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
        let mode = if reverse {
            IteratorMode::End
        } else {
            IteratorMode::Start
        };
        let mut out = Vec::new();
        for res in self
            .txn
            .iterator_cf_opt(self.cf, Self::bounded(begin, end), mode)
            .take(limit.unwrap_or(usize::MAX))
        {
            let (key, value) = res.map_err(map_err)?;
            out.push((key.into_vec(), value.into_vec()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blob_store::{BlobConfig, BlobError, BlobManager, SEEK_SET};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use uuid::Uuid;

    fn setup_test_db() -> (RocksKv, TempDir) {
        let temp_dir = tempdir().unwrap();
        let kv = RocksKv::open(&RocksKvConfig::new(temp_dir.path())).unwrap();
        (kv, temp_dir)
    }

    fn seed(kv: &RocksKv, keys: &[&[u8]]) {
        kv.run(|tr| {
            for key in keys {
                tr.set(key, key)?;
            }
            Ok(())
        })
        .unwrap();
    }

    fn keys(pairs: Vec<KeyValue>) -> Vec<Vec<u8>> {
        pairs.into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_get_set_clear() {
        let (kv, _dir) = setup_test_db();
        seed(&kv, &[b"a"]);
        assert_eq!(kv.run(|tr| Ok(tr.get(b"a")?)).unwrap(), Some(b"a".to_vec()));
        kv.run(|tr| Ok(tr.clear(b"a")?)).unwrap();
        assert_eq!(kv.run(|tr| Ok(tr.get(b"a")?)).unwrap(), None);
    }

    #[test]
    fn test_range_bounds_and_direction() {
        let (kv, _dir) = setup_test_db();
        seed(&kv, &[b"a", b"b", b"c", b"d"]);

        let forward = kv.run(|tr| Ok(tr.get_range(b"b", b"d", None, false)?)).unwrap();
        assert_eq!(keys(forward), vec![b"b".to_vec(), b"c".to_vec()]);

        let last = kv.run(|tr| Ok(tr.get_range(b"a", b"d", Some(1), true)?)).unwrap();
        assert_eq!(keys(last), vec![b"c".to_vec()]);

        let first_two = kv.run(|tr| Ok(tr.get_range(b"a", b"z", Some(2), false)?)).unwrap();
        assert_eq!(keys(first_two), vec![b"a".to_vec(), b"b".to_vec()]);

        let empty = kv.run(|tr| Ok(tr.get_range(b"d", b"a", None, true)?)).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_reads_see_own_writes() {
        let (kv, _dir) = setup_test_db();
        let seen = kv
            .run(|tr| {
                tr.set(b"x1", b"1")?;
                tr.set(b"x2", b"2")?;
                Ok(tr.get_range(b"x", b"y", None, true)?)
            })
            .unwrap();
        assert_eq!(keys(seen), vec![b"x2".to_vec(), b"x1".to_vec()]);
    }

    #[test]
    fn test_clear_range() {
        let (kv, _dir) = setup_test_db();
        seed(&kv, &[b"a", b"b", b"c"]);
        kv.run(|tr| Ok(tr.clear_range(b"a", b"c")?)).unwrap();
        let left = kv.run(|tr| Ok(tr.get_range(b"\x00", b"\xff", None, false)?)).unwrap();
        assert_eq!(keys(left), vec![b"c".to_vec()]);
    }

    #[test]
    fn test_failed_body_rolls_back() {
        let (kv, _dir) = setup_test_db();
        let res: BlobResult<()> = kv.run(|tr| {
            tr.set(b"a", b"1")?;
            Err(BlobError::ClosedHandle)
        });
        assert!(matches!(res, Err(BlobError::ClosedHandle)));
        assert_eq!(kv.run(|tr| Ok(tr.get(b"a")?)).unwrap(), None);
    }

    #[test]
    fn test_conflicting_commit_is_retried() {
        let (kv, _dir) = setup_test_db();
        seed(&kv, &[b"k"]);
        let mut attempts = 0;
        let out = kv
            .run(|tr| {
                attempts += 1;
                tr.get_for_update(b"k")?;
                if attempts == 1 {
                    // a writer outside the transaction gets there first
                    kv.db.put_cf(kv.kv()?, b"k", b"outside").unwrap();
                }
                tr.set(b"k", b"inside")?;
                Ok(attempts)
            })
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(kv.run(|tr| Ok(tr.get(b"k")?)).unwrap(), Some(b"inside".to_vec()));
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let config = RocksKvConfig::new(temp_dir.path());
        {
            let kv = RocksKv::open(&config).unwrap();
            seed(&kv, &[b"durable"]);
        }
        let kv = RocksKv::open(&config).unwrap();
        assert_eq!(kv.run(|tr| Ok(tr.get(b"durable")?)).unwrap(), Some(b"durable".to_vec()));
    }

    #[test]
    fn test_blob_manager_round_trip() {
        let (kv, _dir) = setup_test_db();
        let config = BlobConfig {
            chunk_size: 4,
            ..BlobConfig::default()
        };
        let blobs = BlobManager::open(Arc::new(kv), &config).unwrap();
        let key = Uuid::new_v4().to_string();

        blobs.write(key.as_str(), b"abcdefg").unwrap();
        assert_eq!(blobs.size(key.as_str()).unwrap(), 7);

        let mut writer = blobs.writer(key.as_str());
        writer.seek(5, SEEK_SET).unwrap();
        writer.write(b"XYZ").unwrap();

        let mut reader = blobs.reader(key.as_str());
        reader.seek(2, SEEK_SET).unwrap();
        assert_eq!(reader.read(None).unwrap(), b"cdeXYZ");

        blobs.delete(key.as_str()).unwrap();
        assert!(!blobs.exists(key.as_str()).unwrap());
        assert!(blobs.read(key.as_str()).unwrap().is_empty());
    }
}
