//! Key prefixes.
//!
//! A [`Subspace`] is a raw byte prefix under which tuple-encoded keys live. A
//! [`Namespace`] is a subspace registered under a hierarchical path, so one
//! blob store's chunks stay isolated from everything else in the key space.

use crate::errors::{BlobError, BlobResult};
use crate::store::TransactionRunner;
use crate::tuple::{Element, Tuple, TupleError};

/// Reserved first byte of namespace registration records.
const NODE_PREFIX: u8 = 0xFE;

/// Counter handing out namespace prefixes. No packed tuple starts with 0xFF,
/// so this never collides with a registration record.
const ALLOCATOR_KEY: [u8; 2] = [NODE_PREFIX, 0xFF];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    pub fn new(tuple: &Tuple) -> Self {
        Self {
            prefix: tuple.pack(),
        }
    }

    pub fn from_bytes(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn raw_prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// The subspace nested under `suffix`.
    pub fn subspace(&self, suffix: &Tuple) -> Subspace {
        Subspace {
            prefix: self.pack(suffix),
        }
    }

    pub fn pack(&self, key: &Tuple) -> Vec<u8> {
        let mut out = self.prefix.clone();
        key.pack_into(&mut out);
        out
    }

    pub fn unpack(&self, key: &[u8]) -> Result<Tuple, TupleError> {
        match key.strip_prefix(self.prefix.as_slice()) {
            Some(rest) => Tuple::unpack(rest),
            None => Err(TupleError::PrefixMismatch),
        }
    }

    /// `[prefix 0x00, prefix 0xFF)`: every tuple key packed in this subspace.
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xFF);
        (begin, end)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }
}

/// The first key strictly greater than `key`.
///
/// Used to make an exclusive-end range scan include `key` itself.
pub fn key_after(mut key: Vec<u8>) -> Vec<u8> {
    key.push(0x00);
    key
}

/// A subspace bound to a durable, hierarchical path such as `["blobs"]`.
///
/// The path is only a name: the keys live under a short prefix allocated when
/// the namespace is first registered, so `["a"]` and `["a", "b"]` never share
/// keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    path: Vec<String>,
    space: Subspace,
}

impl Namespace {
    /// Opens the namespace at `path`, registering it first if it is new.
    #[tracing::instrument(level = "debug", skip(runner))]
    pub fn create_or_open<R: TransactionRunner>(runner: &R, path: &[String]) -> BlobResult<Self> {
        validate_path(path)?;
        let node = node_key(path);
        let prefix = runner.run(|tr| match tr.get(&node)? {
            Some(prefix) => Ok(prefix),
            None => {
                let id = match tr.get(&ALLOCATOR_KEY)? {
                    Some(raw) => Tuple::unpack(&raw)?
                        .last()
                        .and_then(Element::as_int)
                        .ok_or_else(|| BlobError::CorruptKey { key: raw.clone() })?,
                    None => 0,
                };
                let next = id.checked_add(1).ok_or(BlobError::OffsetOverflow)?;
                tr.set(&ALLOCATOR_KEY, &Tuple::from(next).pack())?;
                // integer elements are self-delimiting, so no allocated
                // prefix is a prefix of another
                let prefix = Tuple::from(id).pack();
                tr.set(&node, &prefix)?;
                tracing::debug!("registered namespace {:?} with prefix {:02x?}", path, prefix);
                Ok(prefix)
            }
        })?;
        Ok(Self {
            path: path.to_vec(),
            space: Subspace::from_bytes(prefix),
        })
    }

    /// Opens a namespace that must already be registered.
    pub fn open<R: TransactionRunner>(runner: &R, path: &[String]) -> BlobResult<Self> {
        validate_path(path)?;
        let node = node_key(path);
        let prefix = runner
            .run(|tr| Ok(tr.get(&node)?))?
            .ok_or_else(|| BlobError::NamespaceNotFound(path.to_vec()))?;
        Ok(Self {
            path: path.to_vec(),
            space: Subspace::from_bytes(prefix),
        })
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn subspace(&self) -> &Subspace {
        &self.space
    }

    /// Key range owned by one blob.
    pub fn blob(&self, key: &Tuple) -> Subspace {
        self.space.subspace(key)
    }
}

pub(crate) fn validate_path(path: &[String]) -> BlobResult<()> {
    if path.is_empty() || path.iter().any(|segment| segment.is_empty()) {
        return Err(BlobError::InvalidNamespace(path.to_vec()));
    }
    Ok(())
}

fn path_tuple(path: &[String]) -> Tuple {
    path.iter().map(|segment| Element::String(segment.clone())).collect()
}

fn node_key(path: &[String]) -> Vec<u8> {
    let mut key = vec![NODE_PREFIX];
    path_tuple(path).pack_into(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryKv;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_range_brackets_packed_keys() {
        let space = Subspace::new(&Tuple::new().push("blobs"));
        let (begin, end) = space.range();
        let key = space.pack(&Tuple::new().push("a").push(3i64));
        assert!(begin < key && key < end);
        assert!(space.contains(&key));
        assert_eq!(space.unpack(&key).unwrap(), Tuple::new().push("a").push(3i64));
    }

    #[test]
    fn test_sibling_blob_ranges_do_not_overlap() {
        let space = Subspace::new(&Tuple::new().push("blobs"));
        let a = space.subspace(&Tuple::from("a"));
        let nested = space.subspace(&Tuple::from("a\u{0}b"));
        let (begin, end) = a.range();
        let foreign = nested.pack(&Tuple::from(0i64));
        assert!(!(begin <= foreign && foreign < end));
    }

    #[test]
    fn test_unpack_rejects_foreign_key() {
        let space = Subspace::new(&Tuple::new().push("blobs"));
        let other = Subspace::new(&Tuple::new().push("other"));
        let key = other.pack(&Tuple::from(1i64));
        assert_eq!(space.unpack(&key), Err(TupleError::PrefixMismatch));
    }

    #[test]
    fn test_key_after_is_next_key() {
        let key = vec![0x01, 0x02];
        let next = key_after(key.clone());
        assert!(key < next);
        assert!(next < vec![0x01, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_create_or_open_is_stable() {
        let kv = MemoryKv::new();
        let created = Namespace::create_or_open(&kv, &path(&["blobs"])).unwrap();
        let reopened = Namespace::create_or_open(&kv, &path(&["blobs"])).unwrap();
        assert_eq!(created, reopened);
        assert_eq!(created.path(), &path(&["blobs"])[..]);
        let opened = Namespace::open(&kv, &path(&["blobs"])).unwrap();
        assert_eq!(opened.subspace(), created.subspace());
    }

    #[test]
    fn test_distinct_paths_are_isolated() {
        let kv = MemoryKv::new();
        let a = Namespace::create_or_open(&kv, &path(&["tenant", "a"])).unwrap();
        let b = Namespace::create_or_open(&kv, &path(&["tenant", "b"])).unwrap();
        let key = a.blob(&Tuple::from("x")).pack(&Tuple::from(0i64));
        assert!(!b.subspace().contains(&key));
    }

    #[test]
    fn test_parent_and_child_paths_are_isolated() {
        let kv = MemoryKv::new();
        let parent = Namespace::create_or_open(&kv, &path(&["tenant"])).unwrap();
        let child = Namespace::create_or_open(&kv, &path(&["tenant", "a"])).unwrap();
        let child_key = child.blob(&Tuple::from("x")).pack(&Tuple::from(0i64));
        let (begin, end) = parent.blob(&Tuple::from("a")).range();
        assert!(!parent.subspace().contains(&child_key));
        assert!(!(begin <= child_key && child_key < end));
    }

    #[test]
    fn test_open_missing_namespace() {
        let kv = MemoryKv::new();
        let err = Namespace::open(&kv, &path(&["nope"])).unwrap_err();
        assert!(matches!(err, BlobError::NamespaceNotFound(_)));
    }

    #[test]
    fn test_invalid_paths_rejected() {
        let kv = MemoryKv::new();
        assert!(matches!(
            Namespace::create_or_open(&kv, &[]),
            Err(BlobError::InvalidNamespace(_))
        ));
        assert!(matches!(
            Namespace::create_or_open(&kv, &path(&["blobs", ""])),
            Err(BlobError::InvalidNamespace(_))
        ));
    }
}
