//! Chunk layout: mapping blob byte offsets onto fixed-size chunks and chunk keys.

use crate::errors::{BlobError, BlobResult};
use crate::subspace::Subspace;
use crate::tuple::{Element, Tuple};

/// 10 KiB, comfortably under the value size limits of transactional stores.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024;

/// Largest chunk index that still packs as a tuple integer.
pub const MAX_CHUNK_INDEX: u64 = i64::MAX as u64;

/// Fixed chunk size of one blob store. Every chunk except the last of a blob
/// holds exactly `chunk_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: u64,
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkLayout {
    pub fn new(chunk_size: u64) -> BlobResult<Self> {
        if chunk_size == 0 {
            return Err(BlobError::InvalidConfig("chunk_size must be positive".into()));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_index_of(&self, offset: u64) -> u64 {
        offset / self.chunk_size
    }

    pub fn chunk_base(&self, offset: u64) -> u64 {
        self.chunk_index_of(offset) * self.chunk_size
    }

    pub fn within_chunk_offset(&self, offset: u64) -> u64 {
        offset - self.chunk_base(offset)
    }

    /// Byte offset of the first byte of chunk `index`.
    pub fn index_base(&self, index: u64) -> BlobResult<u64> {
        index
            .checked_mul(self.chunk_size)
            .ok_or(BlobError::OffsetOverflow)
    }

    /// Splits the byte range `[offset, offset + len)` into per-chunk spans.
    pub fn split(&self, mut offset: u64, len: usize) -> Vec<ChunkSpan> {
        let mut remaining = len as u64;
        let mut out = Vec::new();
        while remaining > 0 {
            let offset_in_chunk = self.within_chunk_offset(offset);
            let take = (self.chunk_size - offset_in_chunk).min(remaining);
            out.push(ChunkSpan {
                chunk_index: self.chunk_index_of(offset),
                offset_in_chunk,
                len: take as usize,
            });
            offset += take;
            remaining -= take;
        }
        out
    }
}

/// The part of a byte range that falls inside one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub chunk_index: u64,
    pub offset_in_chunk: u64,
    pub len: usize,
}

impl ChunkSpan {
    /// True when the span replaces the whole chunk.
    pub fn covers_chunk(&self, layout: ChunkLayout) -> bool {
        self.offset_in_chunk == 0 && self.len as u64 == layout.chunk_size()
    }
}

pub fn chunk_key(blob: &Subspace, index: u64) -> BlobResult<Vec<u8>> {
    let index = i64::try_from(index).map_err(|_| BlobError::OffsetOverflow)?;
    Ok(blob.pack(&Tuple::from(index)))
}

pub fn chunk_index_from_key(blob: &Subspace, key: &[u8]) -> BlobResult<u64> {
    let tuple = blob.unpack(key)?;
    match tuple.elements() {
        [Element::Int(index)] if *index >= 0 => Ok(*index as u64),
        _ => Err(BlobError::CorruptKey { key: key.to_vec() }),
    }
}
