//! Blob length, derived from the highest chunk instead of a stored length field.

use crate::chunk::{chunk_index_from_key, ChunkLayout};
use crate::errors::{BlobError, BlobResult};
use crate::store::Transaction;
use crate::subspace::Subspace;

/// Length of the blob whose chunks live under `blob`: base offset of the last
/// chunk plus that chunk's length, or 0 when there are no chunks.
#[tracing::instrument(level = "trace", skip(tr, blob))]
pub fn resolve_size(tr: &mut dyn Transaction, blob: &Subspace, layout: ChunkLayout) -> BlobResult<u64> {
    let (begin, end) = blob.range();
    let last = tr.get_range(&begin, &end, Some(1), true)?;
    let Some((key, value)) = last.into_iter().next() else {
        return Ok(0);
    };
    let base = layout.index_base(chunk_index_from_key(blob, &key)?)?;
    base.checked_add(value.len() as u64)
        .ok_or(BlobError::OffsetOverflow)
}

/// True when at least one chunk exists under `blob`.
pub fn has_chunks(tr: &mut dyn Transaction, blob: &Subspace) -> BlobResult<bool> {
    let (begin, end) = blob.range();
    Ok(!tr.get_range(&begin, &end, Some(1), true)?.is_empty())
}
