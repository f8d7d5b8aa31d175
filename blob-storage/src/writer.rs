//! Chunk writes: boundary merges plus full-chunk stores, in one transaction.

use std::io;
use std::sync::Arc;

use crate::chunk::{chunk_key, ChunkLayout};
use crate::errors::{BlobError, BlobResult};
use crate::handle::BlobIo;
use crate::store::{Transaction, TransactionRunner};
use crate::subspace::Subspace;

/// Writes `data` at `cursor` and returns the offset just past it.
///
/// Spans that cover a whole chunk are stored as is. A span covering only part
/// of a chunk is merged with the chunk's current value: bytes before and after
/// the span are kept, so a write never shortens a chunk and only the last
/// chunk of a blob can be short. A span starting inside a chunk needs that
/// chunk to exist up to the span's offset, and a write starting on a chunk
/// boundary needs the chunk below it to be full, so chunks never have gaps.
#[tracing::instrument(level = "debug", skip(tr, blob, data), fields(len = data.len()))]
pub fn write_chunks(
    tr: &mut dyn Transaction,
    blob: &Subspace,
    layout: ChunkLayout,
    cursor: u64,
    data: &[u8],
) -> BlobResult<u64> {
    let end = cursor
        .checked_add(data.len() as u64)
        .ok_or(BlobError::OffsetOverflow)?;

    let first = layout.chunk_index_of(cursor);
    if !data.is_empty() && first > 0 && layout.within_chunk_offset(cursor) == 0 {
        let below = tr.get_for_update(&chunk_key(blob, first - 1)?)?;
        if below.map_or(true, |chunk| (chunk.len() as u64) < layout.chunk_size()) {
            return Err(BlobError::MissingChunkDuringMerge { index: first - 1 });
        }
    }

    let mut consumed = 0;
    for span in layout.split(cursor, data.len()) {
        let piece = &data[consumed..consumed + span.len];
        let key = chunk_key(blob, span.chunk_index)?;
        if span.covers_chunk(layout) {
            tr.set(&key, piece)?;
        } else {
            let existing = tr.get_for_update(&key)?;
            let merged = merge_chunk(existing.as_deref(), span.offset_in_chunk as usize, piece)
                .ok_or(BlobError::MissingChunkDuringMerge {
                    index: span.chunk_index,
                })?;
            tracing::trace!(
                "merged chunk {} at {}: {} -> {} bytes",
                span.chunk_index,
                span.offset_in_chunk,
                existing.as_ref().map_or(0, Vec::len),
                merged.len()
            );
            tr.set(&key, &merged)?;
        }
        consumed += span.len;
    }
    Ok(end)
}

/// Splices `piece` into `existing` at `offset`, keeping the bytes on both
/// sides. `None` when the chunk does not reach `offset`.
fn merge_chunk(existing: Option<&[u8]>, offset: usize, piece: &[u8]) -> Option<Vec<u8>> {
    let existing = existing.unwrap_or_default();
    if existing.len() < offset {
        return None;
    }
    let mut merged = Vec::with_capacity(existing.len().max(offset + piece.len()));
    merged.extend_from_slice(&existing[..offset]);
    merged.extend_from_slice(piece);
    if existing.len() > merged.len() {
        merged.extend_from_slice(&existing[merged.len()..]);
    }
    Some(merged)
}

/// Seekable writer over one blob.
pub struct BlobWriter<R: TransactionRunner> {
    io: BlobIo<R>,
}

impl<R: TransactionRunner> BlobWriter<R> {
    pub fn new(runner: Arc<R>, blob: Subspace, layout: ChunkLayout) -> Self {
        Self {
            io: BlobIo::new(runner, blob, layout),
        }
    }

    /// Writes `data` at the cursor in a single transaction and returns the new
    /// cursor. An empty write touches nothing.
    pub fn write(&mut self, data: &[u8]) -> BlobResult<u64> {
        self.io.ensure_open()?;
        if data.is_empty() {
            return Ok(self.io.cursor);
        }
        let (blob, layout, cursor) = (&self.io.blob, self.io.layout, self.io.cursor);
        let cursor = self
            .io
            .runner
            .run(|tr| write_chunks(tr, blob, layout, cursor, data))?;
        self.io.cursor = cursor;
        Ok(cursor)
    }

    pub fn tell(&self) -> u64 {
        self.io.tell()
    }

    pub fn seek(&mut self, delta: i64, whence: i32) -> BlobResult<u64> {
        self.io.seek(delta, whence)
    }

    pub fn size(&self) -> BlobResult<u64> {
        self.io.size()
    }

    pub fn close(&mut self) {
        self.io.close()
    }

    pub fn closed(&self) -> bool {
        self.io.closed()
    }
}

impl<R: TransactionRunner> io::Write for BlobWriter<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BlobWriter::write(self, buf)?;
        Ok(buf.len())
    }

    /// Every write is already committed.
    fn flush(&mut self) -> io::Result<()> {
        self.io.ensure_open()?;
        Ok(())
    }
}

impl<R: TransactionRunner> io::Seek for BlobWriter<R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        Ok(self.io.seek_from(pos)?)
    }
}
