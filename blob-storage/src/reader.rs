//! Range reads: reassembling a byte window from the chunks that cover it.

use std::io;
use std::sync::Arc;

use crate::chunk::{chunk_index_from_key, chunk_key, ChunkLayout, MAX_CHUNK_INDEX};
use crate::errors::BlobResult;
use crate::handle::BlobIo;
use crate::store::{Transaction, TransactionRunner};
use crate::subspace::{key_after, Subspace};

/// Reads up to `size` bytes (everything to the end of the blob when `None`)
/// starting at `cursor`. Returns the bytes and the cursor just past them.
///
/// Reading past the end of the blob returns fewer bytes, possibly none.
#[tracing::instrument(level = "trace", skip(tr, blob))]
pub fn read_range(
    tr: &mut dyn Transaction,
    blob: &Subspace,
    layout: ChunkLayout,
    mut cursor: u64,
    size: Option<u64>,
) -> BlobResult<(Vec<u8>, u64)> {
    if size == Some(0) {
        return Ok((Vec::new(), cursor));
    }

    let start_key = chunk_key(blob, layout.chunk_index_of(cursor))?;
    let end_key = match size {
        Some(size) => {
            // range scans are exclusive at the end; step past the last chunk
            let last = layout
                .chunk_index_of(cursor.saturating_add(size))
                .min(MAX_CHUNK_INDEX);
            key_after(chunk_key(blob, last)?)
        }
        None => blob.range().1,
    };

    let mut out = Vec::new();
    let mut remaining = size;
    for (key, value) in tr.get_range(&start_key, &end_key, None, false)? {
        let base = layout.index_base(chunk_index_from_key(blob, &key)?)?;
        if cursor < base {
            // a gap below the last chunk; nothing past it is reachable
            break;
        }
        let start = ((cursor - base) as usize).min(value.len());
        let mut piece = &value[start..];
        if let Some(left) = remaining.as_mut() {
            if piece.len() as u64 > *left {
                piece = &piece[..*left as usize];
            }
            *left -= piece.len() as u64;
        }
        out.extend_from_slice(piece);
        cursor += piece.len() as u64;

        // stop exactly at the requested boundary, even when it is a chunk edge
        if remaining == Some(0) {
            break;
        }
    }
    Ok((out, cursor))
}

/// Seekable reader over one blob.
pub struct BlobReader<R: TransactionRunner> {
    io: BlobIo<R>,
}

impl<R: TransactionRunner> BlobReader<R> {
    pub fn new(runner: Arc<R>, blob: Subspace, layout: ChunkLayout) -> Self {
        Self {
            io: BlobIo::new(runner, blob, layout),
        }
    }

    /// Reads up to `size` bytes from the cursor, or everything left when
    /// `size` is `None`, and advances the cursor past them.
    pub fn read(&mut self, size: Option<u64>) -> BlobResult<Vec<u8>> {
        self.io.ensure_open()?;
        let (blob, layout, cursor) = (&self.io.blob, self.io.layout, self.io.cursor);
        let (buf, cursor) = self
            .io
            .runner
            .run(|tr| read_range(tr, blob, layout, cursor, size))?;
        self.io.cursor = cursor;
        Ok(buf)
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

impl<R: TransactionRunner> io::Read for BlobReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = BlobReader::read(self, Some(buf.len() as u64))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<R: TransactionRunner> io::Seek for BlobReader<R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        Ok(self.io.seek_from(pos)?)
    }
}
