//! Cursor state and seeking shared by readers and writers.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::chunk::ChunkLayout;
use crate::errors::{BlobError, BlobResult};
use crate::size::resolve_size;
use crate::store::TransactionRunner;
use crate::subspace::Subspace;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// Origin a seek delta is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = BlobError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        match raw {
            SEEK_SET => Ok(Whence::Start),
            SEEK_CUR => Ok(Whence::Current),
            SEEK_END => Ok(Whence::End),
            other => Err(BlobError::UnsupportedSeekMode(other)),
        }
    }
}

/// New cursor for a seek, clamped into `[0, size]`.
pub fn resolve_seek(current: u64, delta: i64, whence: Whence, size: u64) -> u64 {
    let origin = match whence {
        Whence::Start => 0,
        Whence::Current => i128::from(current),
        Whence::End => i128::from(size),
    };
    (origin + i128::from(delta)).clamp(0, i128::from(size)) as u64
}

/// The part of a blob handle both readers and writers carry. The cursor is
/// never persisted; a handle must not be shared between callers.
pub(crate) struct BlobIo<R: TransactionRunner> {
    pub(crate) runner: Arc<R>,
    pub(crate) blob: Subspace,
    pub(crate) layout: ChunkLayout,
    pub(crate) cursor: u64,
    closed: bool,
}

impl<R: TransactionRunner> BlobIo<R> {
    pub(crate) fn new(runner: Arc<R>, blob: Subspace, layout: ChunkLayout) -> Self {
        Self {
            runner,
            blob,
            layout,
            cursor: 0,
            closed: false,
        }
    }

    pub(crate) fn ensure_open(&self) -> BlobResult<()> {
        if self.closed {
            return Err(BlobError::ClosedHandle);
        }
        Ok(())
    }

    pub(crate) fn tell(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn size(&self) -> BlobResult<u64> {
        self.ensure_open()?;
        self.runner
            .run(|tr| resolve_size(tr, &self.blob, self.layout))
    }

    /// Moves the cursor; an unknown `whence` leaves it where it was.
    pub(crate) fn seek(&mut self, delta: i64, whence: i32) -> BlobResult<u64> {
        self.ensure_open()?;
        let whence = Whence::try_from(whence)?;
        self.seek_to(delta, whence)
    }

    pub(crate) fn seek_from(&mut self, pos: SeekFrom) -> BlobResult<u64> {
        self.ensure_open()?;
        let (delta, whence) = match pos {
            SeekFrom::Start(offset) => (i64::try_from(offset).unwrap_or(i64::MAX), Whence::Start),
            SeekFrom::Current(delta) => (delta, Whence::Current),
            SeekFrom::End(delta) => (delta, Whence::End),
        };
        self.seek_to(delta, whence)
    }

    fn seek_to(&mut self, delta: i64, whence: Whence) -> BlobResult<u64> {
        let current = self.cursor;
        let cursor = self.runner.run(|tr| {
            let size = resolve_size(tr, &self.blob, self.layout)?;
            Ok(resolve_seek(current, delta, whence, size))
        })?;
        tracing::trace!("seek {:?}{:+} -> {}", whence, delta, cursor);
        self.cursor = cursor;
        Ok(cursor)
    }
}
