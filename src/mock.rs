//! Seekable in-memory readers for exercising the streaming path without
//! touching the disk.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// Byte stored at `offset` in a [`PatternFile`].
pub fn pattern(offset: u64) -> u8 {
    (offset % 251) as u8
}

/// A virtual file of any size whose contents are derived from the offset,
/// so multi-gigabyte files cost nothing. Counts completed reads.
pub struct PatternFile {
    len: u64,
    readable: u64,
    pos: u64,
    reads: Arc<AtomicUsize>,
}

impl PatternFile {
    pub fn new(len: u64) -> (Self, Arc<AtomicUsize>) {
        Self::truncated(len, len)
    }

    /// Claims `len` bytes but runs out after `readable`, as if the file was
    /// truncated after its size was taken.
    pub fn truncated(len: u64, readable: u64) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let file = PatternFile { len, readable, pos: 0, reads: reads.clone() };
        (file, reads)
    }
}

impl AsyncRead for PatternFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let available = self.readable.saturating_sub(self.pos);
        let n = (buf.remaining() as u64).min(available) as usize;
        let start = self.pos;
        let bytes: Vec<u8> = (start..start + n as u64).map(pattern).collect();
        buf.put_slice(&bytes);
        self.pos += n as u64;
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for PatternFile {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        let pos = match position {
            io::SeekFrom::Start(pos) => Some(pos),
            io::SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            io::SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        self.pos = pos.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek out of range"))?;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.pos))
    }
}

/// A reader whose reads never complete.
pub struct StallingFile;

impl AsyncRead for StallingFile {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncSeek for StallingFile {
    fn start_seek(self: Pin<&mut Self>, _position: io::SeekFrom) -> io::Result<()> {
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(0))
    }
}

/// A reader whose seeks never complete.
pub struct StallingSeek;

impl AsyncRead for StallingSeek {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for StallingSeek {
    fn start_seek(self: Pin<&mut Self>, _position: io::SeekFrom) -> io::Result<()> {
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Pending
    }
}
