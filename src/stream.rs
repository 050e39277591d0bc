use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use std::{io, mem};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::{pin_project, pinned_drop};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

use crate::AsyncSeekStart;

/// Largest chunk handed to the transport, 1 MiB.
pub const CHUNK_SIZE: usize = 1024 * 1024;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Tuning for [`RangedStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Upper bound on the size of each yielded chunk.
    pub chunk_size: usize,
    /// How long a single disk read may stay pending before the stream gives
    /// up with [`io::ErrorKind::TimedOut`]. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            chunk_size: CHUNK_SIZE,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

/// Response body stream over one byte interval of a seekable reader.
/// Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Reads are pulled lazily, one chunk per poll, so at most one chunk is
/// buffered regardless of the interval size. Dropping the stream releases
/// the reader and no further reads are issued.
#[pin_project(PinnedDrop)]
pub struct RangedStream<B> {
    state: StreamState,
    length: u64,
    remaining: u64,
    chunk_size: usize,
    idle_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    #[pin]
    body: B,
}

impl<B: AsyncRead + AsyncSeekStart> RangedStream<B> {
    /// Streams exactly `length` bytes of `body` starting at offset `start`.
    pub(crate) fn new(body: B, start: u64, length: u64, options: StreamOptions) -> Self {
        RangedStream {
            state: StreamState::Seek { start },
            length,
            remaining: length,
            chunk_size: options.chunk_size.max(1),
            idle_timeout: options.idle_timeout,
            deadline: None,
            body,
        }
    }

    /// Bytes yielded so far.
    pub fn bytes_sent(&self) -> u64 {
        self.length - self.remaining
    }

    /// Bytes still owed to the consumer.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("length", &self.length)
            .field("remaining", &self.remaining)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking,
    Reading { buffer: BytesMut },
    Done,
}

impl<B: AsyncRead + AsyncSeekStart + Send + 'static> IntoResponse for RangedStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, StreamState::Done)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: AsyncRead + AsyncSeekStart> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        loop {
            match this.state {
                StreamState::Seek { start } => {
                    if *this.remaining == 0 {
                        *this.state = StreamState::Done;
                        continue;
                    }
                    let start = *start;
                    if let Err(e) = this.body.as_mut().start_seek(start) {
                        tracing::error!(start, error = %e, "seek failed before streaming");
                        *this.state = StreamState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    *this.state = StreamState::Seeking;
                }

                StreamState::Seeking => match this.body.as_mut().poll_complete(cx) {
                    Poll::Pending => {
                        let Poll::Ready(timeout) = poll_deadline(this.deadline, *this.idle_timeout, cx) else {
                            return Poll::Pending;
                        };
                        tracing::error!(?timeout, "seek stalled, abandoning stream");
                        *this.state = StreamState::Done;
                        return Poll::Ready(Some(Err(stalled("seek stalled past the idle timeout"))));
                    }
                    Poll::Ready(Err(e)) => {
                        tracing::error!(error = %e, "seek failed before streaming");
                        *this.deadline = None;
                        *this.state = StreamState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Ready(Ok(())) => {
                        *this.deadline = None;
                        let buffer = allocate_buffer(*this.chunk_size, *this.remaining);
                        *this.state = StreamState::Reading { buffer };
                    }
                },

                StreamState::Reading { buffer } => {
                    if *this.remaining == 0 {
                        *this.state = StreamState::Done;
                        continue;
                    }

                    let uninit = buffer.spare_capacity_mut();

                    // the smallest of the spare capacity, the chunk bound and
                    // the number of bytes still owed
                    let nbytes = uninit
                        .len()
                        .min(*this.chunk_size)
                        .min(usize::try_from(*this.remaining).unwrap_or(usize::MAX));

                    let mut read_buf = ReadBuf::uninit(&mut uninit[..nbytes]);

                    match this.body.as_mut().poll_read(cx, &mut read_buf) {
                        Poll::Pending => {
                            let Poll::Ready(timeout) = poll_deadline(this.deadline, *this.idle_timeout, cx) else {
                                return Poll::Pending;
                            };
                            tracing::error!(
                                remaining = *this.remaining,
                                ?timeout,
                                "disk read stalled, abandoning stream"
                            );
                            *this.state = StreamState::Done;
                            return Poll::Ready(Some(Err(stalled("read stalled past the idle timeout"))));
                        }
                        Poll::Ready(Err(e)) => {
                            tracing::error!(
                                remaining = *this.remaining,
                                error = %e,
                                "read failed mid-stream"
                            );
                            *this.deadline = None;
                            *this.state = StreamState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        Poll::Ready(Ok(())) => {
                            *this.deadline = None;
                            let n = read_buf.filled().len();

                            if n == 0 {
                                tracing::warn!(
                                    remaining = *this.remaining,
                                    "file ended early, truncating stream"
                                );
                                *this.state = StreamState::Done;
                                return Poll::Ready(Some(Err(io::Error::new(
                                    io::ErrorKind::UnexpectedEof,
                                    "file shorter than the requested range",
                                ))));
                            }

                            // SAFETY: poll_read has initialised `n` more bytes
                            // of the spare capacity
                            unsafe { buffer.set_len(buffer.len() + n); }

                            // n <= remaining because of the min above
                            *this.remaining -= n as u64;

                            let next = allocate_buffer(*this.chunk_size, *this.remaining);
                            let chunk = mem::replace(buffer, next);
                            return Poll::Ready(Some(Ok(chunk.freeze())));
                        }
                    }
                }

                StreamState::Done => return Poll::Ready(None),
            }
        }
    }
}

#[pinned_drop]
impl<B> PinnedDrop for RangedStream<B> {
    fn drop(self: Pin<&mut Self>) {
        if self.remaining > 0 && !matches!(self.state, StreamState::Done) {
            tracing::debug!(
                sent = self.length - self.remaining,
                remaining = self.remaining,
                "stream dropped before completion"
            );
        }
    }
}

/// Arms the idle deadline on first use. Resolves with the timeout once it
/// has elapsed, clearing the deadline; never resolves without a timeout.
fn poll_deadline(
    deadline: &mut Option<Pin<Box<Sleep>>>,
    idle_timeout: Option<Duration>,
    cx: &mut Context<'_>,
) -> Poll<Duration> {
    let Some(timeout) = idle_timeout else {
        return Poll::Pending;
    };
    let sleep = deadline.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
    if sleep.as_mut().poll(cx).is_pending() {
        return Poll::Pending;
    }
    *deadline = None;
    Poll::Ready(timeout)
}

fn stalled(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, message)
}

fn allocate_buffer(chunk_size: usize, remaining: u64) -> BytesMut {
    let capacity = usize::try_from(remaining).map_or(chunk_size, |r| r.min(chunk_size));
    BytesMut::with_capacity(capacity)
}
