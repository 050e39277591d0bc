//! # cinema-stream
//!
//! A personal media library server. Videos found under a scan root are
//! recorded in a JSON catalog and served to browser players over HTTP with
//! byte-range support so that seeking works.
//!
//! The range machinery is generic over any body implementing [`RangeBody`].
//! Any type implementing both [`AsyncRead`] and [`AsyncSeekStart`] can be
//! used through the [`KnownSize`] adapter struct.
//!
//! [`AsyncSeekStart`] is a trait defined by this crate which only allows
//! seeking from the start of a file. It is automatically implemented for any
//! type implementing [`AsyncSeek`].
//!
//! ```no_run
//! use axum::Router;
//! use axum::http::HeaderMap;
//! use axum::routing::get;
//!
//! use cinema_stream::{range_header, KnownSize, Ranged};
//!
//! async fn file(headers: HeaderMap) -> axum::response::Response {
//!     let file = tokio::fs::File::open("movie.mp4").await.unwrap();
//!     let body = KnownSize::file(file).await.unwrap();
//!     let range = range_header(&headers).ok().flatten().map(str::to_owned);
//!     let video_mp4 = "video/mp4".parse().unwrap();
//!     Ranged::new(range, body, video_mp4).into_response()
//! }
//!
//! let _app = Router::<()>::new().route("/", get(file));
//! # use axum::response::IntoResponse;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod scanner;
pub mod server;

mod file;
mod range;
mod stream;

#[cfg(test)]
mod mock;

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, ContentType};
use mime_guess::Mime;
use tokio::io::{AsyncRead, AsyncSeek};

pub use file::KnownSize;
pub use range::{parse_range, range_header, ByteInterval, RangeError, RangeOutcome};
pub use stream::{RangedStream, StreamOptions, CHUNK_SIZE};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying file.
    ///
    /// This should not change for the lifetime of the object once queried.
    fn byte_size(&self) -> u64;
}

/// Picks the `Content-Type` for a media file from its extension, falling
/// back to `default` when the extension is unknown.
pub fn content_type_for(path: &Path, default: &Mime) -> Mime {
    mime_guess::from_path(path).first().unwrap_or_else(|| default.clone())
}

/// One-shot responder pairing a raw `Range` header with a body.
/// Implements [`IntoResponse`].
#[derive(Debug)]
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: Option<String>,
    body: B,
    content_type: Mime,
    options: StreamOptions,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and the raw value of an optional `Range` header.
    pub fn new(range: Option<String>, body: B, content_type: Mime) -> Self {
        Ranged { range, body, content_type, options: StreamOptions::default() }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`]. Returns a [`RangeRejection`] if the header was
    /// malformed, unsupported or not satisfiable.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeRejection> {
        let length = self.body.byte_size();
        let outcome = parse_range(self.range.as_deref(), length)
            .map_err(|error| RangeRejection::new(error, length))?;
        Ok(RangedResponse::build(outcome, self.body, self.content_type, self.options))
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}

/// Computed headers and body for a successful response. Implements [`IntoResponse`].
#[derive(Debug)]
pub enum RangedResponse<B> {
    /// No range requested, status 200.
    Full {
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
    },
    /// A single satisfiable range, status 206.
    Partial {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
    },
}

impl<B: RangeBody + Send + 'static> RangedResponse<B> {
    /// Assembles the response for an already validated outcome. The
    /// resource length is taken from the body.
    pub fn build(outcome: RangeOutcome, body: B, content_type: Mime, options: StreamOptions) -> Self {
        let length = body.byte_size();
        match outcome {
            RangeOutcome::Full => RangedResponse::Full {
                content_length: ContentLength(length),
                stream: RangedStream::new(body, 0, length, options),
                content_type,
            },
            RangeOutcome::Partial(interval) => RangedResponse::Partial {
                content_range: interval.content_range(length),
                content_length: ContentLength(interval.len()),
                stream: RangedStream::new(body, interval.start(), interval.len(), options),
                content_type,
            },
        }
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        let accept_ranges = TypedHeader(AcceptRanges::bytes());

        match self {
            RangedResponse::Full { content_length, stream, content_type } => (
                StatusCode::OK,
                accept_ranges,
                TypedHeader(content_length),
                TypedHeader(ContentType::from(content_type)),
                stream,
            ).into_response(),
            RangedResponse::Partial { content_range, content_length, stream, content_type } => (
                StatusCode::PARTIAL_CONTENT,
                accept_ranges,
                TypedHeader(content_range),
                TypedHeader(content_length),
                TypedHeader(ContentType::from(content_type)),
                stream,
            ).into_response(),
        }
    }
}

/// A `Range` header that cannot be honoured. Implements [`IntoResponse`]
/// with an empty body.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeRejection {
    /// Status 416, carrying `Content-Range: bytes */<length>`.
    NotSatisfiable(ContentRange),
    /// Status 400 for malformed or multi-range headers.
    BadRange(RangeError),
}

impl RangeRejection {
    pub fn new(error: RangeError, length: u64) -> Self {
        match error {
            RangeError::Unsatisfiable => {
                RangeRejection::NotSatisfiable(ContentRange::unsatisfied_bytes(length))
            }
            RangeError::Malformed | RangeError::Unsupported => RangeRejection::BadRange(error),
        }
    }
}

impl IntoResponse for RangeRejection {
    fn into_response(self) -> Response {
        let empty = TypedHeader(ContentLength(0));
        match self {
            RangeRejection::NotSatisfiable(content_range) => {
                tracing::debug!(?content_range, "range not satisfiable");
                (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    TypedHeader(AcceptRanges::bytes()),
                    TypedHeader(content_range),
                    empty,
                ).into_response()
            }
            RangeRejection::BadRange(error) => {
                tracing::debug!(%error, "rejected range header");
                (StatusCode::BAD_REQUEST, empty).into_response()
            }
        }
    }
}
