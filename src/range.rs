//! Parsing of the `Range` request header.
//!
//! Only the single-range form `bytes=<start>-[<end>]` is accepted. Suffix
//! ranges (`bytes=-500`) are rejected as malformed and comma separated range
//! sets are rejected as unsupported; neither is reinterpreted.

use std::fmt;

use axum::http::{header, HeaderMap};
use axum_extra::headers::ContentRange;
use thiserror::Error;

const BYTES_UNIT: &str = "bytes=";

/// Inclusive byte interval, always satisfiable against the resource length
/// it was validated with. Only [`parse_range`] constructs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteInterval {
    start: u64,
    end: u64,
}

impl ByteInterval {
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last byte offset, inclusive.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range: bytes <start>-<end>/<length>` for this interval.
    pub fn content_range(&self, length: u64) -> ContentRange {
        ContentRange::bytes(self.start..=self.end, length)
            .expect("a validated interval always forms a valid content range")
    }
}

impl fmt::Display for ByteInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// What a request asked for once its range header has been validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No range header; the whole resource is served with status 200.
    Full,
    /// A satisfiable single range, served with status 206.
    Partial(ByteInterval),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("malformed range header")]
    Malformed,

    #[error("range start lies beyond the end of the resource")]
    Unsatisfiable,

    #[error("multiple ranges are not supported")]
    Unsupported,
}

/// Validates a raw `Range` header value against the resource length.
///
/// An absent header yields [`RangeOutcome::Full`]. An end offset past the
/// last byte is clamped to `length - 1`; a start offset at or past `length`
/// is [`RangeError::Unsatisfiable`] whatever the end offset says.
pub fn parse_range(header: Option<&str>, length: u64) -> Result<RangeOutcome, RangeError> {
    let Some(header) = header else {
        return Ok(RangeOutcome::Full);
    };

    let spec = strip_unit(header.trim()).ok_or(RangeError::Malformed)?;
    if spec.contains(',') {
        return Err(RangeError::Unsupported);
    }

    let (first, last) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let (first, last) = (first.trim(), last.trim());

    // suffix form, `bytes=-N`
    if first.is_empty() {
        return Err(RangeError::Malformed);
    }

    let start = parse_position(first)?;
    let end = match last {
        "" => None,
        last => Some(parse_position(last)?),
    };

    if start >= length {
        return Err(RangeError::Unsatisfiable);
    }

    let end = match end {
        Some(end) if end < start => return Err(RangeError::Malformed),
        Some(end) => end.min(length - 1),
        None => length - 1,
    };

    Ok(RangeOutcome::Partial(ByteInterval { start, end }))
}

/// Pulls the raw `Range` value out of request headers.
///
/// More than one `Range` line is treated as a multi-range request.
pub fn range_header(headers: &HeaderMap) -> Result<Option<&str>, RangeError> {
    let mut values = headers.get_all(header::RANGE).iter();
    let Some(value) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(RangeError::Unsupported);
    }
    value.to_str().map(Some).map_err(|_| RangeError::Malformed)
}

fn strip_unit(header: &str) -> Option<&str> {
    let unit = header.get(..BYTES_UNIT.len())?;
    if unit.eq_ignore_ascii_case(BYTES_UNIT) {
        Some(&header[BYTES_UNIT.len()..])
    } else {
        None
    }
}

fn parse_position(digits: &str) -> Result<u64, RangeError> {
    // u64::from_str would also take a leading '+'
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    digits.parse().map_err(|_| RangeError::Malformed)
}
