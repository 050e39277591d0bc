use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures outside the request path: configuration, catalog persistence,
/// scanning and metadata lookup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid default content type {0:?}")]
    InvalidContentType(String),

    #[error("invalid catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("metadata lookup failed with HTTP {0}")]
    MetadataStatus(reqwest::StatusCode),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures while serving `/stream/{id}`, before any body byte is sent.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("no catalog entry for id {0:?}")]
    UnknownId(String),

    #[error("cataloged file is missing on disk: {}", .0.display())]
    MissingFile(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub fn status(&self) -> StatusCode {
        match self {
            StreamError::UnknownId(_) | StreamError::MissingFile(_) => StatusCode::NOT_FOUND,
            StreamError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            StreamError::UnknownId(_) => tracing::debug!(error = %self, "stream request rejected"),
            StreamError::MissingFile(_) => tracing::warn!(error = %self, "stale catalog entry"),
            StreamError::Io(_) => tracing::error!(error = %self, "failed to open media file"),
        }
        // never echo paths or OS errors to clients
        let body = match status {
            StatusCode::NOT_FOUND => "not found",
            _ => "internal server error",
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_error_statuses() {
        assert_eq!(StatusCode::NOT_FOUND, StreamError::UnknownId("7".into()).status());
        assert_eq!(StatusCode::NOT_FOUND, StreamError::MissingFile("/v/a.mp4".into()).status());
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, StreamError::from(io).status());
    }

    #[tokio::test]
    async fn response_body_hides_paths() {
        let response = StreamError::MissingFile("/srv/media/private.mp4".into()).into_response();
        assert_eq!(StatusCode::NOT_FOUND, response.status());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&b"not found"[..], &body[..]);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied: /srv/media");
        let response = StreamError::from(io).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&b"internal server error"[..], &body[..]);
    }

    #[test]
    fn messages() {
        assert_eq!("no catalog entry for id \"42\"", StreamError::UnknownId("42".into()).to_string());
        assert_eq!(
            "cataloged file is missing on disk: /v/a.mp4",
            StreamError::MissingFile("/v/a.mp4".into()).to_string()
        );
    }
}
