//! HTTP surface: catalog listing and the `/stream/{id}` endpoint.

use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mime_guess::Mime;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::catalog::{Catalog, MediaEntry};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::{content_type_for, parse_range, range_header, KnownSize, RangeRejection, RangedResponse, StreamOptions};

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn Catalog>,
    pub options: StreamOptions,
    /// Used when a file's extension maps to no known type.
    pub default_content_type: Mime,
}

impl AppState {
    pub fn new(catalog: Arc<dyn Catalog>, config: &StreamConfig) -> Result<Self> {
        Ok(AppState {
            catalog,
            options: config.options(),
            default_content_type: config.default_content_type()?,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/movies", get(movies))
        .route("/stream/{id}", get(stream_media))
        .with_state(state)
}

/// Serves until Ctrl-C, then lets in-flight responses finish.
pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn index() -> Json<Value> {
    Json(json!({ "message": "Cinema API is running", "status": "active" }))
}

async fn movies(State(state): State<AppState>) -> Json<Vec<MediaEntry>> {
    Json(state.catalog.entries().to_vec())
}

/// `GET /stream/{id}`. Resolves the id, validates the `Range` header against
/// the file size and only then opens the file.
async fn stream_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, StreamError> {
    let path = state
        .catalog
        .resolve(&id)
        .ok_or_else(|| StreamError::UnknownId(id.clone()))?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| open_error(e, &path))?;
    if !metadata.is_file() {
        return Err(StreamError::MissingFile(path));
    }
    let length = metadata.len();

    let outcome = match range_header(&headers).and_then(|range| parse_range(range, length)) {
        Ok(outcome) => outcome,
        Err(error) => return Ok(RangeRejection::new(error, length).into_response()),
    };

    let body = KnownSize::open(&path, length)
        .await
        .map_err(|e| open_error(e, &path))?;
    let content_type = content_type_for(&path, &state.default_content_type);
    tracing::debug!(%id, ?outcome, length, "streaming {}", path.display());

    Ok(RangedResponse::build(outcome, body, content_type, state.options).into_response())
}

fn open_error(error: io::Error, path: &FsPath) -> StreamError {
    if error.kind() == io::ErrorKind::NotFound {
        StreamError::MissingFile(PathBuf::from(path))
    } else {
        StreamError::Io(error)
    }
}
