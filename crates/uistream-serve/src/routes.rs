//! HTTP surface for content-addressed delivery.
//!
//! Handlers only touch in-memory stores, so every request completes in
//! bounded time. Misses and malformed requests answer 404; nothing here
//! panics on bad input.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::{
    cache::MessageCache,
    media::{self, AssetKind, MediaAssetStore},
};

/// Lookup failures and malformed requests. All of them answer 404: a miss
/// is a normal outcome for a content-addressed store, and a request without
/// its required parameter can never name an entry.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Required query parameter absent.
    #[error("request is missing the {0} parameter")]
    MissingParam(&'static str),
    /// No cached message under this hash.
    #[error("no cached message for hash {0}")]
    UnknownMessage(String),
    /// No media asset under this key.
    #[error("no media asset for key {0}")]
    UnknownAsset(String),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match &self {
            Self::MissingParam(_) => tracing::error!(error = %self, "malformed request"),
            Self::UnknownMessage(_) | Self::UnknownAsset(_) => {
                tracing::debug!(error = %self, "lookup miss");
            }
        }
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serve-time policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServeConfig {
    /// Attach an open CORS allow-origin header to responses. Asset requests
    /// legitimately originate from an embedding frame on another origin.
    pub allow_cors: bool,
}

/// Shared state behind the delivery routes.
#[derive(Clone, Default)]
pub struct ServeState {
    /// Outbound protocol-message cache.
    pub cache: Arc<MessageCache>,
    /// In-memory media assets.
    pub media: Arc<MediaAssetStore>,
}

/// Build the delivery router.
#[must_use]
pub fn router(state: ServeState, config: ServeConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/cache", get(get_cached_message))
        .route("/media/{key}", get(get_media))
        .with_state(state);

    if config.allow_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct CacheParams {
    hash: Option<String>,
}

async fn get_cached_message(
    State(state): State<ServeState>,
    Query(params): Query<CacheParams>,
) -> Result<Response, ServeError> {
    let hash = params.hash.ok_or(ServeError::MissingParam("hash"))?;
    let bytes = state
        .cache
        .get(&hash)
        .ok_or_else(|| ServeError::UnknownMessage(hash.clone()))?;

    tracing::debug!(hash = %hash, "message cache hit");
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

#[derive(Debug, Deserialize)]
struct MediaParams {
    title: Option<String>,
}

async fn get_media(
    State(state): State<ServeState>,
    Path(key): Path<String>,
    Query(params): Query<MediaParams>,
    request_headers: HeaderMap,
) -> Result<Response, ServeError> {
    let asset = state
        .media
        .get(&key)
        .ok_or_else(|| ServeError::UnknownAsset(key.clone()))?;

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(asset.mime_type()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if asset.kind() == AssetKind::Downloadable {
        let filename = asset.download_filename(params.title.as_deref());
        if let Ok(value) = HeaderValue::from_str(&media::content_disposition(&filename)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    let range = request_headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, asset.len()));
    if let Some((start, end)) = range {
        let body = asset.slice(start, end + 1);
        let content_range = format!("bytes {start}-{end}/{}", asset.len());
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            headers.insert(header::CONTENT_RANGE, value);
        }
        return Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response());
    }

    Ok((headers, asset.content().clone()).into_response())
}

/// Parse a single `bytes=start-end` request range against a known length.
///
/// Returns the inclusive byte bounds. Suffix (`bytes=-n`) and open-ended
/// (`bytes=n-`) forms are supported; multi-part or unsatisfiable ranges
/// yield `None`, and the caller serves the full body instead.
fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?.trim();
    if len == 0 || spec.contains(',') {
        return None;
    }
    let (start_raw, end_raw) = spec.split_once('-')?;
    let (start_raw, end_raw) = (start_raw.trim(), end_raw.trim());

    if start_raw.is_empty() {
        let suffix: usize = end_raw.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        let suffix = suffix.min(len);
        return Some((len - suffix, len - 1));
    }

    let start: usize = start_raw.parse().ok()?;
    if start >= len {
        return None;
    }
    let end = if end_raw.is_empty() {
        len - 1
    } else {
        end_raw.parse::<usize>().ok()?.min(len - 1)
    };
    if end < start {
        return None;
    }
    Some((start, end))
}
