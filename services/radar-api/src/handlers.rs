//! HTTP handlers for the overlay image and its metadata.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use radar_common::MapBounds;
use serde::Serialize;
use tracing::{error, instrument};

use crate::pipeline::RenderOutcome;
use crate::state::AppState;

pub const LATEST_PNG_PATH: &str = "/api/radar/latest.png";
pub const METADATA_PATH: &str = "/api/radar/metadata/";

#[derive(Debug, Clone, Serialize)]
pub struct RadarMetadata {
    pub image_url: String,
    pub bounds: MapBounds,
    pub last_updated: Option<String>,
}

/// GET /api/radar/metadata/
#[instrument(skip_all)]
pub async fn metadata_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let last_updated = match state.service.last_updated().await {
        Ok(ts) => ts,
        Err(e) => {
            error!(error = %e, "Failed to read last render time");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    Json(RadarMetadata {
        image_url: image_url(state.public_base_url.as_deref(), &headers),
        bounds: state.bounds,
        last_updated,
    })
    .into_response()
}

/// GET /api/radar/latest.png
#[instrument(skip_all)]
pub async fn latest_png_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.service.render_latest().await {
        RenderOutcome::Fresh { png, .. } | RenderOutcome::Stale { png, .. } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            png,
        )
            .into_response(),
        RenderOutcome::NoSource(cause) => {
            error_response(StatusCode::BAD_GATEWAY, &format!("No MRMS file found ({})", cause))
        }
        RenderOutcome::Failed { cause, .. } => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &cause.to_string())
        }
    }
}

/// GET /health
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus.render(),
    )
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Error: {}", message),
    )
        .into_response()
}

/// Absolute URL of the overlay image.
///
/// Uses the configured public base when present, otherwise the request's
/// `Host` (and `X-Forwarded-Proto`) headers. Falls back to a relative path.
pub fn image_url(public_base_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(base) = public_base_url {
        return format!("{}{}", base, LATEST_PNG_PATH);
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty());
    match host {
        Some(host) => {
            let scheme = headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}{}", scheme, host, LATEST_PNG_PATH)
        }
        None => LATEST_PNG_PATH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_image_url_prefers_public_base() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8000"));
        assert_eq!(
            image_url(Some("https://radar.example.com"), &headers),
            "https://radar.example.com/api/radar/latest.png"
        );
    }

    #[test]
    fn test_image_url_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8000"));
        assert_eq!(
            image_url(None, &headers),
            "http://localhost:8000/api/radar/latest.png"
        );

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(
            image_url(None, &headers),
            "https://localhost:8000/api/radar/latest.png"
        );
    }

    #[test]
    fn test_image_url_without_host_is_relative() {
        assert_eq!(image_url(None, &HeaderMap::new()), LATEST_PNG_PATH);
    }
}
