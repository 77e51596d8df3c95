use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::aggregate::{self, DEFAULT_LATEST_LIMIT};
use crate::categories::windows_categories;
use crate::fetcher::Fetcher;
use crate::store::UpdateStore;

const MAX_LATEST_LIMIT: usize = 100;

pub struct AppState {
    pub store: Arc<dyn UpdateStore>,
    pub fetcher: Arc<Fetcher>,
    pub pdf_dir: PathBuf,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/latest", get(latest))
        .route("/categories", get(categories))
        .route("/stats", get(stats))
        .route("/windows/categories", get(windows_category_list))
        .route("/refresh", post(refresh))
        .route("/pdf/:filename", get(pdf))
        .route("/test", get(test_info))
        .with_state(state)
}

/// Route-boundary error: logged server-side, surfaced to the client
/// as a generic 500 with no internal detail.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize)]
pub struct LatestQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LatestQuery {
    /// Effective limit: default 5, floor of 1 (anything lower falls
    /// back to the default), capped at 100.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            Some(n) if n >= 1 => (n as usize).min(MAX_LATEST_LIMIT),
            Some(_) => DEFAULT_LATEST_LIMIT,
            None => DEFAULT_LATEST_LIMIT,
        }
    }
}

// Route handlers
pub async fn latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.store.read();
    Ok(Json(aggregate::latest(&records, query.effective_limit())))
}

pub async fn categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.store.read();
    Ok(Json(aggregate::facets(&records)))
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let records = state.store.read();
    Ok(Json(aggregate::stats(&records, Utc::now())))
}

pub async fn windows_category_list() -> impl IntoResponse {
    Json(json!({ "categories": windows_categories() }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Response {
    match state.fetcher.refresh().await {
        Ok(count) => Json(json!({
            "success": true,
            "message": "refresh complete",
            "count": count,
        }))
        .into_response(),
        Err(e) => {
            error!("Refresh failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": format!("refresh failed: {}", e),
                })),
            )
                .into_response()
        }
    }
}

pub async fn pdf(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    // Lexical checks first: reject traversal sequences and anything
    // that isn't a .pdf before touching the filesystem.
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid filename" })),
        )
            .into_response();
    }
    if !filename.ends_with(".pdf") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "only .pdf files are served" })),
        )
            .into_response();
    }

    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "file not found" })),
        )
            .into_response()
    };

    let base = match state.pdf_dir.canonicalize() {
        Ok(base) => base,
        Err(_) => return not_found(),
    };
    let resolved = match state.pdf_dir.join(&filename).canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => return not_found(),
    };

    // Re-check after resolution: symlinks must not escape the
    // allowed directory.
    if !resolved.starts_with(&base) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "access denied" })),
        )
            .into_response();
    }

    let bytes = match tokio::fs::read(&resolved).await {
        Ok(bytes) => bytes,
        Err(_) => return not_found(),
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        bytes,
    )
        .into_response()
}

pub async fn test_info() -> impl IntoResponse {
    Json(json!({
        "service": "patchfeed",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}
