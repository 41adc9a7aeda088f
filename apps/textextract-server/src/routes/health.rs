//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub usage_backend: &'static str,
    pub ocr_configured: bool,
    pub oauth_configured: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "textextract-server",
        usage_backend: state.usage().backend(),
        ocr_configured: state.config().ocr.api_key.is_some(),
        oauth_configured: state.config().auth.is_configured(),
    })
}

#[derive(Serialize)]
pub struct EdgeHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub backend: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Local health check for edge mode; never touches the backend
pub fn edge_router(backend: String) -> Router {
    Router::new().route(
        "/health",
        get(move || {
            let backend = backend.clone();
            async move {
                Json(EdgeHealthResponse {
                    status: "healthy",
                    version: env!("CARGO_PKG_VERSION"),
                    service: "textextract-edge",
                    backend,
                })
            }
        }),
    )
}
