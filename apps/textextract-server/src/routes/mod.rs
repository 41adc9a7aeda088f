//! Route modules for TextExtract Server

pub mod blog;
pub mod extract;
pub mod health;
pub mod sitemap;
pub mod usage;

use axum::{http::HeaderMap, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::proxy::{self, ProxyState};
use crate::state::AppState;
use crate::usage::ANONYMOUS_USER;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity, falling back to the shared anonymous user
pub fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

/// Full API backend
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .merge(extract::router())
        .merge(usage::router())
        .merge(blog::router())
        .merge(health::router());

    Router::new()
        .merge(health::router())
        .merge(sitemap::router())
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Edge proxy: `/api/*` forwarded, `/health` answered locally
pub fn build_edge_router(proxy: ProxyState) -> Router {
    let backend = proxy.origin().to_string();

    Router::new()
        .merge(health::edge_router(backend))
        .merge(proxy::router(proxy))
        .layer(TraceLayer::new_for_http())
}
