//! Sitemap endpoint

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Local;

use crate::error::Result;
use crate::sitemap::{generate_sitemap, STATIC_PAGES};
use crate::state::AppState;

/// Create the sitemap router (mounted at the root, not under `/api`)
pub fn router() -> Router<AppState> {
    Router::new().route("/sitemap.xml", get(sitemap))
}

async fn sitemap(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let articles = state.blog().articles().await;
    let xml = generate_sitemap(
        &state.config().site_url(),
        STATIC_PAGES,
        &articles,
        Local::now().date_naive(),
    )?;

    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml,
    ))
}
