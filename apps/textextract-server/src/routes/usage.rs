//! Usage status endpoint

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};

use super::user_id;
use crate::error::Result;
use crate::state::AppState;
use crate::usage::UsageStatus;

/// Create the usage router
pub fn router() -> Router<AppState> {
    Router::new().route("/usage", get(get_usage))
}

/// Today's usage and entitlement for the calling user
async fn get_usage(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<UsageStatus>> {
    let status = state.usage().check(&user_id(&headers)).await?;
    Ok(Json(status))
}
