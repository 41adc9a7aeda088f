//! Blog endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::blog::{Article, ArticleSummary};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the blog router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(list_articles))
        .route("/blog/refresh", post(refresh_articles))
        .route("/blog/:slug", get(get_article))
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    pub articles: usize,
}

async fn list_articles(State(state): State<AppState>) -> Json<ArticleListResponse> {
    let articles = state.blog().summaries().await;
    let total = articles.len();
    Json(ArticleListResponse { articles, total })
}

async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Article>> {
    state
        .blog()
        .get(&slug)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Article not found: {}", slug)))
}

/// Reload articles from disk
async fn refresh_articles(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    let articles = state.blog().refresh().await?;
    Ok(Json(RefreshResponse {
        status: "refreshed",
        articles,
    }))
}
