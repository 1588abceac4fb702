//! Search routes — semantic and hybrid.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search))
        .route("/hybrid", get(hybrid))
}

fn default_top_k() -> usize {
    5
}

fn default_depth() -> usize {
    1
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

#[derive(Deserialize)]
struct HybridParams {
    q: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_depth")]
    depth: usize,
}

/// GET /api/search?q=&top_k= — semantic vector search.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .blocking(move |engine| engine.semantic_search(&params.q, params.top_k))
        .await?;
    Ok(Json(response))
}

/// GET /api/hybrid?q=&top_k=&depth= — vector search fused with graph expansion.
async fn hybrid(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HybridParams>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .blocking(move |engine| engine.hybrid_search(&params.q, params.top_k, params.depth))
        .await?;
    Ok(Json(response))
}
