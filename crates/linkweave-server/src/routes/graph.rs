//! Graph routes — neighbours and relationships.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/graph_neighbors", get(graph_neighbors))
        .route("/relationships/{doc_id}", get(relationships))
}

fn default_depth() -> usize {
    1
}

#[derive(Deserialize)]
struct NeighborParams {
    doc_id: String,
    #[serde(default = "default_depth")]
    depth: usize,
}

/// GET /api/graph_neighbors?doc_id=&depth=
async fn graph_neighbors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NeighborParams>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .blocking(move |engine| engine.graph_neighbors(&params.doc_id, params.depth))
        .await?;
    Ok(Json(response))
}

/// GET /api/relationships/{doc_id}. The strategies run their graph and index
/// reads on the blocking pool themselves.
async fn relationships(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.engine.relationships(&doc_id).await?;
    Ok(Json(response))
}
