//! Stats, health and endpoint listing.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::ApiError;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "Hybrid Vector + Graph AI Retrieval Engine";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(get_stats))
        .route("/health", get(health))
}

/// GET /api/stats — counts, cached for the configured TTL.
async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.blocking(|engine| Ok(engine.stats())).await?;
    Ok(Json(snapshot))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

/// GET /api — service name, relation strategy and the endpoint list.
async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "relation_strategy": state.engine.relation_strategy(),
        "endpoints": {
            "add_document": "POST /api/add_document",
            "add_documents": "POST /api/add_documents",
            "search": "GET /api/search?q=&top_k=",
            "hybrid": "GET /api/hybrid?q=&top_k=&depth=",
            "graph_neighbors": "GET /api/graph_neighbors?doc_id=&depth=",
            "document": "GET|DELETE /api/document/{doc_id}",
            "relationships": "GET /api/relationships/{doc_id}",
            "list_documents": "GET /api/list_documents",
            "stats": "GET /api/stats",
            "health": "GET /api/health",
        },
    }))
}
