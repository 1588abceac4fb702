//! Document routes — ingest, batch ingest, get, delete, list.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use linkweave_ingest::DocumentInput;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/add_document", post(add_document))
        .route("/add_documents", post(add_documents))
        .route("/document/{doc_id}", get(get_document).delete(delete_document))
        .route("/list_documents", get(list_documents))
}

/// POST /api/add_document — 200 when complete, 207 when the vector record
/// landed but the graph step did not.
async fn add_document(
    State(state): State<Arc<AppState>>,
    Json(doc): Json<DocumentInput>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.blocking(move |engine| engine.ingest(doc)).await?;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(report)))
}

#[derive(Deserialize)]
struct BatchRequest {
    documents: Vec<DocumentInput>,
}

/// POST /api/add_documents — per-item outcomes; never fails as a whole.
async fn add_documents(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .blocking(move |engine| Ok(engine.ingest_many(req.documents)))
        .await?;
    Ok(Json(report))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let doc = state.blocking(move |engine| engine.get_document(&doc_id)).await?;
    Ok(Json(doc))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .blocking(move |engine| engine.delete_document(&doc_id))
        .await?;
    Ok(Json(report))
}

async fn list_documents(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let list = state.blocking(|engine| engine.list_documents()).await?;
    Ok(Json(list))
}
