//! Shared application state.

use std::sync::Arc;

use linkweave_core::Error;
use linkweave_runtime::Engine;

use crate::error::ApiError;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub engine: Engine,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Run a synchronous engine call (SQLite, graph locks, snapshot I/O) on
    /// the blocking pool.
    pub async fn blocking<T, F>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Engine) -> linkweave_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state.engine))
            .await
            .map_err(|e| ApiError(Error::Internal(format!("worker task failed: {}", e))))?
            .map_err(ApiError)
    }
}
