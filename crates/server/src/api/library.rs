use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use super::probe::ErrorResponse;
use crate::state::AppState;

#[derive(Serialize)]
pub struct RescanResponse {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

/// Walk the library roots now instead of waiting for the next interval.
///
/// POST /api/v1/library/rescan
pub async fn rescan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RescanResponse>, (StatusCode, Json<ErrorResponse>)> {
    let store = Arc::clone(state.store());

    match tokio::task::spawn_blocking(move || store.rescan()).await {
        Ok(summary) => Ok(Json(RescanResponse {
            added: summary.added,
            removed: summary.removed,
            total: summary.total,
        })),
        Err(e) => {
            error!("Library rescan task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Library rescan failed".to_string(),
                }),
            ))
        }
    }
}
