//! Probe task trigger and cancel endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use strmprobe_core::{RunnerError, TriggerSource};
use tracing::info;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Start a manual probe run.
///
/// POST /api/v1/probe/run
pub async fn run_probe(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<MessageResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.runner().trigger(TriggerSource::Manual) {
        Ok(_) => {
            info!("Manual probe run started");
            Ok((
                StatusCode::ACCEPTED,
                Json(MessageResponse {
                    message: "Probe run started".to_string(),
                }),
            ))
        }
        Err(e @ RunnerError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// Cancel the in-flight probe run, if any.
///
/// POST /api/v1/probe/cancel
pub async fn cancel_probe(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    let cancelled = state.runner().cancel();
    if cancelled {
        info!("Probe run cancellation requested");
    }
    Json(CancelResponse { cancelled })
}
