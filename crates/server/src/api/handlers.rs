use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use strmprobe_core::{CatchUpStatus, Config, RunnerStatus};
use tracing::error;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Config> {
    Json(state.config().clone())
}

/// Library overview included in the status response.
#[derive(Serialize)]
pub struct LibraryStatus {
    pub roots: Vec<PathBuf>,
    pub items: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub task: RunnerStatus,
    pub catch_up: CatchUpStatus,
    pub library: LibraryStatus,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let store = state.store();
    Json(StatusResponse {
        version: VERSION,
        task: state.runner().status(),
        catch_up: state.catch_up().status(),
        library: LibraryStatus {
            roots: store.roots().iter().map(|r| r.path.clone()).collect(),
            items: store.len(),
        },
    })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state);

    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
