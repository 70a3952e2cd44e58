//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! over a temporary library directory and a mock probe provider, so the
//! API can be exercised without ffprobe or network access.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::watch;
use tower::ServiceExt;

use strmprobe_core::library::LibraryRootConfig;
use strmprobe_core::testing::MockProbeProvider;
use strmprobe_core::{
    CatchUpQueue, Config, FsFileDeleter, FsLibraryStore, LibraryConfig, LibraryId,
    ProbeOrchestrator, ProbeSettings, ProbeTask, TaskRunner,
};
use strmprobe_server::state::AppState;

/// Test fixture for API testing with a mock provider.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock provider - control probe outcomes and durations
    pub provider: Arc<MockProbeProvider>,
    /// The library store backing the router
    pub store: Arc<FsLibraryStore>,
    /// Task runner shared with the router
    pub runner: Arc<TaskRunner>,
    /// Probe settings read by the runner at the start of each run
    pub settings: watch::Sender<ProbeSettings>,
    /// Library root directory
    pub library_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a fixture with an empty library.
    pub async fn new() -> Self {
        let library_dir = TempDir::new().expect("Failed to create temp dir");
        let provider = Arc::new(MockProbeProvider::new());

        let config = Config {
            library: LibraryConfig {
                roots: vec![LibraryRootConfig {
                    id: LibraryId::new(),
                    name: "Movies".to_string(),
                    path: library_dir.path().to_path_buf(),
                }],
                rescan_interval_secs: 0,
            },
            ..Default::default()
        };

        let store = Arc::new(FsLibraryStore::new(config.library.roots.clone()));
        let orchestrator = Arc::new(ProbeOrchestrator::new(provider.clone()));
        let (settings_tx, settings_rx) = watch::channel(ProbeSettings {
            probe_cooldown_ms: 0,
            ..ProbeSettings::default()
        });

        let task = Arc::new(ProbeTask::new(
            store.clone(),
            Arc::clone(&orchestrator),
            Arc::new(FsFileDeleter),
        ));
        let runner = Arc::new(TaskRunner::new(task, settings_rx.clone()));
        let catch_up = Arc::new(CatchUpQueue::new(store.clone(), orchestrator, settings_rx));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&store),
            Arc::clone(&runner),
            catch_up,
        ));

        let router = strmprobe_server::api::create_router(state);

        Self {
            router,
            provider,
            store,
            runner,
            settings: settings_tx,
            library_dir,
        }
    }

    /// Write a pointer file into the library root.
    pub fn add_strm(&self, name: &str) -> std::path::PathBuf {
        let path = self.library_dir.path().join(format!("{}.strm", name));
        std::fs::write(&path, "http://example.com/stream\n").expect("Failed to write strm");
        path
    }

    pub fn library_path(&self) -> &Path {
        self.library_dir.path()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
