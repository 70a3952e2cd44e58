//! Single-flight runner for the probe task.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::probe_task::{ProbeTask, TaskError, TaskReport, TriggerSource};
use crate::probe::ProbeSettings;

/// Errors returned when triggering a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Probe task is already running")]
    AlreadyRunning,
}

struct CurrentRun {
    token: CancellationToken,
    trigger: TriggerSource,
    started_at: DateTime<Utc>,
}

#[derive(Default)]
struct RunnerState {
    current: Option<CurrentRun>,
    last_report: Option<TaskReport>,
    last_error: Option<String>,
    last_finished_at: Option<DateTime<Utc>>,
}

/// Snapshot of the runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerStatus {
    pub running: bool,
    pub trigger: Option<TriggerSource>,
    pub started_at: Option<DateTime<Utc>>,
    /// Progress of the current run, or of the last one when idle.
    pub progress_percent: f64,
    pub last_report: Option<TaskReport>,
    pub last_error: Option<String>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

/// Runs the probe task at most once at a time.
///
/// Settings are read from the watch channel when a run starts.
pub struct TaskRunner {
    task: Arc<ProbeTask>,
    settings: watch::Receiver<ProbeSettings>,
    state: Arc<Mutex<RunnerState>>,
    /// `f64` bits of the current progress.
    progress: Arc<AtomicU64>,
}

impl TaskRunner {
    pub fn new(task: Arc<ProbeTask>, settings: watch::Receiver<ProbeSettings>) -> Self {
        Self {
            task,
            settings,
            state: Arc::new(Mutex::new(RunnerState::default())),
            progress: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    /// Start a run in the background.
    ///
    /// Fails with [`RunnerError::AlreadyRunning`] while a run is in flight.
    pub fn trigger(
        &self,
        source: TriggerSource,
    ) -> Result<JoinHandle<Result<TaskReport, TaskError>>, RunnerError> {
        let token = CancellationToken::new();
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.current.is_some() {
                return Err(RunnerError::AlreadyRunning);
            }
            state.current = Some(CurrentRun {
                token: token.clone(),
                trigger: source,
                started_at: Utc::now(),
            });
        }
        self.progress.store(0f64.to_bits(), Ordering::Relaxed);

        let task = self.task.clone();
        let settings = self.settings.borrow().clone();
        let state = self.state.clone();
        let progress = self.progress.clone();

        Ok(tokio::spawn(async move {
            let sink = {
                let progress = progress.clone();
                move |p: f64| progress.store(p.to_bits(), Ordering::Relaxed)
            };
            let run = task.execute(&settings, source, &sink, &token);
            // A panic must still release the single-flight slot below.
            let result = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(TaskError::Panicked),
            };

            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.current = None;
            state.last_finished_at = Some(Utc::now());
            match &result {
                Ok(report) => {
                    state.last_report = Some(report.clone());
                    state.last_error = None;
                }
                Err(TaskError::Cancelled) => {
                    info!("Probe task run cancelled");
                    state.last_error = Some(TaskError::Cancelled.to_string());
                }
                Err(TaskError::Panicked) => {
                    error!("Probe task run panicked");
                    state.last_error = Some(TaskError::Panicked.to_string());
                }
                Err(e) => {
                    warn!("Probe task run failed: {}", e);
                    state.last_error = Some(e.to_string());
                }
            }
            result
        }))
    }

    /// Cancel the current run. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match &state.current {
            Some(run) => {
                info!("Cancelling {} probe task run", run.trigger);
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .is_some()
    }

    pub fn status(&self) -> RunnerStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        RunnerStatus {
            running: state.current.is_some(),
            trigger: state.current.as_ref().map(|run| run.trigger),
            started_at: state.current.as_ref().map(|run| run.started_at),
            progress_percent: f64::from_bits(self.progress.load(Ordering::Relaxed)),
            last_report: state.last_report.clone(),
            last_error: state.last_error.clone(),
            last_finished_at: state.last_finished_at,
        }
    }
}
