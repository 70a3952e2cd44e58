use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strmprobe_core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use strmprobe_core::{
    load_config, validate_config, CatchUpQueue, FfprobeProvider, FsFileDeleter, FsLibraryStore,
    ProbeOrchestrator, ProbeTask, TaskRunner,
};

use strmprobe_server::api::create_router;
use strmprobe_server::scheduler;
use strmprobe_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        "Probe settings: catch-up {}, parallelism {}, timeout {}s, cooldown {}ms",
        if config.probe.enable_catch_up_mode { "on" } else { "off" },
        config.probe.probe_parallelism,
        config.probe.probe_timeout_seconds,
        config.probe.probe_cooldown_ms
    );

    // Library store, populated before the catch-up queue subscribes so
    // existing items are left to the scheduled task.
    let store = Arc::new(FsLibraryStore::new(config.library.roots.clone()));
    let initial_store = Arc::clone(&store);
    let summary = tokio::task::spawn_blocking(move || initial_store.rescan())
        .await
        .context("Initial library scan failed")?;
    info!(
        "Library indexed: {} items across {} roots",
        summary.total,
        config.library.roots.len()
    );

    // Probe provider
    let provider = FfprobeProvider::new(config.ffprobe.clone());
    if let Err(e) = provider.validate().await {
        warn!("ffprobe is not usable, probes will fail until it is: {}", e);
    }
    let orchestrator = Arc::new(ProbeOrchestrator::new(Arc::new(provider)));

    // Settings are shared through a watch channel so the runner and the
    // catch-up queue read the current values when they start work.
    let (settings_tx, settings_rx) = watch::channel(config.probe.clone());

    // Probe task and single-flight runner
    let task = Arc::new(ProbeTask::new(
        store.clone(),
        Arc::clone(&orchestrator),
        Arc::new(FsFileDeleter),
    ));
    info!("Registered task: {} ({})", task.name(), task.key());
    let runner = Arc::new(TaskRunner::new(task, settings_rx.clone()));

    // Catch-up queue
    let catch_up = Arc::new(CatchUpQueue::new(
        store.clone(),
        Arc::clone(&orchestrator),
        settings_rx,
    ));
    catch_up.start().context("Failed to start catch-up queue")?;
    info!("Catch-up queue started");

    // Background loops
    let shutdown = CancellationToken::new();
    let mut background = Vec::new();

    if config.schedule.enabled {
        let at = config
            .schedule
            .time_of_day()
            .context("Invalid schedule.daily_at")?;
        background.push(tokio::spawn(scheduler::run_daily(
            Arc::clone(&runner),
            at,
            shutdown.clone(),
        )));
        info!("Daily probe run scheduled at {}", at);
    } else {
        info!("Scheduled probe runs disabled in config");
    }

    if config.library.rescan_interval_secs > 0 {
        background.push(tokio::spawn(scheduler::run_rescan_loop(
            Arc::clone(&store),
            Duration::from_secs(config.library.rescan_interval_secs),
            shutdown.clone(),
        )));
        info!("Library rescan every {}s", config.library.rescan_interval_secs);
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        Arc::clone(&runner),
        Arc::clone(&catch_up),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    shutdown.cancel();
    for handle in background {
        let _ = handle.await;
    }

    if runner.cancel() {
        info!("Cancelled in-flight probe run");
    }

    info!("Stopping catch-up queue...");
    catch_up.shutdown().await;
    info!("Catch-up queue stopped");

    drop(settings_tx);

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
