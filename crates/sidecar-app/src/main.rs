// Logging behavior:
// - Writes logs to both stderr and a daily-rotated file at <log_dir>/sidecar.log.
// - Default log level is INFO. Control via RUST_LOG:
//   * RUST_LOG=info                      # standard logging (default)
//   * RUST_LOG=debug                     # verbose, includes per-frame VAD state
//   * RUST_LOG=sidecar_app=info,sidecar_vad=trace  # per-module control
// - The log directory is created on startup if missing; file output uses a non-blocking writer.
// - File layer disables ANSI to keep logs clean for analysis.
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use clap::Parser;
use serde_json::json;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sidecar_app::config::{Cli, Settings};
use sidecar_app::dispatcher::{Dispatcher, SidecarMonitorCallbacks};
use sidecar_app::ipc;
use sidecar_app::messages::Outbound;
use sidecar_foundation::shutdown::{ShutdownHandle, MONITOR_SHUTDOWN_TIMEOUT};
use sidecar_foundation::state::{AppState, StateManager};
use sidecar_stt::facade::SttFacade;
use sidecar_stt_whisper::WhisperBackend;

fn init_logging(log_dir: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "sidecar.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_writer(non_blocking_file).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Prunes rotated log files older than `retention_days` days. `Some(0)`
/// disables pruning. Defaults to 7 days when `None`.
fn prune_old_logs(log_dir: &Path, retention_days: Option<u64>) {
    let retention = retention_days.unwrap_or(7);
    if retention == 0 {
        tracing::debug!("log retention disabled (retention_days=0)");
        return;
    }

    let cutoff = match SystemTime::now().checked_sub(Duration::from_secs(retention * 24 * 60 * 60)) {
        Some(t) => t,
        None => return,
    };

    if !log_dir.exists() {
        return;
    }

    match fs::read_dir(log_dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    if name.starts_with("sidecar.log.") {
                        if let Ok(meta) = entry.metadata() {
                            if let Ok(modified) = meta.modified() {
                                if modified < cutoff {
                                    if let Err(e) = fs::remove_file(&path) {
                                        tracing::warn!("failed to remove old log {}: {e}", path.display());
                                    } else {
                                        tracing::info!("removed old log file: {}", path.display());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Err(e) => tracing::warn!("failed to read log directory for pruning: {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::resolve(&cli).unwrap_or_else(|e| {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    });

    let _log_guard = init_logging(&settings.log_dir)?;
    let retention_days = std::env::var("SIDECAR_LOG_RETENTION_DAYS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok());
    prune_old_logs(&settings.log_dir, retention_days);
    tracing::info!(offline = settings.offline, "starting sidecar");

    let state_manager = StateManager::new();
    let shutdown = ShutdownHandle::new();

    let (output, writer_task) = ipc::spawn_writer();

    let initial_model = settings
        .model_size_override
        .unwrap_or_else(sidecar_resource_monitor::detect_initial_model);

    let mut backend = WhisperBackend::new(settings.offline);
    let loaded_model = match backend.load_model(initial_model, settings.offline).await {
        Ok(size) => size,
        Err(e) => {
            tracing::error!(error = %e, "failed to load startup model");
            return Err(Box::new(e));
        }
    };
    let loaded_model_path = backend.current_model_path().map(|p| p.display().to_string());
    let facade = Arc::new(SttFacade::new(Box::new(backend), loaded_model));

    let monitor_callbacks = Arc::new(SidecarMonitorCallbacks::new(facade.clone(), output.clone(), settings.offline));
    let (monitor_handle, monitor_task) = sidecar_resource_monitor::spawn(
        loaded_model,
        Duration::from_secs(settings.monitor_interval_secs),
        monitor_callbacks,
        shutdown.clone(),
    );

    state_manager.transition(AppState::Running)?;

    // Startup sequence (SPEC_FULL.md §6.1): the model-ready event, then
    // `ready`, are the first two lines on stdout — nothing precedes them
    // except stderr/file logs.
    output.send(Outbound::event(
        "whisper_model_ready",
        json!({"model_size": loaded_model, "model_path": loaded_model_path}),
    ));
    output.send(Outbound::ready("sidecar ready"));

    let dispatcher = Arc::new(Dispatcher::new(
        output.clone(),
        facade,
        monitor_handle,
        shutdown.clone(),
        settings.offline,
    ));

    ipc::run_inbound_loop(
        Duration::from_secs(settings.idle_timeout_secs),
        shutdown.clone(),
        output.clone(),
        move |line| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.handle_line(&line).await }
        },
    )
    .await;

    tracing::debug!("beginning graceful shutdown");
    state_manager.transition(AppState::ShuttingDown)?;

    if tokio::time::timeout(MONITOR_SHUTDOWN_TIMEOUT, monitor_task).await.is_err() {
        tracing::warn!("resource monitor did not stop within the shutdown timeout");
    }
    drop(output);
    let _ = writer_task.await;

    state_manager.transition(AppState::Stopped)?;
    tracing::debug!("shutdown complete");
    Ok(())
}
