//! Adaptive resource-control loop (C5, SPEC_FULL.md §4.5): one-shot
//! startup model selection, then a periodic task that samples this
//! process's CPU/RSS and drives downgrade/upgrade-proposal/pause-recording
//! callbacks through the [`state::ResourceMonitor`] state machine.
//!
//! Grounded on `original_source/python-stt/stt_engine/resource_monitor.py`
//! for the algorithm and thresholds, rebuilt as a `tokio` task cancellable
//! through `sidecar_foundation::ShutdownHandle` rather than a bare
//! `asyncio` running-flag loop.

pub mod constants;
pub mod gpu;
pub mod sampler;
pub mod selection;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sidecar_foundation::clock::{Clock, RealClock};
use sidecar_foundation::shutdown::ShutdownHandle;
use sidecar_stt::types::ModelSize;

use sampler::Sampler;
use state::ResourceMonitor;

pub use state::TickOutcome;

/// A handle the dispatcher uses to tell the monitor loop about a model
/// change it didn't initiate itself — specifically, an `approve_upgrade`
/// request's `load_model` call succeeding (SPEC_FULL.md §4.5: "The actual
/// upgrade is not performed here; it awaits an explicit `approve_upgrade`
/// request"). Without this, the monitor's own `current_model` bookkeeping
/// would go stale the moment an upgrade is approved, and its next
/// downgrade/upgrade-proposal computation would reason about the wrong
/// size.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<ModelSize>,
}

impl MonitorHandle {
    pub fn notify_upgrade_applied(&self, actual_size: ModelSize) {
        let _ = self.tx.send(actual_size);
    }
}

/// Runs [`selection::select_initial_model`] against this machine's
/// detected GPU/RAM.
pub fn detect_initial_model() -> ModelSize {
    let gpu = gpu::detect();
    let ram_gb = sampler::total_system_ram_gb();
    let model = selection::select_initial_model(&gpu, ram_gb);
    info!(
        target: "sidecar::monitor",
        gpu_present = gpu.present,
        vram_gb = gpu.vram_gb,
        ram_gb,
        %model,
        "selected startup model"
    );
    model
}

/// Callbacks the driver invokes for each kind of tick outcome. Downgrade
/// and upgrade callbacks return the actually loaded model size (which may
/// differ from the requested target via bundled fallback, SPEC_FULL.md
/// §4.4) so the state machine can record what really happened.
#[async_trait::async_trait]
pub trait MonitorCallbacks: Send + Sync {
    async fn on_downgrade(&self, old: ModelSize, new: ModelSize) -> Option<ModelSize>;
    async fn on_upgrade_proposal(&self, current: ModelSize, proposed: ModelSize);
    async fn on_pause_recording(&self);
}

/// Runs the monitor loop until `shutdown` fires. One tick every
/// `interval`; each tick's downgrade/upgrade/pause decisions are executed
/// in order against `callbacks` before sleeping again. Returns a
/// [`MonitorHandle`] the caller must also hand to whatever handles
/// `approve_upgrade` requests.
pub fn spawn(
    initial_model: ModelSize,
    interval: Duration,
    callbacks: Arc<dyn MonitorCallbacks>,
    shutdown: ShutdownHandle,
) -> (MonitorHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = MonitorHandle { tx };
    let task = tokio::spawn(run(initial_model, interval, callbacks, shutdown, rx));
    (handle, task)
}

async fn run(
    initial_model: ModelSize,
    interval: Duration,
    callbacks: Arc<dyn MonitorCallbacks>,
    shutdown: ShutdownHandle,
    mut approved_upgrades: mpsc::UnboundedReceiver<ModelSize>,
) {
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());
    let mut monitor = ResourceMonitor::new(initial_model, clock);
    let mut sampler = Sampler::new();

    info!(target: "sidecar::monitor", interval_secs = interval.as_secs(), "resource monitor loop started");

    while shutdown.is_running() {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            applied = approved_upgrades.recv() => {
                if let Some(actual_size) = applied {
                    monitor.apply_upgrade(actual_size);
                }
                continue;
            }
            _ = shutdown.wait() => break,
        }
        if !shutdown.is_running() {
            break;
        }

        let sample = sampler.sample();
        debug!(
            target: "sidecar::monitor",
            cpu_percent = sample.cpu_percent,
            rss_gb = sample.rss_gb,
            current_model = %monitor.current_model(),
            "resource monitor tick"
        );

        let outcome = monitor.tick(sample);
        apply_outcome(&mut monitor, outcome, &callbacks).await;
    }

    info!(target: "sidecar::monitor", "resource monitor loop stopped");
}

async fn apply_outcome(
    monitor: &mut ResourceMonitor,
    outcome: TickOutcome,
    callbacks: &Arc<dyn MonitorCallbacks>,
) {
    if let Some((old, new)) = outcome.downgrade {
        match callbacks.on_downgrade(old, new).await {
            Some(actual) => monitor.apply_downgrade(actual),
            None => warn!(
                target: "sidecar::monitor",
                from = %old, to = %new,
                "downgrade callback failed; current_model left unchanged"
            ),
        }
    }

    if let Some((current, proposed)) = outcome.upgrade_proposal {
        callbacks.on_upgrade_proposal(current, proposed).await;
    }

    if outcome.pause_recording {
        callbacks.on_pause_recording().await;
    }
}
