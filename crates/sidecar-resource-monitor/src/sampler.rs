//! Process-level CPU/RSS sampling (SPEC_FULL.md §4.5: "the monitor tracks
//! the sidecar's own footprint", not system-wide memory). System RAM is
//! read once, separately, for the one-shot startup model selection.
//!
//! Grounded on `mmogr-gglib/crates/gglib-runtime/src/process/health.rs`'s
//! `sysinfo` usage pattern.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub struct Sampler {
    sys: System,
    pid: Pid,
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub cpu_percent: f32,
    /// This process's own resident set size — the downgrade triggers key
    /// off this, not system-wide usage (SPEC_FULL.md §4.5).
    pub rss_gb: f64,
    /// System-wide available (free) memory — the recovery/hysteresis
    /// condition keys off this instead, since "has the system recovered"
    /// is a different question than "is this process still using a lot".
    pub available_memory_gb: f64,
}

impl Sampler {
    pub fn new() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        Self { sys, pid }
    }

    /// `sysinfo` computes CPU usage as a delta since the last refresh, so
    /// the first sample after construction is meaningless; callers should
    /// discard it (the monitor loop's first tick happens after the first
    /// sleep interval, so this is naturally the case in practice).
    pub fn sample(&mut self) -> Sample {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );
        self.sys.refresh_memory();

        let process = self.sys.process(self.pid);
        let cpu_percent = process.map(|p| p.cpu_usage()).unwrap_or(0.0);
        let rss_gb = process
            .map(|p| p.memory() as f64 / (1024.0 * 1024.0 * 1024.0))
            .unwrap_or(0.0);
        let available_memory_gb = self.sys.available_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
        Sample {
            cpu_percent,
            rss_gb,
            available_memory_gb,
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Total system RAM in GB, read once at startup for the model-selection
/// table — distinct from the per-tick RSS sampling above.
pub fn total_system_ram_gb() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0)
}
