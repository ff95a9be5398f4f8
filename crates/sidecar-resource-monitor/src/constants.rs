//! Thresholds from SPEC_FULL.md §4.5. All hardcoded — there is no
//! configuration surface for tuning these beyond `--monitor-interval-secs`.

use std::time::Duration;

pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(30);

/// RSS at or above this forces an immediate downgrade to `base` (skipped
/// if already at `base`/`tiny`).
pub const MEMORY_CRITICAL_GB: f64 = 2.0;
/// RSS at or above this (but below critical) requests a one-step
/// downgrade.
pub const MEMORY_HIGH_GB: f64 = 1.5;

pub const CPU_SUSTAINED_PCT: f32 = 85.0;
pub const CPU_SUSTAINED: Duration = Duration::from_secs(60);

/// A downgrade is suppressed if less time than this has elapsed since the
/// last one; the CPU timer is not reset on suppression.
pub const DOWNGRADE_DEBOUNCE: Duration = Duration::from_secs(60);

pub const RECOVERY_CPU_PCT: f32 = 50.0;
pub const RECOVERY_MEMORY_GB: f64 = 2.0;
/// Ticks of sustained recovery before proposing an upgrade (~5 min at the
/// default 30 s interval).
pub const RECOVERY_TICKS: u32 = 10;

/// Resources remain insufficient at `tiny` and recording should pause.
pub const PAUSE_MEMORY_GB: f64 = MEMORY_CRITICAL_GB;
pub const PAUSE_CPU_PCT: f32 = CPU_SUSTAINED_PCT;
