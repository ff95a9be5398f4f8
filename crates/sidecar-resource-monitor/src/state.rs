//! The `monitoring -> degraded -> recovering -> monitoring` hierarchical
//! state machine and per-tick downgrade/upgrade-proposal/pause decision
//! logic (SPEC_FULL.md §4.5). Pure and clock-driven so it can be unit
//! tested without sleeping — the monitor loop (`crate::lib`) owns the
//! actual `tokio::time::sleep` and callback dispatch.

use std::sync::Arc;
use std::time::Instant;

use sidecar_foundation::clock::Clock;
use sidecar_stt::types::ModelSize;

use crate::constants::{
    CPU_SUSTAINED, CPU_SUSTAINED_PCT, DOWNGRADE_DEBOUNCE, MEMORY_CRITICAL_GB, MEMORY_HIGH_GB,
    PAUSE_CPU_PCT, PAUSE_MEMORY_GB, RECOVERY_CPU_PCT, RECOVERY_MEMORY_GB, RECOVERY_TICKS,
};
use crate::sampler::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Monitoring,
    Degraded,
    Recovering,
}

/// What a tick decided should happen. The driver executes these, then
/// reports back success/failure via `apply_downgrade`/`record_*` so the
/// state machine only ever reflects changes that actually took effect.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub downgrade: Option<(ModelSize, ModelSize)>,
    pub upgrade_proposal: Option<(ModelSize, ModelSize)>,
    pub pause_recording: bool,
}

pub struct ResourceMonitor {
    clock: Arc<dyn Clock>,
    phase: Phase,
    current_model: ModelSize,
    initial_model: ModelSize,
    cpu_high_since: Option<Instant>,
    last_downgrade_at: Option<Instant>,
    recovery_sample_count: u32,
}

impl ResourceMonitor {
    pub fn new(initial_model: ModelSize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            phase: Phase::Monitoring,
            current_model: initial_model,
            initial_model,
            cpu_high_since: None,
            last_downgrade_at: None,
            recovery_sample_count: 0,
        }
    }

    pub fn current_model(&self) -> ModelSize {
        self.current_model
    }

    pub fn initial_model(&self) -> ModelSize {
        self.initial_model
    }

    /// Evaluates one tick's sample against the downgrade triggers (first
    /// match wins), the degraded-phase recovery counter, and the
    /// insufficient-resources-at-`tiny` pause condition.
    pub fn tick(&mut self, sample: Sample) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.track_cpu_high(sample.cpu_percent);

        if let Some(target) = self.downgrade_target(sample) {
            outcome.downgrade = Some((self.current_model, target));
        } else {
            match self.phase {
                Phase::Monitoring => {}
                Phase::Degraded => self.advance_recovery(sample),
                Phase::Recovering => {
                    // Entered on a prior tick when the recovery counter
                    // reached its target; the proposal itself is emitted
                    // one tick later, per SPEC_FULL.md §4.5.
                    if let Some(proposed) = self.capped_upgrade_target() {
                        outcome.upgrade_proposal = Some((self.current_model, proposed));
                    }
                    self.phase = Phase::Monitoring;
                }
            }
        }

        if self.current_model == ModelSize::Tiny
            && (sample.rss_gb >= PAUSE_MEMORY_GB || sample.cpu_percent >= PAUSE_CPU_PCT)
        {
            outcome.pause_recording = true;
        }

        outcome
    }

    fn track_cpu_high(&mut self, cpu_percent: f32) {
        if cpu_percent >= CPU_SUSTAINED_PCT {
            if self.cpu_high_since.is_none() {
                self.cpu_high_since = Some(self.clock.now());
            }
        } else {
            self.cpu_high_since = None;
        }
    }

    /// Returns the downgrade target, if any, for this tick's sample. Does
    /// not mutate `current_model`/`phase` — that only happens once the
    /// driver confirms the callback succeeded, via `apply_downgrade`.
    fn downgrade_target(&self, sample: Sample) -> Option<ModelSize> {
        if sample.rss_gb >= MEMORY_CRITICAL_GB {
            if self.current_model == ModelSize::Base || self.current_model == ModelSize::Tiny {
                return None;
            }
            return Some(ModelSize::Base);
        }

        if sample.rss_gb >= MEMORY_HIGH_GB {
            return self.current_model.prev();
        }

        if let Some(start) = self.cpu_high_since {
            if self.clock.now().duration_since(start) >= CPU_SUSTAINED {
                let debounced = self
                    .last_downgrade_at
                    .map(|at| self.clock.now().duration_since(at) < DOWNGRADE_DEBOUNCE)
                    .unwrap_or(false);
                if !debounced {
                    return self.current_model.prev();
                }
            }
        }

        None
    }

    fn advance_recovery(&mut self, sample: Sample) {
        let recovering_tick =
            sample.cpu_percent < RECOVERY_CPU_PCT && sample.available_memory_gb >= RECOVERY_MEMORY_GB;

        if recovering_tick {
            self.recovery_sample_count += 1;
        } else {
            self.recovery_sample_count = 0;
        }

        if self.recovery_sample_count >= RECOVERY_TICKS {
            self.phase = Phase::Recovering;
            self.recovery_sample_count = 0;
        }
    }

    /// The next-larger model, capped so an upgrade proposal never exceeds
    /// `initial_model` (SPEC_FULL.md §4.5, OQ3 of SPEC_FULL.md §9 — see
    /// DESIGN.md).
    fn capped_upgrade_target(&self) -> Option<ModelSize> {
        let proposed = self.current_model.next()?;
        if proposed > self.initial_model {
            None
        } else {
            Some(proposed)
        }
    }

    /// Called by the driver once `on_downgrade` returns the actually
    /// loaded size. Only now does the state machine commit to `degraded`.
    pub fn apply_downgrade(&mut self, actual_size: ModelSize) {
        self.current_model = actual_size;
        self.last_downgrade_at = Some(self.clock.now());
        self.phase = Phase::Degraded;
        self.recovery_sample_count = 0;
    }

    /// Called by the driver after an `approve_upgrade` request's
    /// `load_model` call succeeds.
    pub fn apply_upgrade(&mut self, actual_size: ModelSize) {
        self.current_model = actual_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_foundation::clock::TestClock;
    use std::time::Duration;

    fn sample(cpu: f32, rss_gb: f64, available_gb: f64) -> Sample {
        Sample {
            cpu_percent: cpu,
            rss_gb,
            available_memory_gb: available_gb,
        }
    }

    #[test]
    fn critical_memory_forces_downgrade_to_base() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::LargeV3, clock);
        let outcome = monitor.tick(sample(10.0, 2.5, 8.0));
        assert_eq!(outcome.downgrade, Some((ModelSize::LargeV3, ModelSize::Base)));
    }

    #[test]
    fn critical_memory_at_base_does_not_reload() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Base, clock);
        let outcome = monitor.tick(sample(10.0, 2.5, 8.0));
        assert!(outcome.downgrade.is_none());
    }

    #[test]
    fn high_memory_requests_one_step_downgrade() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Medium, clock);
        let outcome = monitor.tick(sample(10.0, 1.6, 8.0));
        assert_eq!(outcome.downgrade, Some((ModelSize::Medium, ModelSize::Small)));
    }

    #[test]
    fn cpu_sustained_under_sixty_seconds_does_not_downgrade() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Medium, clock.clone());
        monitor.tick(sample(90.0, 0.1, 8.0));
        clock.advance(Duration::from_secs(30));
        let outcome = monitor.tick(sample(90.0, 0.1, 8.0));
        assert!(outcome.downgrade.is_none());
    }

    #[test]
    fn cpu_sustained_sixty_seconds_downgrades() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Medium, clock.clone());
        monitor.tick(sample(90.0, 0.1, 8.0));
        clock.advance(Duration::from_secs(60));
        let outcome = monitor.tick(sample(90.0, 0.1, 8.0));
        assert_eq!(outcome.downgrade, Some((ModelSize::Medium, ModelSize::Small)));
    }

    #[test]
    fn downgrade_is_suppressed_within_debounce_window() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Medium, clock.clone());
        monitor.apply_downgrade(ModelSize::Small);
        monitor.tick(sample(90.0, 0.1, 8.0));
        clock.advance(Duration::from_secs(60));
        let outcome = monitor.tick(sample(90.0, 0.1, 8.0));
        assert!(outcome.downgrade.is_none(), "debounce window had not elapsed");
    }

    #[test]
    fn tenth_recovering_tick_transitions_but_eleventh_emits_the_proposal() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Medium, clock.clone());
        monitor.apply_downgrade(ModelSize::Small);

        let mut last_outcome = TickOutcome::default();
        for _ in 0..10 {
            last_outcome = monitor.tick(sample(10.0, 0.1, 8.0));
        }
        assert!(
            last_outcome.upgrade_proposal.is_none(),
            "the 10th tick only transitions into recovering, per SPEC_FULL.md §4.5"
        );

        let eleventh = monitor.tick(sample(10.0, 0.1, 8.0));
        assert_eq!(eleventh.upgrade_proposal, Some((ModelSize::Small, ModelSize::Medium)));
    }

    #[test]
    fn upgrade_proposal_never_exceeds_initial_model() {
        let clock = Arc::new(TestClock::new());
        // Started at Small; a downgrade to Tiny then full recovery must
        // only ever propose up to Small, never Base->Medium->...
        let mut monitor = ResourceMonitor::new(ModelSize::Small, clock.clone());
        monitor.apply_downgrade(ModelSize::Tiny);

        for _ in 0..10 {
            monitor.tick(sample(10.0, 0.1, 8.0));
        }
        let outcome = monitor.tick(sample(10.0, 0.1, 8.0));
        assert_eq!(outcome.upgrade_proposal, Some((ModelSize::Tiny, ModelSize::Base)));
    }

    #[test]
    fn tiny_model_with_insufficient_resources_pauses_recording() {
        let clock = Arc::new(TestClock::new());
        let mut monitor = ResourceMonitor::new(ModelSize::Tiny, clock);
        let outcome = monitor.tick(sample(90.0, 0.1, 8.0));
        assert!(outcome.pause_recording);
    }
}
