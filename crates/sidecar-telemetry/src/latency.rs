//! Per-transcription-event latency accounting (SPEC_FULL.md §4.3).
//!
//! Grounded on `Coldaine-ColdVox/crates/coldvox-telemetry/src/pipeline_metrics.rs`'s
//! latency-field shape (`capture_to_chunker_ms`, `end_to_end_ms`), trimmed
//! to the three fields SPEC_FULL.md §4.3 actually puts on the wire and
//! re-pointed at VAD/STT boundaries instead of an audio-capture pipeline.

use serde::{Deserialize, Serialize};

/// Carried on every `partial_text`/`final_text` IPC event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub whisper_processing_ms: u64,
    pub end_to_end_latency_ms: u64,
    pub is_first_partial: bool,
}

/// Tracks the timestamps `LatencyMetrics` is computed from across one
/// speech segment: first partial measures from speech start, later
/// partials measure incrementally from the previous partial, and the
/// final measures from speech end.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    speech_start_ms: Option<u64>,
    previous_partial_ms: Option<u64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the VAD reports `speech_start`.
    pub fn begin_segment(&mut self, speech_start_ms: u64) {
        self.speech_start_ms = Some(speech_start_ms);
        self.previous_partial_ms = None;
    }

    /// Records a partial transcription delivered at `delivery_ms`, taking
    /// `whisper_processing_ms` from the backend's own timing. Returns the
    /// metrics to attach to the `partial_text` event.
    pub fn record_partial(&mut self, delivery_ms: u64, whisper_processing_ms: u64) -> LatencyMetrics {
        let is_first_partial = self.previous_partial_ms.is_none();
        let baseline = if is_first_partial {
            self.speech_start_ms.unwrap_or(delivery_ms)
        } else {
            self.previous_partial_ms.unwrap_or(delivery_ms)
        };
        self.previous_partial_ms = Some(delivery_ms);
        LatencyMetrics {
            whisper_processing_ms,
            end_to_end_latency_ms: delivery_ms.saturating_sub(baseline),
            is_first_partial,
        }
    }

    /// Records the final transcription at `delivery_ms`, measured from
    /// `speech_end_ms`. Consumes the tracker's segment state.
    pub fn record_final(&mut self, delivery_ms: u64, speech_end_ms: u64, whisper_processing_ms: u64) -> LatencyMetrics {
        let metrics = LatencyMetrics {
            whisper_processing_ms,
            end_to_end_latency_ms: delivery_ms.saturating_sub(speech_end_ms),
            is_first_partial: false,
        };
        self.speech_start_ms = None;
        self.previous_partial_ms = None;
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_partial_measures_from_speech_start() {
        let mut tracker = LatencyTracker::new();
        tracker.begin_segment(1_000);
        let metrics = tracker.record_partial(1_350, 200);
        assert!(metrics.is_first_partial);
        assert_eq!(metrics.end_to_end_latency_ms, 350);
    }

    #[test]
    fn subsequent_partial_measures_incrementally() {
        let mut tracker = LatencyTracker::new();
        tracker.begin_segment(1_000);
        tracker.record_partial(1_350, 200);
        let second = tracker.record_partial(1_900, 180);
        assert!(!second.is_first_partial);
        assert_eq!(second.end_to_end_latency_ms, 550);
    }

    #[test]
    fn final_measures_from_speech_end() {
        let mut tracker = LatencyTracker::new();
        tracker.begin_segment(1_000);
        tracker.record_partial(1_350, 200);
        let final_metrics = tracker.record_final(4_200, 4_000, 150);
        assert!(!final_metrics.is_first_partial);
        assert_eq!(final_metrics.end_to_end_latency_ms, 200);
    }

    #[test]
    fn new_segment_resets_first_partial_tracking() {
        let mut tracker = LatencyTracker::new();
        tracker.begin_segment(1_000);
        tracker.record_partial(1_350, 200);
        tracker.record_final(4_200, 4_000, 150);

        tracker.begin_segment(10_000);
        let metrics = tracker.record_partial(10_300, 180);
        assert!(metrics.is_first_partial);
        assert_eq!(metrics.end_to_end_latency_ms, 300);
    }
}
