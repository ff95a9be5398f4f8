//! Latency and performance metrics for the STT sidecar (ambient stack,
//! SPEC_FULL.md §10): the wire-level `LatencyMetrics` struct carried on
//! transcription events, a generic counter/gauge registry, and an
//! aggregate STT performance tracker with threshold-based alerts.

pub mod integration;
pub mod latency;
pub mod metrics;
pub mod stt_metrics;

pub use integration::*;
pub use latency::{LatencyMetrics, LatencyTracker};
pub use metrics::BasicMetrics;
pub use stt_metrics::*;
