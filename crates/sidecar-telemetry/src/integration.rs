//! Builder/manager pair wiring [`SttPerformanceMetrics`] up with a
//! threshold set and presets, so the pipeline can record and periodically
//! log a performance summary with a couple of lines of setup.
//!
//! Grounded on `Coldaine-ColdVox/crates/coldvox-telemetry/src/integration.rs`,
//! trimmed of the memory-usage threshold (dropped alongside
//! `ResourceMetrics`, see `stt_metrics.rs`).

use crate::stt_metrics::{PerformanceAlert, PerformanceThresholds, SttPerformanceMetrics};
use std::sync::Arc;
use std::time::Duration;

pub struct SttMetricsBuilder {
    thresholds: PerformanceThresholds,
    enable_alerts: bool,
    enable_trending: bool,
}

impl SttMetricsBuilder {
    pub fn new() -> Self {
        Self {
            thresholds: PerformanceThresholds::default(),
            enable_alerts: true,
            enable_trending: true,
        }
    }

    pub fn with_thresholds(mut self, thresholds: PerformanceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_latency(mut self, latency_ms: u64) -> Self {
        self.thresholds.max_latency_us = latency_ms * 1000;
        self
    }

    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.thresholds.min_confidence = confidence;
        self
    }

    pub fn with_max_error_rate(mut self, error_rate_per_1k: u64) -> Self {
        self.thresholds.max_error_rate_per_1k = error_rate_per_1k;
        self
    }

    pub fn with_alerts(mut self, enable: bool) -> Self {
        self.enable_alerts = enable;
        self
    }

    pub fn with_trending(mut self, enable: bool) -> Self {
        self.enable_trending = enable;
        self
    }

    pub fn build(self) -> SttMetricsManager {
        SttMetricsManager {
            metrics: Arc::new(SttPerformanceMetrics::new()),
            thresholds: self.thresholds,
            enable_alerts: self.enable_alerts,
            enable_trending: self.enable_trending,
        }
    }
}

impl Default for SttMetricsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SttMetricsBuilder {
    pub fn production() -> Self {
        Self::new()
            .with_max_latency(500)
            .with_min_confidence(0.75)
            .with_max_error_rate(50)
    }

    pub fn development() -> Self {
        Self::new()
            .with_max_latency(1000)
            .with_min_confidence(0.6)
            .with_max_error_rate(100)
    }

    pub fn testing() -> Self {
        Self::new().with_alerts(false).with_trending(false)
    }
}

/// Manager for STT performance metrics with built-in alert handling.
pub struct SttMetricsManager {
    metrics: Arc<SttPerformanceMetrics>,
    thresholds: PerformanceThresholds,
    enable_alerts: bool,
    enable_trending: bool,
}

impl SttMetricsManager {
    pub fn metrics(&self) -> Arc<SttPerformanceMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn record_successful_transcription(
        &self,
        end_to_end_latency: Duration,
        engine_processing_time: Duration,
        confidence_score: Option<f64>,
    ) {
        self.metrics.record_end_to_end_latency(end_to_end_latency);
        self.metrics.record_engine_processing_time(engine_processing_time);
        self.metrics.record_transcription_success();
        self.metrics.record_final_transcription();
        self.metrics.increment_total_requests();

        if let Some(confidence) = confidence_score {
            self.metrics.record_confidence_score(confidence);
        }
    }

    pub fn record_failed_transcription(&self, error_latency: Option<Duration>) {
        self.metrics.record_transcription_failure();
        self.metrics.record_error();
        self.metrics.increment_total_requests();

        if let Some(latency) = error_latency {
            self.metrics.record_end_to_end_latency(latency);
        }
    }

    pub fn get_performance_summary(&self) -> PerformanceSummary {
        let (latency, _, operational) = self.metrics.snapshot();
        PerformanceSummary {
            avg_latency_ms: latency.end_to_end_us as f64 / 1000.0,
            avg_confidence: self.metrics.get_average_confidence(),
            success_rate: self.metrics.get_success_rate(),
            total_requests: operational.request_count,
            total_errors: operational.error_count,
        }
    }

    pub fn check_alerts(&self) -> Vec<PerformanceAlert> {
        if !self.enable_alerts {
            return Vec::new();
        }
        self.metrics.check_alerts(&self.thresholds)
    }

    pub fn get_latency_trend(&self) -> Option<LatencyTrend> {
        if !self.enable_trending {
            return None;
        }
        self.metrics.get_latency_trend().map(|slope| {
            if slope > 1000.0 {
                LatencyTrend::Increasing
            } else if slope < -1000.0 {
                LatencyTrend::Decreasing
            } else {
                LatencyTrend::Stable
            }
        })
    }

    pub fn format_metrics_report(&self) -> String {
        let summary = self.get_performance_summary();
        let alerts = self.check_alerts();

        let mut report = format!(
            "stt performance: {:.1}ms avg latency, {:.1}% avg confidence, {:.1}% success rate, {} requests ({} errors)",
            summary.avg_latency_ms,
            summary.avg_confidence * 100.0,
            summary.success_rate * 100.0,
            summary.total_requests,
            summary.total_errors
        );

        if !alerts.is_empty() {
            report.push_str(&format!(", {} alert(s) active", alerts.len()));
        }

        if let Some(trend) = self.get_latency_trend() {
            let trend_str = match trend {
                LatencyTrend::Increasing => "increasing",
                LatencyTrend::Decreasing => "decreasing",
                LatencyTrend::Stable => "stable",
            };
            report.push_str(&format!(", latency trend {trend_str}"));
        }

        report
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceSummary {
    pub avg_latency_ms: f64,
    pub avg_confidence: f64,
    pub success_rate: f64,
    pub total_requests: u64,
    pub total_errors: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyTrend {
    Increasing,
    Decreasing,
    Stable,
}
