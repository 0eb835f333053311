//! Metrics collection and registry.

use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::pipeline::{CycleStats, RunState};

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of pipeline state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether a run is in progress.
    pub running: bool,
    /// Cycles started.
    pub cycles: u64,
    /// Cycles that produced output.
    pub completed: u64,
    /// Cycles skipped on acquisition timeout.
    pub skipped_timeout: u64,
    /// Cycles skipped on an incomplete frame set.
    pub skipped_incomplete: u64,
    /// Cycles skipped on a malformed frame.
    pub skipped_malformed: u64,
    /// Detector failures.
    pub detector_failures: u64,
    /// Fused detections emitted.
    pub detections: u64,
    /// Fused detections emitted without a distance.
    pub detections_without_depth: u64,
    /// Duration of the most recent cycle in seconds.
    pub last_cycle_seconds: Option<f64>,
}

impl MetricsSnapshot {
    /// Creates a snapshot from the orchestrator's counters.
    pub fn from_stats(stats: &CycleStats, state: RunState) -> Self {
        Self {
            running: state == RunState::Running,
            cycles: stats.cycles,
            completed: stats.completed,
            skipped_timeout: stats.skipped_timeout,
            skipped_incomplete: stats.skipped_incomplete,
            skipped_malformed: stats.skipped_malformed,
            detector_failures: stats.detector_failures,
            detections: stats.detections,
            detections_without_depth: stats.detections_without_depth,
            last_cycle_seconds: stats.last_cycle.map(|d| d.as_secs_f64()),
        }
    }
}

/// Prometheus metrics registry for pipeline monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    running: IntGauge,
    cycles_total: IntCounter,
    cycles_completed_total: IntCounter,
    cycles_skipped_total: IntCounterVec,
    detector_failures_total: IntCounter,
    detections_total: IntCounter,
    detections_without_depth_total: IntCounter,
    cycle_duration_seconds: Gauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let running = IntGauge::new(
            "depth_fusion_running",
            "Whether a run is in progress (1=running, 0=idle)",
        )?;
        let cycles_total = IntCounter::new("depth_fusion_cycles_total", "Cycles started")?;
        let cycles_completed_total = IntCounter::new(
            "depth_fusion_cycles_completed_total",
            "Cycles that emitted results",
        )?;
        let cycles_skipped_total = IntCounterVec::new(
            Opts::new(
                "depth_fusion_cycles_skipped_total",
                "Cycles skipped for lack of a frame pair",
            ),
            &["reason"],
        )?;
        let detector_failures_total = IntCounter::new(
            "depth_fusion_detector_failures_total",
            "Cycles whose detector call failed",
        )?;
        let detections_total = IntCounter::new(
            "depth_fusion_detections_total",
            "Fused detections emitted",
        )?;
        let detections_without_depth_total = IntCounter::new(
            "depth_fusion_detections_without_depth_total",
            "Fused detections emitted without a valid depth sample",
        )?;
        let cycle_duration_seconds = Gauge::new(
            "depth_fusion_cycle_duration_seconds",
            "Wall-clock duration of the most recent completed cycle",
        )?;

        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycles_completed_total.clone()))?;
        registry.register(Box::new(cycles_skipped_total.clone()))?;
        registry.register(Box::new(detector_failures_total.clone()))?;
        registry.register(Box::new(detections_total.clone()))?;
        registry.register(Box::new(detections_without_depth_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            running,
            cycles_total,
            cycles_completed_total,
            cycles_skipped_total,
            detector_failures_total,
            detections_total,
            detections_without_depth_total,
            cycle_duration_seconds,
        })
    }

    /// Updates all metrics from a snapshot of pipeline state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.running.set(i64::from(snapshot.running));

        // Counters only move forward, so apply the difference.
        advance(&self.cycles_total, snapshot.cycles);
        advance(&self.cycles_completed_total, snapshot.completed);
        advance(
            &self.cycles_skipped_total.with_label_values(&["timeout"]),
            snapshot.skipped_timeout,
        );
        advance(
            &self.cycles_skipped_total.with_label_values(&["incomplete"]),
            snapshot.skipped_incomplete,
        );
        advance(
            &self.cycles_skipped_total.with_label_values(&["malformed"]),
            snapshot.skipped_malformed,
        );
        advance(&self.detector_failures_total, snapshot.detector_failures);
        advance(&self.detections_total, snapshot.detections);
        advance(
            &self.detections_without_depth_total,
            snapshot.detections_without_depth,
        );

        if let Some(seconds) = snapshot.last_cycle_seconds {
            self.cycle_duration_seconds.set(seconds);
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let stats = CycleStats {
            cycles: 12,
            completed: 8,
            skipped_timeout: 1,
            skipped_incomplete: 1,
            skipped_malformed: 2,
            detector_failures: 2,
            detections: 12,
            detections_without_depth: 3,
            last_cycle: Some(Duration::from_millis(25)),
        };
        registry.update(&MetricsSnapshot::from_stats(&stats, RunState::Running));

        let output = registry.encode().unwrap();
        assert!(output.contains("depth_fusion_running 1"));
        assert!(output.contains("depth_fusion_cycles_total 12"));
        assert!(output.contains("depth_fusion_cycles_skipped_total{reason=\"timeout\"} 1"));
        assert!(output.contains("depth_fusion_cycles_skipped_total{reason=\"malformed\"} 2"));
        assert!(output.contains("depth_fusion_detections_without_depth_total 3"));
        assert!(output.contains("depth_fusion_cycle_duration_seconds 0.025"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        let mut snapshot = MetricsSnapshot {
            cycles: 5,
            ..Default::default()
        };
        registry.update(&snapshot);
        snapshot.cycles = 3;
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("depth_fusion_cycles_total 5"));
        assert!(output.contains("depth_fusion_running 0"));
    }
}
