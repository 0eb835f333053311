//! Per-run cycle counters.

use std::time::Duration;

use crate::capture::AcquisitionError;

/// Counters accumulated since the orchestrator was constructed.
///
/// Not reset by `start_run`, so totals span restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    /// Cycles started.
    pub cycles: u64,
    /// Cycles that produced output.
    pub completed: u64,
    /// Cycles skipped because no frame pair arrived in time.
    pub skipped_timeout: u64,
    /// Cycles skipped because a stream delivered no frame.
    pub skipped_incomplete: u64,
    /// Cycles skipped because a frame did not match its declared size.
    pub skipped_malformed: u64,
    /// Cycles whose detector call failed.
    pub detector_failures: u64,
    /// Fused detections emitted.
    pub detections: u64,
    /// Fused detections emitted without a distance.
    pub detections_without_depth: u64,
    /// Duration of the most recent completed cycle.
    pub last_cycle: Option<Duration>,
}

impl CycleStats {
    pub(crate) fn record_skip(&mut self, error: &AcquisitionError) {
        match error {
            AcquisitionError::Timeout(_) => self.skipped_timeout += 1,
            AcquisitionError::Incomplete { .. } => self.skipped_incomplete += 1,
            AcquisitionError::Malformed { .. } => self.skipped_malformed += 1,
            _ => {}
        }
    }

    /// Cycles skipped for any reason.
    pub fn skipped(&self) -> u64 {
        self.skipped_timeout + self.skipped_incomplete + self.skipped_malformed
    }

    /// Fraction of emitted detections that carried a distance.
    pub fn depth_coverage(&self) -> Option<f64> {
        if self.detections == 0 {
            return None;
        }
        Some((self.detections - self.detections_without_depth) as f64 / self.detections as f64)
    }
}
