//! Prometheus metrics exporter for pipeline monitoring.
//!
//! # Metrics Exposed
//!
//! - `depth_fusion_running` - Whether a run is in progress
//! - `depth_fusion_cycles_total` - Cycles started
//! - `depth_fusion_cycles_completed_total` - Cycles that emitted results
//! - `depth_fusion_cycles_skipped_total{reason}` - Skipped cycles (`timeout`, `incomplete`, `malformed`)
//! - `depth_fusion_detector_failures_total` - Detector failures
//! - `depth_fusion_detections_total` - Fused detections emitted
//! - `depth_fusion_detections_without_depth_total` - Detections with no valid depth
//! - `depth_fusion_cycle_duration_seconds` - Duration of the latest cycle
//!
//! # Example
//!
//! ```no_run
//! use depth_fusion::metrics::{MetricsRegistry, MetricsSnapshot};
//! use depth_fusion::pipeline::{CycleStats, RunState};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let stats = CycleStats::default();
//! registry.update(&MetricsSnapshot::from_stats(&stats, RunState::Idle));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
