//! Output side of the pipeline.

use chrono::Local;

use crate::capture::ColorFrame;
use crate::detection::ClassLabels;
use crate::fusion::FusedDetection;

/// Consumer of each cycle's results (display, recording, logging).
pub trait FrameSink {
    /// Receives the color frame and its fused detections.
    fn emit(&mut self, color: &ColorFrame, detections: &[FusedDetection]);

    /// Persists the current annotated frame. Called after `emit` in a cycle
    /// where a snapshot was requested.
    fn snapshot(&mut self, color: &ColorFrame, detections: &[FusedDetection]);
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn emit(&mut self, color: &ColorFrame, detections: &[FusedDetection]) {
        (**self).emit(color, detections)
    }

    fn snapshot(&mut self, color: &ColorFrame, detections: &[FusedDetection]) {
        (**self).snapshot(color, detections)
    }
}

/// Snapshot name for the current local time, e.g. `snapshot_20240131-142501`.
pub fn snapshot_name() -> String {
    format!("snapshot_{}", Local::now().format("%Y%m%d-%H%M%S"))
}

/// Formats the overlay text for one detection, e.g. `cup 0.87 1.25m`.
pub fn describe(detection: &FusedDetection, labels: &ClassLabels) -> String {
    let label = labels.name(detection.detection.class_id);
    match detection.distance_m {
        Some(distance) => format!(
            "{label} {:.2} {distance:.2}m",
            detection.detection.confidence
        ),
        None => format!("{label} {:.2} no depth", detection.detection.confidence),
    }
}

/// Sink that writes results to the log.
#[derive(Debug, Default)]
pub struct LoggingSink {
    labels: ClassLabels,
    snapshots: Vec<String>,
}

impl LoggingSink {
    pub fn new(labels: ClassLabels) -> Self {
        Self {
            labels,
            snapshots: Vec::new(),
        }
    }

    /// Names of the snapshots taken so far.
    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}

impl FrameSink for LoggingSink {
    fn emit(&mut self, color: &ColorFrame, detections: &[FusedDetection]) {
        for detection in detections {
            tracing::info!(
                sequence = color.sequence(),
                cx = detection.center.0,
                cy = detection.center.1,
                "{}",
                describe(detection, &self.labels)
            );
        }
    }

    fn snapshot(&mut self, color: &ColorFrame, detections: &[FusedDetection]) {
        let name = snapshot_name();
        tracing::info!(
            sequence = color.sequence(),
            detections = detections.len(),
            name = %name,
            "Snapshot captured"
        );
        self.snapshots.push(name);
    }
}
