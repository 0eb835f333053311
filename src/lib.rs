//! Depth Fusion Library
//!
//! Fuses 2-D object detections with per-pixel depth from an RGB-D camera
//! to estimate how far away each detected object is, in real time.
//!
//! # Architecture
//!
//! Each cycle follows an explicit data flow:
//!
//! ```text
//! capture (align depth to color) → detection → fusion → sink
//!                      ↓
//!              pipeline (run state, recovery) → metrics
//! ```
//!
//! # Design Principles
//!
//! - **Owned device**: the camera handle belongs to one `FrameSource` and
//!   is released on every exit path
//! - **Aligned, not copied**: depth is reprojected into the color sensor's
//!   viewpoint before any sampling
//! - **Absent, not zero**: a pixel without a depth return yields no
//!   distance rather than `0 m`
//! - **Only device failures are fatal**: frame misses and detector errors
//!   skip or empty a single cycle
//!
//! # Example
//!
//! ```no_run
//! use depth_fusion::{
//!     capture::{DeviceConfig, SceneObject, SyntheticCamera, SyntheticScene},
//!     detection::{BoundingBox, Detection, FixedDetector},
//!     pipeline::{LoggingSink, PipelineOrchestrator},
//! };
//!
//! let scene = SyntheticScene::default().with_object(SceneObject::at(100, 100, 200, 200, 1.25));
//! let detector = FixedDetector::new(vec![Detection::new(
//!     BoundingBox::new(100, 100, 200, 200),
//!     0,
//!     0.9,
//! )]);
//!
//! let mut pipeline = PipelineOrchestrator::new(
//!     SyntheticCamera::new(scene),
//!     detector,
//!     LoggingSink::default(),
//!     DeviceConfig::default(),
//! )
//! .with_max_cycles(10);
//!
//! let stats = pipeline.run().unwrap();
//! println!("{} cycles, {} detections", stats.completed, stats.detections);
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod detection;
pub mod fusion;
pub mod metrics;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use capture::{
    AcquisitionError, ColorFrame, DepthCamera, DepthFrame, DeviceConfig, DeviceError, FileConfig,
    FrameSource, StreamConfig, SyntheticCamera,
};
pub use detection::{BoundingBox, Detection, Detector, DetectorError};
pub use fusion::{DepthFuser, FusedDetection, SamplingPolicy};
pub use pipeline::{ControlHandle, FrameSink, PipelineError, PipelineOrchestrator, RunState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
