//! Detection-to-depth fusion.
//!
//! Attaches a distance to each 2-D detection by sampling the aligned depth
//! frame at the box's representative point.

mod fuser;

pub use fuser::{DepthFuser, FusedDetection, SamplingPolicy};
