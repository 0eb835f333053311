//! Depth camera input and frame alignment.
//!
//! This module owns the device lifecycle and turns each color/depth frame
//! set delivered by the camera into a pair of frames that share one pixel
//! grid, the color sensor's.

mod align;
mod calibration;
mod camera;
mod config;
mod frame;
mod source;

pub use align::DepthAligner;
pub use calibration::{Calibration, Extrinsics, Intrinsics};
pub use camera::{
    CameraError, DepthCamera, FrameSet, SceneObject, SyntheticCamera, SyntheticFault,
    SyntheticScene,
};
pub use config::{
    ColorFormat, ConfigError, DepthFormat, DetectorConfig, DeviceConfig, FileConfig, FusionConfig,
    PipelineConfig, StreamConfig,
};
pub use frame::{ColorFrame, DepthFrame, RawDepthFrame};
pub use source::{AcquisitionError, DeviceError, FrameSource, SourceState, Stream};
