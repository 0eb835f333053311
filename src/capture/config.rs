//! Device and pipeline configuration.
//!
//! Color and depth streams always share resolution and frame rate so that
//! a pixel in the aligned depth frame addresses the same location as the
//! color pixel with the same coordinates.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::fusion::SamplingPolicy;

/// Pixel layout of the color stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    /// 8-bit blue, green, red.
    Bgr8,
    /// 8-bit red, green, blue.
    Rgb8,
}

impl ColorFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        3
    }
}

/// Sample encoding of the depth stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthFormat {
    /// 16-bit unsigned depth units, scaled to meters by the device depth scale.
    Z16,
}

/// Stream settings shared by the color and depth sensors.
///
/// Immutable once the device has been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Frame width in pixels (both streams).
    pub width: u32,
    /// Frame height in pixels (both streams).
    pub height: u32,
    /// Frames per second (both streams).
    pub frame_rate: u32,
    /// Color pixel format.
    pub color_format: ColorFormat,
    /// Depth unit format.
    pub depth_format: DepthFormat,
}

impl StreamConfig {
    /// Number of pixels in one frame.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Options recognized at the device boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Stream width in pixels.
    pub stream_width: u32,
    /// Stream height in pixels.
    pub stream_height: u32,
    /// Target frames per second.
    pub frame_rate: u32,
    /// Color pixel format.
    pub color_format: ColorFormat,
    /// Depth unit format.
    pub depth_format: DepthFormat,
    /// Frames discarded after start while auto-exposure settles.
    pub warm_up_frame_count: u32,
    /// Timeout for warm-up frames and the first frame after start.
    pub acquisition_timeout_ms: u64,
    /// Timeout for every later frame.
    pub steady_state_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            stream_width: 640,
            stream_height: 480,
            frame_rate: 30,
            color_format: ColorFormat::Bgr8,
            depth_format: DepthFormat::Z16,
            warm_up_frame_count: 30,
            acquisition_timeout_ms: 5000,
            steady_state_timeout_ms: 1000,
        }
    }
}

impl DeviceConfig {
    /// Creates a configuration with the specified stream dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            stream_width: width,
            stream_height: height,
            ..Default::default()
        }
    }

    /// The stream settings applied to both sensors.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            width: self.stream_width,
            height: self.stream_height,
            frame_rate: self.frame_rate,
            color_format: self.color_format,
            depth_format: self.depth_format,
        }
    }

    /// Timeout used for warm-up and the first cycle after start.
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }

    /// Timeout used for steady-state cycles.
    pub fn steady_state_timeout(&self) -> Duration {
        Duration::from_millis(self.steady_state_timeout_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream_width == 0 || self.stream_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.acquisition_timeout_ms == 0 || self.steady_state_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("acquisition timeouts must be non-zero")]
    InvalidTimeout,
    #[error("confidence threshold {0} outside [0, 1]")]
    InvalidConfidence(f32),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Detector invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum confidence for a detection to reach the pipeline.
    pub confidence_threshold: f32,
    /// Display names indexed by class id.
    pub class_names: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            class_names: Vec::new(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidConfidence(self.confidence_threshold));
        }
        Ok(())
    }
}

/// Depth sampling settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub sampling: SamplingPolicy,
}

/// Run loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stop after this many cycles (0 runs until a stop is requested).
    pub max_cycles: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_cycles: 0,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device.validate()?;
        self.detector.validate()
    }
}
