//! Depth camera abstraction.
//!
//! This module provides a trait-based abstraction over depth-sensing
//! camera hardware, allowing for both real devices and a synthetic
//! implementation for testing and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use thiserror::Error;

use super::calibration::{Calibration, Extrinsics, Intrinsics};
use super::config::StreamConfig;
use super::frame::{ColorFrame, RawDepthFrame};

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("no frames within {0:?}")]
    Timeout(Duration),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera disconnected")]
    Disconnected,
    #[error("camera not initialized")]
    NotInitialized,
}

/// Frames delivered together by one wait on the device.
///
/// Either stream may be missing when the device drops a frame.
#[derive(Debug, Default)]
pub struct FrameSet {
    pub color: Option<ColorFrame>,
    pub depth: Option<RawDepthFrame>,
}

/// Trait for depth camera implementations.
///
/// The device exposes a color stream and a depth stream configured with
/// the same resolution and frame rate.
pub trait DepthCamera {
    /// Opens the device, enables both streams and reports the calibration
    /// needed to align them.
    fn open(&mut self, config: &StreamConfig) -> Result<Calibration, CameraError>;

    /// Blocks until the next frame set arrives or `timeout` elapses.
    fn wait_for_frames(&mut self, timeout: Duration) -> Result<FrameSet, CameraError>;

    /// Checks if the device is currently open.
    fn is_open(&self) -> bool;

    /// Stops both streams and releases the device.
    fn close(&mut self);
}

/// A rectangular, fronto-parallel object in the synthetic scene.
///
/// The region is given in color pixels; `distance_m` of `None` models a
/// surface that returns no depth (e.g. glass or a sensor shadow). Dropout
/// regions are placed at the background plane's depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub distance_m: Option<f32>,
    pub color: [u8; 3],
}

impl SceneObject {
    pub fn at(x1: u32, y1: u32, x2: u32, y2: u32, distance_m: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            distance_m: Some(distance_m),
            color: [40, 160, 40],
        }
    }

    pub fn dropout(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            distance_m: None,
            color: [40, 40, 160],
        }
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        let (x, y) = (x.round(), y.round());
        x >= self.x1 as f32 && x < self.x2 as f32 && y >= self.y1 as f32 && y < self.y2 as f32
    }
}

/// Scene rendered by [`SyntheticCamera`]: a flat background plane with
/// objects in front of it.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub background_m: f32,
    pub objects: Vec<SceneObject>,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            background_m: 3.0,
            objects: Vec::new(),
        }
    }
}

impl SyntheticScene {
    pub fn with_object(mut self, object: SceneObject) -> Self {
        self.objects.push(object);
        self
    }
}

/// Failure injected into a single `wait_for_frames` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticFault {
    Timeout,
    MissingColor,
    MissingDepth,
    /// Depth buffer shorter than its declared dimensions.
    TruncatedDepth,
    Disconnect,
}

/// Synthetic depth camera that renders a [`SyntheticScene`].
///
/// Depth is rendered in the depth sensor's own viewpoint through the
/// configured calibration, so a correct alignment step maps each object's
/// depth back onto its color-pixel region.
#[derive(Debug)]
pub struct SyntheticCamera {
    scene: SyntheticScene,
    baseline_m: f32,
    depth_scale: f32,
    stream: Option<StreamConfig>,
    calibration: Option<Calibration>,
    faults: HashMap<u64, SyntheticFault>,
    fail_open: bool,
    /// Number of `wait_for_frames` calls since open.
    calls: u64,
    sequence: u64,
    closes: Arc<AtomicUsize>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(SyntheticScene::default())
    }
}

impl SyntheticCamera {
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            baseline_m: 0.015,
            depth_scale: 0.001,
            stream: None,
            calibration: None,
            faults: HashMap::new(),
            fail_open: false,
            calls: 0,
            sequence: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Horizontal offset between the depth and color sensors.
    pub fn with_baseline(mut self, baseline_m: f32) -> Self {
        self.baseline_m = baseline_m;
        self
    }

    /// Makes `open` fail as if the device were absent.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Injects a fault into the `call`-th wait after open (1-based, counting
    /// warm-up frames).
    pub fn inject_fault(&mut self, call: u64, fault: SyntheticFault) {
        self.faults.insert(call, fault);
    }

    /// Replaces the scene for subsequent frames.
    pub fn set_scene(&mut self, scene: SyntheticScene) {
        self.scene = scene;
    }

    /// Shared counter of effective device releases.
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    /// Number of `wait_for_frames` calls since open.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn calibration_for(&self, config: &StreamConfig) -> Calibration {
        // Roughly a 69 degree horizontal field of view, like common RGB-D modules.
        let focal = config.width as f32 * 0.725;
        let intrinsics = Intrinsics::new(
            config.width,
            config.height,
            focal,
            focal,
            (config.width as f32 - 1.0) / 2.0,
            (config.height as f32 - 1.0) / 2.0,
        );
        Calibration {
            depth: intrinsics,
            color: intrinsics,
            depth_to_color: Extrinsics::from_translation(Vec3::new(self.baseline_m, 0.0, 0.0)),
            depth_scale: self.depth_scale,
        }
    }

    fn render_color(&self, config: &StreamConfig) -> ColorFrame {
        let (width, height) = (config.width, config.height);
        let mut pixels = vec![128u8; config.pixel_count() * 3];
        for object in &self.scene.objects {
            for y in object.y1..object.y2.min(height) {
                for x in object.x1..object.x2.min(width) {
                    let offset = ((y * width + x) * 3) as usize;
                    pixels[offset..offset + 3].copy_from_slice(&object.color);
                }
            }
        }
        ColorFrame::new(pixels, width, height, config.color_format, self.sequence)
    }

    fn render_depth(&self, config: &StreamConfig, calibration: &Calibration) -> RawDepthFrame {
        let background = self.scene.background_m;
        let mut objects = self.scene.objects.clone();
        objects.sort_by(|a, b| {
            let da = a.distance_m.unwrap_or(background);
            let db = b.distance_m.unwrap_or(background);
            da.total_cmp(&db)
        });

        let mut samples = Vec::with_capacity(config.pixel_count());
        for v in 0..config.height {
            for u in 0..config.width {
                let mut sample = quantize(background, self.depth_scale);
                for object in &objects {
                    let z = object.distance_m.unwrap_or(background);
                    let hit = calibration
                        .depth_pixel_to_color(u as f32, v as f32, z)
                        .is_some_and(|(x, y, _)| object.contains(x, y));
                    if hit {
                        sample = object.distance_m.map_or(0, |d| quantize(d, self.depth_scale));
                        break;
                    }
                }
                samples.push(sample);
            }
        }
        RawDepthFrame::new(samples, config.width, config.height, self.sequence)
    }
}

fn quantize(distance_m: f32, scale: f32) -> u16 {
    (distance_m / scale).round().clamp(0.0, u16::MAX as f32) as u16
}

impl DepthCamera for SyntheticCamera {
    fn open(&mut self, config: &StreamConfig) -> Result<Calibration, CameraError> {
        if self.fail_open {
            return Err(CameraError::DeviceNotFound("synthetic device unplugged".into()));
        }
        if config.width == 0 || config.height == 0 {
            return Err(CameraError::ConfigFailed("zero-sized stream".into()));
        }

        let calibration = self.calibration_for(config);
        self.stream = Some(*config);
        self.calibration = Some(calibration);
        self.calls = 0;
        self.sequence = 0;
        tracing::info!(
            width = config.width,
            height = config.height,
            fps = config.frame_rate,
            baseline_m = self.baseline_m,
            "SyntheticCamera opened"
        );
        Ok(calibration)
    }

    fn wait_for_frames(&mut self, timeout: Duration) -> Result<FrameSet, CameraError> {
        let (Some(config), Some(calibration)) = (self.stream, self.calibration) else {
            return Err(CameraError::NotInitialized);
        };

        self.calls += 1;
        let fault = self.faults.get(&self.calls).copied();
        match fault {
            Some(SyntheticFault::Timeout) => return Err(CameraError::Timeout(timeout)),
            Some(SyntheticFault::Disconnect) => return Err(CameraError::Disconnected),
            _ => {}
        }

        self.sequence += 1;
        let color = (fault != Some(SyntheticFault::MissingColor)).then(|| self.render_color(&config));
        let depth = match fault {
            Some(SyntheticFault::MissingDepth) => None,
            Some(SyntheticFault::TruncatedDepth) => {
                let full = self.render_depth(&config, &calibration);
                let kept = full.samples().len() / 2;
                Some(RawDepthFrame::new(
                    full.samples()[..kept].to_vec(),
                    full.width(),
                    full.height(),
                    full.sequence(),
                ))
            }
            _ => Some(self.render_depth(&config, &calibration)),
        };

        Ok(FrameSet { color, depth })
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            self.calibration = None;
            self.closes.fetch_add(1, Ordering::SeqCst);
            tracing::info!("SyntheticCamera closed");
        }
    }
}
