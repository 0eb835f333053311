//! Device lifecycle and aligned frame acquisition.

use std::time::Duration;

use thiserror::Error;

use super::align::DepthAligner;
use super::camera::{CameraError, DepthCamera};
use super::config::{ConfigError, DeviceConfig, StreamConfig};
use super::frame::{ColorFrame, DepthFrame};

/// Fatal errors while bringing the device up.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("invalid device configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("failed to open depth camera: {0}")]
    OpenFailed(#[source] CameraError),
    #[error("warm-up failed after {frames} frames: {source}")]
    WarmUpFailed {
        frames: u32,
        #[source]
        source: CameraError,
    },
    #[error("frame source already started")]
    AlreadyStarted,
}

/// Which stream was missing from an incomplete frame set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Color,
    Depth,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Color => f.write_str("color"),
            Stream::Depth => f.write_str("depth"),
        }
    }
}

/// Errors from a single acquisition.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no frame pair within {0:?}")]
    Timeout(Duration),
    #[error("frame set missing {missing} frame")]
    Incomplete { missing: Stream },
    #[error("malformed {stream} frame: {reason}")]
    Malformed { stream: Stream, reason: String },
    #[error("device failure: {0}")]
    Device(#[source] CameraError),
    #[error("frame source not started")]
    NotStarted,
}

impl AcquisitionError {
    /// Transient misses that should only skip the current cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Incomplete { .. } | Self::Malformed { .. }
        )
    }
}

/// Lifecycle of a [`FrameSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    Started,
    Stopped,
}

/// Owns one depth camera and produces aligned color/depth frame pairs.
///
/// The device is released exactly once: by [`FrameSource::stop`] or, if
/// that never happens, when the source is dropped.
pub struct FrameSource<C: DepthCamera> {
    camera: C,
    state: SourceState,
    stream: Option<StreamConfig>,
    aligner: Option<DepthAligner>,
}

impl<C: DepthCamera> FrameSource<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            state: SourceState::Uninitialized,
            stream: None,
            aligner: None,
        }
    }

    /// Opens the device with matching color and depth streams and discards
    /// the warm-up frames.
    ///
    /// On failure the device is closed again and the source stays
    /// unstarted.
    pub fn start(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        if self.state == SourceState::Started {
            return Err(DeviceError::AlreadyStarted);
        }
        config.validate()?;
        let stream = config.stream_config();

        let calibration = match self.camera.open(&stream) {
            Ok(calibration) => calibration,
            Err(e) => {
                self.camera.close();
                return Err(DeviceError::OpenFailed(e));
            }
        };
        if calibration.color.width != stream.width || calibration.color.height != stream.height {
            self.camera.close();
            return Err(DeviceError::OpenFailed(CameraError::ConfigFailed(format!(
                "color stream is {}x{}, requested {}x{}",
                calibration.color.width, calibration.color.height, stream.width, stream.height
            ))));
        }

        let timeout = config.acquisition_timeout();
        for frame in 0..config.warm_up_frame_count {
            if let Err(source) = self.camera.wait_for_frames(timeout) {
                self.camera.close();
                return Err(DeviceError::WarmUpFailed {
                    frames: frame,
                    source,
                });
            }
        }

        self.stream = Some(stream);
        self.aligner = Some(DepthAligner::new(calibration));
        self.state = SourceState::Started;
        tracing::info!(
            width = stream.width,
            height = stream.height,
            fps = stream.frame_rate,
            warm_up = config.warm_up_frame_count,
            "Frame source started"
        );
        Ok(())
    }

    /// Waits for the next frame pair and aligns depth to the color grid.
    pub fn get_aligned_frame(
        &mut self,
        timeout: Duration,
    ) -> Result<(ColorFrame, DepthFrame), AcquisitionError> {
        let (aligner, stream) = match (self.state, self.aligner.as_ref(), self.stream) {
            (SourceState::Started, Some(aligner), Some(stream)) => (aligner, stream),
            _ => return Err(AcquisitionError::NotStarted),
        };

        let frames = self.camera.wait_for_frames(timeout).map_err(|e| match e {
            CameraError::Timeout(waited) => AcquisitionError::Timeout(waited),
            other => AcquisitionError::Device(other),
        })?;

        let color = frames.color.ok_or(AcquisitionError::Incomplete {
            missing: Stream::Color,
        })?;
        let raw_depth = frames.depth.ok_or(AcquisitionError::Incomplete {
            missing: Stream::Depth,
        })?;

        if !color.is_valid() || color.width() != stream.width || color.height() != stream.height {
            return Err(AcquisitionError::Malformed {
                stream: Stream::Color,
                reason: format!(
                    "{}x{} frame with {} bytes, expected {}x{}",
                    color.width(),
                    color.height(),
                    color.pixels().len(),
                    stream.width,
                    stream.height
                ),
            });
        }
        if !raw_depth.is_valid() {
            return Err(AcquisitionError::Malformed {
                stream: Stream::Depth,
                reason: format!(
                    "{}x{} frame with {} samples",
                    raw_depth.width(),
                    raw_depth.height(),
                    raw_depth.samples().len()
                ),
            });
        }

        let depth = aligner.align(&raw_depth);
        tracing::trace!(
            color_sequence = color.sequence(),
            depth_sequence = depth.sequence(),
            "Aligned frame pair"
        );
        Ok((color, depth))
    }

    /// Releases the device. Safe to call repeatedly or after a failed start.
    pub fn stop(&mut self) {
        if self.state != SourceState::Started {
            tracing::debug!(state = ?self.state, "Frame source stop ignored");
            return;
        }
        self.camera.close();
        self.state = SourceState::Stopped;
        self.aligner = None;
        tracing::info!("Frame source stopped");
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Stream settings of the running device.
    pub fn stream_config(&self) -> Option<&StreamConfig> {
        self.stream.as_ref()
    }

    /// Returns a reference to the underlying camera.
    pub fn camera(&self) -> &C {
        &self.camera
    }
}

impl<C: DepthCamera> Drop for FrameSource<C> {
    fn drop(&mut self) {
        self.stop();
    }
}
