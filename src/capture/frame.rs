//! Frame types produced by the depth camera.
//!
//! A cycle owns exactly one [`ColorFrame`] and one aligned [`DepthFrame`];
//! neither is retained once the cycle ends.

use std::time::Instant;

use super::calibration::Intrinsics;
use super::config::ColorFormat;

/// A captured color image.
#[derive(Clone)]
pub struct ColorFrame {
    /// Interleaved pixel data, `width * height * 3` bytes.
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: ColorFormat,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number.
    sequence: u64,
}

impl ColorFrame {
    /// Creates a new frame with the given parameters.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: ColorFormat, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> ColorFormat {
        self.format
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 3;
        self.pixels
            .get(offset..offset + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len()
            == (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel()
    }
}

impl std::fmt::Debug for ColorFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// Depth samples in the depth sensor's own pixel grid, as delivered by the
/// device before alignment.
#[derive(Clone)]
pub struct RawDepthFrame {
    samples: Vec<u16>,
    width: u32,
    height: u32,
    timestamp: Instant,
    sequence: u64,
}

impl RawDepthFrame {
    pub fn new(samples: Vec<u16>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            samples,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_valid(&self) -> bool {
        self.samples.len() == (self.width as usize) * (self.height as usize)
    }
}

impl std::fmt::Debug for RawDepthFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDepthFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Depth samples reprojected into the color sensor's pixel grid.
///
/// A raw sample of `0` means the sensor had no return for that pixel.
#[derive(Clone)]
pub struct DepthFrame {
    samples: Vec<u16>,
    width: u32,
    height: u32,
    /// Meters per raw depth unit.
    depth_scale: f32,
    /// Intrinsics of the grid the samples live in (the color sensor's).
    intrinsics: Intrinsics,
    timestamp: Instant,
    sequence: u64,
}

impl DepthFrame {
    /// Creates an aligned depth frame whose grid is described by `intrinsics`.
    pub fn new(samples: Vec<u16>, depth_scale: f32, intrinsics: Intrinsics, sequence: u64) -> Self {
        Self {
            samples,
            width: intrinsics.width,
            height: intrinsics.height,
            depth_scale,
            intrinsics,
            timestamp: Instant::now(),
            sequence,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn depth_scale(&self) -> f32 {
        self.depth_scale
    }

    #[inline]
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Raw sample at `(x, y)`; `0` outside the frame.
    pub fn raw_at(&self, x: u32, y: u32) -> u16 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.samples
            .get((y as usize) * (self.width as usize) + x as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Distance in meters at `(x, y)`.
    ///
    /// Returns `0.0` when there is no valid measurement, including for
    /// coordinates outside the frame.
    pub fn distance_at(&self, x: u32, y: u32) -> f32 {
        self.raw_at(x, y) as f32 * self.depth_scale
    }

    /// Camera-space point (meters) seen at `(x, y)`, if the sample is valid.
    pub fn deproject(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        let depth = self.distance_at(x, y);
        if depth <= 0.0 {
            return None;
        }
        Some(
            self.intrinsics
                .deproject(x as f32, y as f32, depth)
                .to_array(),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.samples.len() == (self.width as usize) * (self.height as usize)
    }
}

impl std::fmt::Debug for DepthFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth_scale", &self.depth_scale)
            .field("sequence", &self.sequence)
            .finish()
    }
}
