//! Sensor intrinsics and the rigid transform between the depth and color
//! sensors.
//!
//! Pinhole model without lens distortion. Pixel coordinates address pixel
//! centers, so pixel `(u, v)` projects from the ray through `(u, v)`.

use glam::{Mat3, Vec3};

/// Pinhole intrinsics of one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// Focal length in pixels along x.
    pub fx: f32,
    /// Focal length in pixels along y.
    pub fy: f32,
    /// Principal point x.
    pub ppx: f32,
    /// Principal point y.
    pub ppy: f32,
}

impl Intrinsics {
    pub fn new(width: u32, height: u32, fx: f32, fy: f32, ppx: f32, ppy: f32) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            ppx,
            ppy,
        }
    }

    /// Point in sensor space (meters) for pixel `(x, y)` at `depth` meters.
    #[inline]
    pub fn deproject(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        Vec3::new(
            (x - self.ppx) / self.fx * depth,
            (y - self.ppy) / self.fy * depth,
            depth,
        )
    }

    /// Pixel coordinates of a sensor-space point, or `None` behind the sensor.
    #[inline]
    pub fn project(&self, point: Vec3) -> Option<(f32, f32)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            point.x / point.z * self.fx + self.ppx,
            point.y / point.z * self.fy + self.ppy,
        ))
    }

    /// Nearest pixel for sub-pixel coordinates, if inside the image.
    #[inline]
    pub fn pixel_index(&self, x: f32, y: f32) -> Option<(u32, u32)> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let (px, py) = (x.round(), y.round());
        if px < 0.0 || py < 0.0 || px >= self.width as f32 || py >= self.height as f32 {
            return None;
        }
        Some((px as u32, py as u32))
    }
}

/// Rigid transform from one sensor's frame of reference to another's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    pub rotation: Mat3,
    /// Translation in meters.
    pub translation: Vec3,
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    /// Pure translation, e.g. a horizontal stereo baseline.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation,
        }
    }

    #[inline]
    pub fn transform(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Transform in the opposite direction.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

/// Everything needed to map depth pixels onto the color image.
///
/// Reported by the device when it is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub depth: Intrinsics,
    pub color: Intrinsics,
    pub depth_to_color: Extrinsics,
    /// Meters per raw depth unit.
    pub depth_scale: f32,
}

impl Calibration {
    /// Color pixel that sees the point measured by depth pixel `(u, v)` at
    /// `depth` meters, together with that point's depth in the color frame.
    pub fn depth_pixel_to_color(&self, u: f32, v: f32, depth: f32) -> Option<(f32, f32, f32)> {
        let point = self
            .depth_to_color
            .transform(self.depth.deproject(u, v, depth));
        let (x, y) = self.color.project(point)?;
        Some((x, y, point.z))
    }

    /// Depth pixel that sees the point observed by color pixel `(x, y)` at
    /// `depth` meters (depth measured in the color frame).
    pub fn color_pixel_to_depth(&self, x: f32, y: f32, depth: f32) -> Option<(f32, f32, f32)> {
        let point = self
            .depth_to_color
            .inverse()
            .transform(self.color.deproject(x, y, depth));
        let (u, v) = self.depth.project(point)?;
        Some((u, v, point.z))
    }
}
