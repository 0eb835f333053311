//! Depth-to-color alignment.
//!
//! The depth and color sensors sit a few centimeters apart, so the same
//! pixel coordinates in the two raw images look at different points in
//! the scene. Alignment reprojects every depth sample through 3-D space
//! into the color sensor's pixel grid.

use super::calibration::Calibration;
use super::frame::{DepthFrame, RawDepthFrame};

/// Reprojects raw depth frames into the color sensor's viewpoint.
#[derive(Debug, Clone)]
pub struct DepthAligner {
    calibration: Calibration,
}

impl DepthAligner {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Aligns a raw depth frame to the color grid.
    ///
    /// Each nonzero sample is deprojected with the depth intrinsics, moved
    /// into the color frame of reference and projected onto the nearest
    /// color pixel, where it is stored as its color-frame depth. When
    /// several samples land on one pixel the nearest surface wins. Color
    /// pixels no sample reaches stay `0`. Samples missing from a short
    /// buffer are treated as no return.
    pub fn align(&self, raw: &RawDepthFrame) -> DepthFrame {
        let cal = &self.calibration;
        let color = cal.color;
        let mut aligned = vec![0u16; (color.width as usize) * (color.height as usize)];

        let width = raw.width().min(cal.depth.width);
        let height = raw.height().min(cal.depth.height);
        let samples = raw.samples();

        for v in 0..height {
            let row = (v as usize) * (raw.width() as usize);
            for u in 0..width {
                let sample = match samples.get(row + u as usize) {
                    Some(&sample) if sample != 0 => sample,
                    _ => continue,
                };

                let depth = sample as f32 * cal.depth_scale;
                let Some((x, y, z)) = cal.depth_pixel_to_color(u as f32, v as f32, depth) else {
                    continue;
                };
                let Some((cx, cy)) = color.pixel_index(x, y) else {
                    continue;
                };

                let quantized = (z / cal.depth_scale).round();
                if quantized < 1.0 || quantized > u16::MAX as f32 {
                    continue;
                }
                let quantized = quantized as u16;

                let Some(slot) = aligned.get_mut((cy as usize) * (color.width as usize) + cx as usize)
                else {
                    continue;
                };
                if *slot == 0 || quantized < *slot {
                    *slot = quantized;
                }
            }
        }

        DepthFrame::new(aligned, cal.depth_scale, color, raw.sequence())
    }
}
