//! Detection records exchanged with the detector.

/// Axis-aligned box in color-frame pixel coordinates.
///
/// Valid boxes satisfy `x1 < x2 <= width` and `y1 < y2 <= height`; `x2` and
/// `y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Converts float model output, truncating toward zero. Negative
    /// coordinates become `0`.
    pub fn from_xyxy_f32(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.max(0.0) as u32,
            y1: y1.max(0.0) as u32,
            x2: x2.max(0.0) as u32,
            y2: y2.max(0.0) as u32,
        }
    }

    /// Center pixel, `((x1 + x2) / 2, (y1 + y2) / 2)` rounded down.
    #[inline]
    pub fn center(&self) -> (u32, u32) {
        (
            ((self.x1 as u64 + self.x2 as u64) / 2) as u32,
            ((self.y1 as u64 + self.y2 as u64) / 2) as u32,
        )
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Checks the box against a `width` x `height` frame.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.x1 < self.x2 && self.x2 <= width && self.y1 < self.y2 && self.y2 <= height
    }

    /// Clips the box to the frame; `None` if nothing non-empty remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let clamped = Self {
            x1: self.x1.min(width),
            y1: self.y1.min(height),
            x2: self.x2.min(width),
            y2: self.y2.min(height),
        };
        clamped.is_within(width, height).then_some(clamped)
    }
}

/// A single detection returned by the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Display names for class ids.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Name of `class_id`, or `class_<id>` when unknown.
    pub fn name(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
