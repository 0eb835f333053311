//! Object detector contract.
//!
//! The pipeline treats the detector as an opaque capability: given a color
//! image and a confidence threshold it returns boxes in color-frame pixel
//! coordinates. Any model backend can sit behind [`Detector`].

mod types;

pub use types::{BoundingBox, ClassLabels, Detection};

use crate::capture::ColorFrame;
use thiserror::Error;

/// Errors reported by a detector backend.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unsupported input: {0}")]
    InvalidInput(String),
    #[error("detector panicked: {0}")]
    Panicked(String),
}

/// Trait for object detection backends.
///
/// Implementations must already have removed detections whose confidence
/// is below `confidence_threshold`. Calls are synchronous and may take tens
/// of milliseconds.
pub trait Detector {
    fn detect(
        &mut self,
        image: &ColorFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectorError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(
        &mut self,
        image: &ColorFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        (**self).detect(image, confidence_threshold)
    }
}

/// Detector returning the same detections for every image.
///
/// Useful as a stand-in for a model when exercising the pipeline.
#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    detections: Vec<Detection>,
}

impl FixedDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Detector for FixedDetector {
    fn detect(
        &mut self,
        image: &ColorFrame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        if !image.is_valid() {
            return Err(DetectorError::InvalidInput(format!(
                "{} bytes for {}x{} image",
                image.pixels().len(),
                image.width(),
                image.height()
            )));
        }
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .copied()
            .collect())
    }
}
