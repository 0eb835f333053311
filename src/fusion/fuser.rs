//! Depth sampling for detections.

use serde::{Deserialize, Serialize};

use crate::capture::DepthFrame;
use crate::detection::Detection;

/// How depth is sampled for a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Single sample at the box center.
    #[default]
    CenterPoint,
    /// Median of the valid samples in a `(2 * radius + 1)` square window
    /// around the box center. More robust near depth-shadow edges.
    PatchMedian { radius: u32 },
}

/// A detection with its measured distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedDetection {
    pub detection: Detection,
    /// Representative pixel the depth was sampled at.
    pub center: (u32, u32),
    /// Distance in meters; `None` when the sensor had no valid return.
    pub distance_m: Option<f32>,
    /// Camera-space point at `center`, in meters.
    pub position_m: Option<[f32; 3]>,
}

impl FusedDetection {
    pub fn has_distance(&self) -> bool {
        self.distance_m.is_some()
    }
}

/// Converts detections into fused detections using an aligned depth frame.
#[derive(Debug, Clone, Default)]
pub struct DepthFuser {
    policy: SamplingPolicy,
}

impl DepthFuser {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// Fuses every detection with `depth`, preserving order.
    ///
    /// Boxes reaching past the frame are clipped to it; boxes with no area
    /// inside the frame are dropped.
    pub fn fuse(&self, detections: &[Detection], depth: &DepthFrame) -> Vec<FusedDetection> {
        detections
            .iter()
            .filter_map(|detection| {
                let Some(bbox) = detection.bbox.clamp_to(depth.width(), depth.height()) else {
                    tracing::debug!(bbox = ?detection.bbox, "Dropping detection outside depth frame");
                    return None;
                };
                let center = bbox.center();
                let distance_m = self.sample(depth, center);
                let position_m = distance_m.map(|d| {
                    depth
                        .intrinsics()
                        .deproject(center.0 as f32, center.1 as f32, d)
                        .to_array()
                });

                Some(FusedDetection {
                    detection: Detection { bbox, ..*detection },
                    center,
                    distance_m,
                    position_m,
                })
            })
            .collect()
    }

    fn sample(&self, depth: &DepthFrame, (cx, cy): (u32, u32)) -> Option<f32> {
        match self.policy {
            SamplingPolicy::CenterPoint => valid(depth.distance_at(cx, cy)),
            SamplingPolicy::PatchMedian { radius } => patch_median(depth, cx, cy, radius),
        }
    }
}

#[inline]
fn valid(distance: f32) -> Option<f32> {
    (distance > 0.0).then_some(distance)
}

fn patch_median(depth: &DepthFrame, cx: u32, cy: u32, radius: u32) -> Option<f32> {
    let x_end = cx.saturating_add(radius).min(depth.width().saturating_sub(1));
    let y_end = cy.saturating_add(radius).min(depth.height().saturating_sub(1));

    let mut samples: Vec<u16> = (cy.saturating_sub(radius)..=y_end)
        .flat_map(|y| (cx.saturating_sub(radius)..=x_end).map(move |x| (x, y)))
        .map(|(x, y)| depth.raw_at(x, y))
        .filter(|&raw| raw > 0)
        .collect();
    if samples.is_empty() {
        return None;
    }

    // Lower median keeps the result an actual measurement.
    let mid = (samples.len() - 1) / 2;
    let (_, median, _) = samples.select_nth_unstable(mid);
    valid(*median as f32 * depth.depth_scale())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Intrinsics;
    use crate::detection::BoundingBox;
    use proptest::prelude::*;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;

    fn depth_with(points: &[((u32, u32), u16)]) -> DepthFrame {
        let mut samples = vec![0u16; (WIDTH * HEIGHT) as usize];
        for &((x, y), raw) in points {
            samples[(y * WIDTH + x) as usize] = raw;
        }
        let intrinsics = Intrinsics::new(WIDTH, HEIGHT, 600.0, 600.0, 319.5, 239.5);
        DepthFrame::new(samples, 0.001, intrinsics, 1)
    }

    fn detection(x1: u32, y1: u32, x2: u32, y2: u32) -> Detection {
        Detection::new(BoundingBox::new(x1, y1, x2, y2), 0, 0.9)
    }

    #[test]
    fn test_center_sample_distance() {
        let depth = depth_with(&[((150, 150), 1250)]);
        let fused = DepthFuser::default().fuse(&[detection(100, 100, 200, 200)], &depth);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].center, (150, 150));
        assert!((fused[0].distance_m.unwrap() - 1.25).abs() < 1e-4);
        let position = fused[0].position_m.unwrap();
        assert!((position[2] - 1.25).abs() < 1e-4);
        assert!(position[0] < 0.0 && position[1] < 0.0);
    }

    #[test]
    fn test_zero_depth_is_absent() {
        let depth = depth_with(&[]);
        let fused = DepthFuser::default().fuse(&[detection(100, 100, 200, 200)], &depth);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].distance_m, None);
        assert_eq!(fused[0].position_m, None);
        assert!(!fused[0].has_distance());
    }

    #[test]
    fn test_order_preserved_and_out_of_frame_dropped() {
        let depth = depth_with(&[((15, 15), 900), ((605, 455), 3000)]);
        let fused = DepthFuser::default().fuse(
            &[
                detection(10, 10, 20, 20),
                detection(700, 10, 720, 20),
                detection(600, 450, 650, 500),
            ],
            &depth,
        );

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].center, (15, 15));
        // Clipped to (600, 450, 640, 480).
        assert_eq!(fused[1].detection.bbox, BoundingBox::new(600, 450, 640, 480));
        assert_eq!(fused[1].center, (620, 465));
        assert_eq!(fused[1].distance_m, None);
    }

    #[test]
    fn test_patch_median_ignores_holes_and_outliers() {
        let depth = depth_with(&[
            ((149, 149), 1000),
            ((150, 149), 1010),
            ((151, 149), 5000),
            ((149, 150), 990),
            ((151, 151), 1005),
        ]);
        let fuser = DepthFuser::new(SamplingPolicy::PatchMedian { radius: 1 });
        let fused = fuser.fuse(&[detection(100, 100, 200, 200)], &depth);

        // Center (150, 150) itself is a hole; valid samples 990, 1000, 1005, 1010, 5000.
        assert!((fused[0].distance_m.unwrap() - 1.005).abs() < 1e-4);
    }

    #[test]
    fn test_patch_median_clipped_at_corner() {
        let depth = depth_with(&[((0, 0), 700)]);
        let fuser = DepthFuser::new(SamplingPolicy::PatchMedian { radius: 3 });
        let fused = fuser.fuse(&[detection(0, 0, 2, 2)], &depth);
        assert!((fused[0].distance_m.unwrap() - 0.7).abs() < 1e-4);
    }

    #[test]
    fn test_patch_median_without_samples() {
        let fuser = DepthFuser::new(SamplingPolicy::PatchMedian { radius: 2 });
        let fused = fuser.fuse(&[detection(5, 5, 9, 9)], &depth_with(&[]));
        assert_eq!(fused[0].distance_m, None);
    }

    proptest! {
        #[test]
        fn prop_center_is_deterministic(
            x1 in 0u32..639, y1 in 0u32..479, w in 1u32..640, h in 1u32..480
        ) {
            let bbox = BoundingBox::new(x1, y1, (x1 + w).min(WIDTH), (y1 + h).min(HEIGHT));
            let first = bbox.center();
            for _ in 0..3 {
                prop_assert_eq!(bbox.center(), first);
            }
            prop_assert!(first.0 >= bbox.x1 && first.0 < bbox.x2);
            prop_assert!(first.1 >= bbox.y1 && first.1 < bbox.y2);
        }

        #[test]
        fn prop_invalid_depth_never_reported_as_zero(
            x1 in 0u32..600, y1 in 0u32..440, w in 1u32..40, h in 1u32..40, raw in 0u16..4
        ) {
            let bbox = BoundingBox::new(x1, y1, x1 + w, y1 + h);
            let depth = depth_with(&[(bbox.center(), raw)]);
            let fused = DepthFuser::default().fuse(&[Detection::new(bbox, 0, 0.5)], &depth);

            prop_assert_eq!(fused.len(), 1);
            match fused[0].distance_m {
                Some(d) => {
                    prop_assert!(raw > 0);
                    prop_assert!(d > 0.0);
                }
                None => prop_assert_eq!(raw, 0),
            }
        }
    }
}
