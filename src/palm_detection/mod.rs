pub mod model_blazepalm;

use anyhow::Result;
use image::DynamicImage;
use nalgebra::Point2;

/// Keypoints reported per palm: wrist, palm knuckles and thumb joints.
pub const PALM_KEYPOINT_COUNT: usize = 7;

/// A palm found by the detector, in normalized frame coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PalmDetection {
    pub center: Point2<f32>,
    pub width: f32,
    pub height: f32,
    pub keypoints: Vec<Point2<f32>>,
    pub score: f32,
}

impl PalmDetection {
    pub fn wrist(&self) -> Option<Point2<f32>> {
        self.keypoints.first().copied()
    }

    /// Knuckle of the middle finger.
    pub fn middle_knuckle(&self) -> Option<Point2<f32>> {
        self.keypoints.get(2).copied()
    }
}

/// Finds the most likely palm in a frame. Used to start tracking a hand.
pub trait PalmDetectionModel {
    fn run(&self, image: &DynamicImage) -> Result<Option<PalmDetection>>;
}
