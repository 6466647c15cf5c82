pub mod model_mediapipe;

use anyhow::Result;
use image::DynamicImage;
use nalgebra::Point2;

/// One detected hand in normalized image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHand {
    // 21 points, x and y in [0, 1] relative to the full frame
    pub points: Vec<Point2<f32>>,
    pub presence: f32,
}

// define the HandLandmarksModel trait
pub trait HandLandmarksModel {
    /// Returns the hand visible in `image`, or `None` if there is none.
    fn run(&mut self, image: &DynamicImage) -> Result<Option<NormalizedHand>>;
}
