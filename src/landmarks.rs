use nalgebra::Point2;

/// Number of keypoints the MediaPipe hand model reports per hand.
pub const HAND_LANDMARK_COUNT: usize = 21;

// pairs of landmark indices that make up the hand skeleton
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// The hand keypoints the gesture engine reads, named after their MediaPipe index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexTip,
    MiddleTip,
}

impl HandLandmark {
    pub const fn index(self) -> usize {
        match self {
            HandLandmark::ThumbTip => 4,
            HandLandmark::IndexMcp => 5,
            HandLandmark::IndexPip => 6,
            HandLandmark::IndexTip => 8,
            HandLandmark::MiddleTip => 12,
        }
    }
}

/// A single keypoint in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkPoint {
    pub index: usize,
    pub x: i32,
    pub y: i32,
}

impl LandmarkPoint {
    pub fn new(index: usize, x: i32, y: i32) -> Self {
        Self { index, x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance(&self, other: &LandmarkPoint) -> f64 {
        let dx = (other.x as i64 - self.x as i64) as f64;
        let dy = (other.y as i64 - self.y as i64) as f64;
        dx.hypot(dy)
    }
}

/// The keypoints of one detected hand for a single video frame.
///
/// An empty frame means no hand was detected. Frames are built once per
/// captured image and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    points: Vec<LandmarkPoint>,
}

impl LandmarkFrame {
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<LandmarkPoint>) -> Self {
        Self { points }
    }

    /// Converts normalized `[0, 1]` model output into pixel coordinates of a
    /// `width` x `height` frame. Coordinates are truncated, not rounded.
    pub fn from_normalized(points: &[Point2<f32>], width: u32, height: u32) -> Self {
        let points = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                LandmarkPoint::new(i, (p.x * width as f32) as i32, (p.y * height as f32) as i32)
            })
            .collect();

        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    pub fn get_index(&self, index: usize) -> Option<&LandmarkPoint> {
        // frames coming from the model are stored in index order
        match self.points.get(index) {
            Some(p) if p.index == index => Some(p),
            _ => self.points.iter().find(|p| p.index == index),
        }
    }

    pub fn get(&self, landmark: HandLandmark) -> Option<&LandmarkPoint> {
        self.get_index(landmark.index())
    }
}
