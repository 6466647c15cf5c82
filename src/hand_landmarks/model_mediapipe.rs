use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use log::{debug, info};
use nalgebra::{Point2, Vector2};
use ndarray::{Array, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};
use rayon::prelude::*;

use crate::hand_landmarks::{HandLandmarksModel, NormalizedHand};
use crate::landmarks::HAND_LANDMARK_COUNT;
use crate::palm_detection::{PalmDetection, PalmDetectionModel};
use crate::utils::sigmoid;

// the landmark model takes a 224x224 RGB crop
const INPUT_SIZE: u32 = 224;
// padding added around the last hand when cropping the next frame, relative to the hand size
const ROI_PADDING: f32 = 0.25;
const MIN_ROI_SIZE: u32 = 64;
// a palm box becomes a hand box by moving half its height toward the fingers
// and growing it to 2.6 times its longer side
const PALM_SHIFT: f32 = 0.5;
const PALM_SCALE: f32 = 2.6;

/// Square region of the frame the model looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl Roi {
    /// The largest centered square of a `width` x `height` frame.
    pub fn centered_square(width: u32, height: u32) -> Self {
        let size = width.min(height);
        Roi {
            x: (width - size) / 2,
            y: (height - size) / 2,
            size,
        }
    }

    /// A padded square around `points` (in pixels), kept inside the frame.
    pub fn around(points: &[Point2<f32>], padding: f32, width: u32, height: u32) -> Self {
        let mut x_min = f32::MAX;
        let mut y_min = f32::MAX;
        let mut x_max = f32::MIN;
        let mut y_max = f32::MIN;

        for p in points {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }

        if points.is_empty() {
            return Self::centered_square(width, height);
        }

        let side = (x_max - x_min).max(y_max - y_min) * (1.0 + 2.0 * padding);
        let center = Point2::new((x_min + x_max) / 2.0, (y_min + y_max) / 2.0);
        Self::square_at(center, side, width, height)
    }

    /// The hand region for a detected palm.
    ///
    /// The crop is not rotated, so a tilted hand gets a square large enough
    /// to hold it upright.
    pub fn from_palm(palm: &PalmDetection, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let box_width = palm.width * w;
        let box_height = palm.height * h;

        // wrist to middle knuckle points at the fingers, straight up when unknown
        let up = Vector2::new(0.0, -1.0);
        let toward_fingers = match (palm.wrist(), palm.middle_knuckle()) {
            (Some(wrist), Some(knuckle)) => {
                let d = Vector2::new((knuckle.x - wrist.x) * w, (knuckle.y - wrist.y) * h);
                let length = d.norm();
                if length > 0.0 {
                    d / length
                } else {
                    up
                }
            }
            _ => up,
        };

        let center = Point2::new(palm.center.x * w, palm.center.y * h)
            + toward_fingers * (box_height * PALM_SHIFT);
        let side = box_width.max(box_height) * PALM_SCALE;
        Self::square_at(center, side, width, height)
    }

    // square of `side` pixels around `center`, moved and shrunk to fit the frame
    fn square_at(center: Point2<f32>, side: f32, width: u32, height: u32) -> Self {
        let limit = width.min(height);
        let size = (side.round().max(0.0) as u32).max(MIN_ROI_SIZE).min(limit);
        let half = size as f32 / 2.0;

        let x = (center.x - half).max(0.0) as u32;
        let y = (center.y - half).max(0.0) as u32;

        Roi {
            x: x.min(width - size),
            y: y.min(height - size),
            size,
        }
    }

    /// Maps a point from model input space (0..INPUT_SIZE) to normalized frame coordinates.
    fn to_frame(&self, x: f32, y: f32, width: u32, height: u32) -> Point2<f32> {
        let scale = self.size as f32 / INPUT_SIZE as f32;
        Point2::new(
            (self.x as f32 + x * scale) / width as f32,
            (self.y as f32 + y * scale) / height as f32,
        )
    }
}

/// MediaPipe hand landmark network running on ONNX Runtime.
///
/// The palm detector finds the hand; after that the model follows it by
/// cropping around the previous landmarks, and goes back to the detector once
/// the presence score drops.
pub struct MediapipeHandLandmarksModel<D> {
    session: Session,
    detector: D,
    roi: Option<Roi>,
    min_presence: f32,
}

impl<D: PalmDetectionModel> MediapipeHandLandmarksModel<D> {
    pub fn new(
        environment: &Arc<Environment>,
        model_path: &Path,
        detector: D,
        min_presence: f32,
    ) -> Result<Self> {
        let session = SessionBuilder::new(environment)?
            .with_intra_threads(4)?
            .with_model_from_file(model_path)
            .with_context(|| format!("Failed to load hand model {}", model_path.display()))?;

        info!("Loaded hand landmark model from {}", model_path.display());

        Ok(Self {
            session,
            detector,
            roi: None,
            min_presence,
        })
    }

    fn infer(&self, input: Vec<f32>) -> Result<(Vec<f32>, f32)> {
        let array: CowArray<_, _> =
            Array::from_shape_vec((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3), input)?
                .into_dyn()
                .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;

        let landmarks: OrtOwnedTensor<f32, _> = outputs
            .first()
            .ok_or_else(|| anyhow!("Hand model returned no landmark tensor"))?
            .try_extract()?;
        let landmarks: Vec<f32> = landmarks.view().iter().copied().collect();

        let presence: OrtOwnedTensor<f32, _> = outputs
            .get(1)
            .ok_or_else(|| anyhow!("Hand model returned no presence tensor"))?
            .try_extract()?;
        let presence = presence
            .view()
            .iter()
            .copied()
            .next()
            .map(sigmoid)
            .unwrap_or(0.0);

        Ok((landmarks, presence))
    }
}

impl<D: PalmDetectionModel> HandLandmarksModel for MediapipeHandLandmarksModel<D> {
    fn run(&mut self, image: &DynamicImage) -> Result<Option<NormalizedHand>> {
        let (width, height) = (image.width(), image.height());
        let roi = match self.roi {
            Some(roi) => roi,
            None => match self.detector.run(image)? {
                Some(palm) => {
                    debug!("tracking a new hand (palm score {:.2})", palm.score);
                    Roi::from_palm(&palm, width, height)
                }
                None => return Ok(None),
            },
        };

        let crop = image
            .crop_imm(roi.x, roi.y, roi.size, roi.size)
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();

        let input: Vec<f32> = crop
            .as_raw()
            .par_iter()
            .map(|&p| p as f32 / 255.0)
            .collect();

        let (raw, presence) = self.infer(input)?;

        if presence < self.min_presence || raw.len() < HAND_LANDMARK_COUNT * 3 {
            // lost the hand, the detector has to find it again
            self.roi = None;
            return Ok(None);
        }

        // x, y, z triples in model input pixels
        let points: Vec<Point2<f32>> = raw
            .chunks_exact(3)
            .take(HAND_LANDMARK_COUNT)
            .map(|p| roi.to_frame(p[0], p[1], width, height))
            .collect();

        let pixels: Vec<Point2<f32>> = points
            .iter()
            .map(|p| Point2::new(p.x * width as f32, p.y * height as f32))
            .collect();
        self.roi = Some(Roi::around(&pixels, ROI_PADDING, width, height));

        Ok(Some(NormalizedHand { points, presence }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_square_of_landscape_frame() {
        assert_eq!(
            Roi::centered_square(640, 480),
            Roi {
                x: 80,
                y: 0,
                size: 480
            }
        );
    }

    #[test]
    fn roi_is_padded_and_centered_on_the_hand() {
        let points = [Point2::new(300.0, 200.0), Point2::new(400.0, 260.0)];
        let roi = Roi::around(&points, 0.25, 640, 480);

        // 100px wide hand, 25% padding on each side
        assert_eq!(roi.size, 150);
        assert_eq!(roi.x, 275);
        assert_eq!(roi.y, 155);
    }

    #[test]
    fn roi_stays_inside_the_frame() {
        let points = [Point2::new(620.0, 460.0), Point2::new(639.0, 479.0)];
        let roi = Roi::around(&points, 0.25, 640, 480);

        assert!(roi.x + roi.size <= 640);
        assert!(roi.y + roi.size <= 480);
        assert_eq!(roi.size, MIN_ROI_SIZE);
    }

    #[test]
    fn model_space_maps_back_to_the_frame() {
        let roi = Roi {
            x: 80,
            y: 0,
            size: 448,
        };
        let p = roi.to_frame(112.0, 112.0, 640, 480);
        assert!((p.x - 304.0 / 640.0).abs() < 1e-6);
        assert!((p.y - 224.0 / 480.0).abs() < 1e-6);
    }

    fn palm(center: (f32, f32), size: (f32, f32), wrist: (f32, f32), knuckle: (f32, f32)) -> PalmDetection {
        PalmDetection {
            center: Point2::new(center.0, center.1),
            width: size.0,
            height: size.1,
            keypoints: vec![
                Point2::new(wrist.0, wrist.1),
                Point2::new(0.45, 0.5),
                Point2::new(knuckle.0, knuckle.1),
            ],
            score: 0.9,
        }
    }

    #[test]
    fn upright_palm_grows_toward_the_fingers() {
        // 64x60 px palm box in the middle of a 640x480 frame
        let p = palm((0.5, 0.5), (0.1, 0.125), (0.5, 0.6), (0.5, 0.4));
        let roi = Roi::from_palm(&p, 640, 480);

        // center moves 30 px up to (320, 210), side 64 * 2.6
        assert_eq!(roi.size, 166);
        assert_eq!(roi.x, 237);
        assert_eq!(roi.y, 127);
    }

    #[test]
    fn sideways_palm_shifts_sideways() {
        let upright = palm((0.5, 0.5), (0.1, 0.125), (0.5, 0.6), (0.5, 0.4));
        let pointing_right = palm((0.5, 0.5), (0.1, 0.125), (0.4, 0.5), (0.6, 0.5));

        let a = Roi::from_palm(&upright, 640, 480);
        let b = Roi::from_palm(&pointing_right, 640, 480);

        assert_eq!(a.size, b.size);
        assert!(b.x > a.x);
        assert!(b.y > a.y);
    }

    #[test]
    fn palm_region_stays_inside_the_frame() {
        let p = palm((0.02, 0.03), (0.3, 0.4), (0.02, 0.2), (0.02, 0.0));
        let roi = Roi::from_palm(&p, 640, 480);

        assert_eq!(roi.size, 480);
        assert_eq!((roi.x, roi.y), (0, 0));
    }
}
