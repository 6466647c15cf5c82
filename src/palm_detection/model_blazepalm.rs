use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use log::{debug, info};
use nalgebra::Point2;
use ndarray::{Array, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, Session, SessionBuilder, Value};
use rayon::prelude::*;

use crate::palm_detection::{PalmDetection, PalmDetectionModel, PALM_KEYPOINT_COUNT};
use crate::utils::sigmoid;

// the detector takes the whole frame letterboxed into a 192x192 RGB square
const INPUT_SIZE: u32 = 192;
// box center, size, then the keypoints, per anchor
const BOX_VALUES: usize = 4 + 2 * PALM_KEYPOINT_COUNT;
// SSD feature map strides, layers with the same stride share one grid
const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const RAW_SCORE_LIMIT: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

/// SSD anchor centers for a square input, in normalized input coordinates.
///
/// Anchors have a fixed unit size, so only their centers are kept.
pub fn generate_anchors(input_size: u32, strides: &[u32]) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let mut layer = 0;

    while layer < strides.len() {
        let stride = strides[layer];
        let mut per_cell = 0;
        while layer < strides.len() && strides[layer] == stride {
            per_cell += ANCHORS_PER_LAYER;
            layer += 1;
        }

        let grid = (input_size + stride - 1) / stride;
        for y in 0..grid {
            for x in 0..grid {
                let anchor = Anchor {
                    x: (x as f32 + 0.5) / grid as f32,
                    y: (y as f32 + 0.5) / grid as f32,
                };
                anchors.extend(std::iter::repeat(anchor).take(per_cell));
            }
        }
    }

    anchors
}

/// Placement of a frame scaled into the square model input, aspect ratio kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub size: u32,
    pub resized: (u32, u32),
    pub offset: (u32, u32),
}

impl Letterbox {
    pub fn new(width: u32, height: u32, size: u32) -> Self {
        let scale = size as f32 / width.max(height).max(1) as f32;
        let resized_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let resized_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        Letterbox {
            size,
            resized: (resized_width, resized_height),
            offset: ((size - resized_width) / 2, (size - resized_height) / 2),
        }
    }

    fn apply(&self, image: &DynamicImage) -> RgbImage {
        let resized = image
            .resize_exact(self.resized.0, self.resized.1, FilterType::Triangle)
            .to_rgb8();
        let mut canvas = RgbImage::new(self.size, self.size);
        imageops::replace(
            &mut canvas,
            &resized,
            self.offset.0 as i64,
            self.offset.1 as i64,
        );
        canvas
    }

    /// Maps a normalized input point to normalized frame coordinates.
    pub fn to_frame(&self, p: Point2<f32>) -> Point2<f32> {
        let size = self.size as f32;
        Point2::new(
            (p.x * size - self.offset.0 as f32) / self.resized.0 as f32,
            (p.y * size - self.offset.1 as f32) / self.resized.1 as f32,
        )
    }

    fn palm_to_frame(&self, palm: PalmDetection) -> PalmDetection {
        let size = self.size as f32;
        PalmDetection {
            center: self.to_frame(palm.center),
            width: palm.width * size / self.resized.0 as f32,
            height: palm.height * size / self.resized.1 as f32,
            keypoints: palm.keypoints.into_iter().map(|p| self.to_frame(p)).collect(),
            score: palm.score,
        }
    }
}

/// Decodes one anchor's regressor values into a palm in normalized input coordinates.
pub fn decode_palm(raw: &[f32], anchor: &Anchor, score: f32) -> PalmDetection {
    let scale = INPUT_SIZE as f32;

    let keypoints = (0..PALM_KEYPOINT_COUNT)
        .map(|k| {
            let offset = 4 + k * 2;
            Point2::new(
                raw[offset] / scale + anchor.x,
                raw[offset + 1] / scale + anchor.y,
            )
        })
        .collect();

    PalmDetection {
        center: Point2::new(raw[0] / scale + anchor.x, raw[1] / scale + anchor.y),
        width: raw[2] / scale,
        height: raw[3] / scale,
        keypoints,
        score,
    }
}

/// MediaPipe BlazePalm detector running on ONNX Runtime.
///
/// Only the best scoring anchor is kept, one hand is tracked at a time.
pub struct BlazePalmModel {
    session: Session,
    anchors: Vec<Anchor>,
    min_detection: f32,
}

impl BlazePalmModel {
    pub fn new(environment: &Arc<Environment>, model_path: &Path, min_detection: f32) -> Result<Self> {
        let session = SessionBuilder::new(environment)?
            .with_intra_threads(4)?
            .with_model_from_file(model_path)
            .with_context(|| format!("Failed to load palm model {}", model_path.display()))?;

        info!("Loaded palm detection model from {}", model_path.display());

        Ok(Self {
            session,
            anchors: generate_anchors(INPUT_SIZE, &STRIDES),
            min_detection,
        })
    }

    // returns the regressors and the raw scores
    fn infer(&self, input: Vec<f32>) -> Result<(Vec<f32>, Vec<f32>)> {
        let array: CowArray<_, _> =
            Array::from_shape_vec((1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3), input)?
                .into_dyn()
                .into();

        let inputs = vec![Value::from_array(self.session.allocator(), &array)?];
        let outputs: Vec<Value> = self.session.run(inputs)?;

        // the two heads are told apart by size, exports disagree on their order
        let count = self.anchors.len();
        let mut regressors = None;
        let mut scores = None;
        for output in &outputs {
            let tensor: OrtOwnedTensor<f32, _> = output.try_extract()?;
            let values: Vec<f32> = tensor.view().iter().copied().collect();
            if values.len() == count * BOX_VALUES {
                regressors = Some(values);
            } else if values.len() == count {
                scores = Some(values);
            }
        }

        let regressors =
            regressors.ok_or_else(|| anyhow!("Palm model returned no box tensor for {} anchors", count))?;
        let scores =
            scores.ok_or_else(|| anyhow!("Palm model returned no score tensor for {} anchors", count))?;
        Ok((regressors, scores))
    }
}

impl PalmDetectionModel for BlazePalmModel {
    fn run(&self, image: &DynamicImage) -> Result<Option<PalmDetection>> {
        if image.width() == 0 || image.height() == 0 {
            bail!("Empty frame");
        }

        let letterbox = Letterbox::new(image.width(), image.height(), INPUT_SIZE);
        let canvas = letterbox.apply(image);

        let input: Vec<f32> = canvas
            .as_raw()
            .par_iter()
            .map(|&p| p as f32 / 255.0)
            .collect();

        let (regressors, scores) = self.infer(input)?;

        let Some((best, raw_score)) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return Ok(None);
        };

        let score = sigmoid(raw_score.clamp(-RAW_SCORE_LIMIT, RAW_SCORE_LIMIT));
        if score < self.min_detection {
            return Ok(None);
        }

        let raw = &regressors[best * BOX_VALUES..(best + 1) * BOX_VALUES];
        let palm = letterbox.palm_to_frame(decode_palm(raw, &self.anchors[best], score));
        debug!(
            "palm at ({:.2}, {:.2}), score {:.2}",
            palm.center.x, palm.center.y, palm.score
        );

        Ok(Some(palm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_grid_matches_the_detector_head() {
        let anchors = generate_anchors(INPUT_SIZE, &STRIDES);
        // 24x24 cells with 2 anchors, then 12x12 cells with 6
        assert_eq!(anchors.len(), 24 * 24 * 2 + 12 * 12 * 6);

        assert_eq!(anchors[0], Anchor { x: 0.5 / 24.0, y: 0.5 / 24.0 });
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[2], Anchor { x: 1.5 / 24.0, y: 0.5 / 24.0 });

        let coarse = &anchors[24 * 24 * 2..];
        assert!(coarse[..6].iter().all(|a| *a == Anchor { x: 0.5 / 12.0, y: 0.5 / 12.0 }));
        assert_eq!(coarse[6], Anchor { x: 1.5 / 12.0, y: 0.5 / 12.0 });
    }

    #[test]
    fn landscape_frame_is_padded_top_and_bottom() {
        let letterbox = Letterbox::new(640, 480, 192);
        assert_eq!(letterbox.resized, (192, 144));
        assert_eq!(letterbox.offset, (0, 24));

        // the input center is the frame center, the top of the picture is the frame top
        assert_eq!(letterbox.to_frame(Point2::new(0.5, 0.5)), Point2::new(0.5, 0.5));
        assert_eq!(letterbox.to_frame(Point2::new(0.0, 0.125)), Point2::new(0.0, 0.0));
    }

    #[test]
    fn letterbox_keeps_the_picture_inside_the_padding() {
        let frame = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, image::Rgb([255, 255, 255])));
        let letterbox = Letterbox::new(64, 32, 192);
        let canvas = letterbox.apply(&frame);

        assert_eq!(canvas.dimensions(), (192, 192));
        assert_eq!(canvas.get_pixel(96, 10).0, [0, 0, 0]);
        assert_eq!(canvas.get_pixel(96, 96).0, [255, 255, 255]);
    }

    #[test]
    fn regressors_are_offsets_from_the_anchor() {
        let mut raw = vec![0.0; BOX_VALUES];
        raw[0] = 19.2;
        raw[1] = -19.2;
        raw[2] = 48.0;
        raw[3] = 96.0;
        raw[4] = 0.0;
        raw[5] = 38.4;

        let anchor = Anchor { x: 0.5, y: 0.5 };
        let palm = decode_palm(&raw, &anchor, 0.9);

        assert!((palm.center.x - 0.6).abs() < 1e-6);
        assert!((palm.center.y - 0.4).abs() < 1e-6);
        assert_eq!(palm.width, 0.25);
        assert_eq!(palm.height, 0.5);
        assert_eq!(palm.keypoints.len(), PALM_KEYPOINT_COUNT);
        assert!((palm.wrist().unwrap().y - 0.7).abs() < 1e-6);
        assert_eq!(palm.middle_knuckle(), Some(Point2::new(0.5, 0.5)));
    }

    #[test]
    fn palm_size_is_rescaled_to_the_frame() {
        let letterbox = Letterbox::new(640, 480, 192);
        let palm = PalmDetection {
            center: Point2::new(0.5, 0.5),
            width: 0.25,
            height: 0.25,
            keypoints: vec![],
            score: 1.0,
        };
        let palm = letterbox.palm_to_frame(palm);
        assert_eq!(palm.width, 0.25);
        // 48 input pixels out of the 144 that hold the picture
        assert!((palm.height - 1.0 / 3.0).abs() < 1e-6);
    }
}
