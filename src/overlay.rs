use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::landmarks::{HandLandmark, LandmarkFrame, HAND_CONNECTIONS};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

// landmarks the scroll gesture reads, drawn as filled dots
const HIGHLIGHTED: [HandLandmark; 3] = [
    HandLandmark::IndexTip,
    HandLandmark::MiddleTip,
    HandLandmark::IndexMcp,
];
const HIGHLIGHT_RADIUS: i32 = 6;

/// Margin in pixels between the outermost landmarks and the hand box.
pub const HAND_BOX_SPACING: i32 = 30;

/// Padded bounding box around a detected hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandBox {
    pub min: (i32, i32),
    pub max: (i32, i32),
}

impl HandBox {
    /// Returns `None` for an empty frame, or when every landmark sits on the
    /// left or top edge of the image.
    pub fn from_frame(frame: &LandmarkFrame, spacing: i32) -> Option<Self> {
        let points = frame.points();
        let max_x = points.iter().map(|p| p.x).max()?;
        let max_y = points.iter().map(|p| p.y).max()?;
        let min_x = points.iter().map(|p| p.x).min()?;
        let min_y = points.iter().map(|p| p.y).min()?;

        if max_x == 0 || max_y == 0 {
            return None;
        }

        Some(HandBox {
            min: (min_x - spacing, min_y - spacing),
            max: (max_x + spacing, max_y + spacing),
        })
    }

    pub fn width(&self) -> i32 {
        self.max.0 - self.min.0
    }

    pub fn height(&self) -> i32 {
        self.max.1 - self.min.1
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }
}

/// Draws the hand skeleton, the gesture landmarks and the hand box onto `image`.
pub fn draw_hand(image: &mut RgbImage, frame: &LandmarkFrame, pinching: bool) {
    if frame.is_empty() {
        return;
    }

    for &(a, b) in HAND_CONNECTIONS.iter() {
        if let (Some(a), Some(b)) = (frame.get_index(a), frame.get_index(b)) {
            draw_line_segment_mut(
                image,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                WHITE,
            );
        }
    }

    for p in frame.points() {
        draw_cross_mut(image, RED, p.x, p.y);
    }

    for landmark in HIGHLIGHTED {
        if let Some(p) = frame.get(landmark) {
            draw_filled_circle_mut(image, (p.x, p.y), HIGHLIGHT_RADIUS, GREEN);
        }
    }

    if let Some(hand_box) = HandBox::from_frame(frame, HAND_BOX_SPACING) {
        let color = if pinching { RED } else { GREEN };
        let rect = Rect::at(hand_box.min.0, hand_box.min.1)
            .of_size(hand_box.width().max(1) as u32, hand_box.height().max(1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkPoint;

    #[test]
    fn hand_box_is_padded() {
        let frame = LandmarkFrame::from_points(vec![
            LandmarkPoint::new(0, 100, 200),
            LandmarkPoint::new(8, 150, 120),
            LandmarkPoint::new(12, 180, 260),
        ]);

        let hand_box = HandBox::from_frame(&frame, 30).unwrap();
        assert_eq!(hand_box.min, (70, 90));
        assert_eq!(hand_box.max, (210, 290));
        assert_eq!(hand_box.area(), 140 * 200);
    }

    #[test]
    fn no_box_without_a_hand() {
        assert!(HandBox::from_frame(&LandmarkFrame::empty(), 30).is_none());

        let on_edge = LandmarkFrame::from_points(vec![LandmarkPoint::new(0, 0, 40)]);
        assert!(HandBox::from_frame(&on_edge, 30).is_none());
    }

    #[test]
    fn drawing_marks_the_gesture_landmarks() {
        let mut image = RgbImage::new(64, 64);
        let frame = LandmarkFrame::from_points(vec![
            LandmarkPoint::new(5, 10, 40),
            LandmarkPoint::new(8, 10, 10),
            LandmarkPoint::new(12, 30, 10),
        ]);

        draw_hand(&mut image, &frame, false);
        assert_eq!(*image.get_pixel(10, 10), GREEN);
        assert_eq!(*image.get_pixel(30, 10), GREEN);
    }

    #[test]
    fn drawing_off_image_does_not_panic() {
        let mut image = RgbImage::new(16, 16);
        let frame = LandmarkFrame::from_points(vec![
            LandmarkPoint::new(8, -40, 500),
            LandmarkPoint::new(12, 900, -3),
        ]);
        draw_hand(&mut image, &frame, true);
    }
}
