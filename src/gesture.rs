//! Pinch detection and scroll decisions.
//!
//! Everything in here is pure per-frame logic: a [`LandmarkFrame`] and a
//! [`GestureConfig`] go in, a pinch flag or a [`ScrollCommand`] comes out.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::landmarks::{HandLandmark, LandmarkFrame, HAND_LANDMARK_COUNT};

pub const DEFAULT_CLICK_THRESHOLD: u32 = 25;
pub const DEFAULT_SCROLL_SPEED: u32 = 100;

/// Slider range offered for the pinch threshold, in pixels.
pub const CLICK_THRESHOLD_RANGE: std::ops::RangeInclusive<u32> = 5..=100;
/// Slider range offered for the scroll speed, in scroll units.
pub const SCROLL_SPEED_RANGE: std::ops::RangeInclusive<u32> = 10..=500;

/// Which two landmarks have to touch for a pinch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureMode {
    /// Index and middle fingertips held together.
    #[default]
    IndexMiddle,
    /// Thumb tip against the index PIP joint.
    ThumbIndex,
    MiddleThumb,
    IndexThumb,
}

// indexed by `GestureMode as usize`
const MODE_PAIRS: [(HandLandmark, HandLandmark); 4] = [
    (HandLandmark::IndexTip, HandLandmark::MiddleTip),
    (HandLandmark::ThumbTip, HandLandmark::IndexPip),
    (HandLandmark::MiddleTip, HandLandmark::ThumbTip),
    (HandLandmark::IndexTip, HandLandmark::ThumbTip),
];

const _: () = {
    let mut i = 0;
    while i < MODE_PAIRS.len() {
        assert!(MODE_PAIRS[i].0.index() < HAND_LANDMARK_COUNT);
        assert!(MODE_PAIRS[i].1.index() < HAND_LANDMARK_COUNT);
        i += 1;
    }
};

impl GestureMode {
    pub const ALL: [GestureMode; 4] = [
        GestureMode::IndexMiddle,
        GestureMode::ThumbIndex,
        GestureMode::MiddleThumb,
        GestureMode::IndexThumb,
    ];

    pub fn landmarks(self) -> (HandLandmark, HandLandmark) {
        MODE_PAIRS[self as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            GestureMode::IndexMiddle => "INDEX_MIDDLE",
            GestureMode::ThumbIndex => "THUMB_INDEX",
            GestureMode::MiddleThumb => "MIDDLE_THUMB",
            GestureMode::IndexThumb => "INDEX_THUMB",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for GestureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GestureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownMode(s.trim().to_string()))
    }
}

/// Tunables read once per frame by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub click_threshold: u32,
    pub scroll_speed: u32,
    pub mode: GestureMode,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            click_threshold: DEFAULT_CLICK_THRESHOLD,
            scroll_speed: DEFAULT_SCROLL_SPEED,
            mode: GestureMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    pub fn sign(self) -> i32 {
        match self {
            ScrollDirection::Up => 1,
            ScrollDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollCommand {
    pub direction: ScrollDirection,
    pub magnitude: u32,
}

impl ScrollCommand {
    /// Signed scroll units, positive scrolls up.
    pub fn units(&self) -> i32 {
        let magnitude = self.magnitude.min(i32::MAX as u32) as i32;
        self.direction.sign() * magnitude
    }
}

/// Pixel distance between the two landmarks selected by `mode`, if both are present.
pub fn pinch_distance(frame: &LandmarkFrame, mode: GestureMode) -> Option<f64> {
    let (a, b) = mode.landmarks();
    let a = frame.get(a)?;
    let b = frame.get(b)?;
    Some(a.distance(b))
}

/// True when the mode's landmark pair is strictly closer than the click threshold.
///
/// A frame without a hand is never a pinch.
pub fn evaluate_pinch(frame: &LandmarkFrame, config: &GestureConfig) -> bool {
    match pinch_distance(frame, config.mode) {
        Some(distance) => distance < config.click_threshold as f64,
        None => false,
    }
}

/// Scroll up while the index fingertip is above its MCP joint, down otherwise.
///
/// Callers check [`evaluate_pinch`] first; the pinch is not re-validated here.
pub fn compute_scroll(frame: &LandmarkFrame, config: &GestureConfig) -> ScrollCommand {
    let tip = frame.get(HandLandmark::IndexTip).map(|p| p.y);
    let base = frame.get(HandLandmark::IndexMcp).map(|p| p.y);

    // image y grows downwards, a raised finger has the smaller y
    let direction = match (tip, base) {
        (Some(tip_y), Some(base_y)) if tip_y < base_y => ScrollDirection::Up,
        _ => ScrollDirection::Down,
    };

    ScrollCommand {
        direction,
        magnitude: config.scroll_speed,
    }
}

/// Rate limiter for discrete click-style actions.
#[derive(Debug, Clone)]
pub struct Debounce {
    time_last_action: Option<Instant>,
    timeout: Duration,
}

impl Debounce {
    pub fn new(timeout: Duration) -> Self {
        Self {
            time_last_action: None,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn time_last_action(&self) -> Option<Instant> {
        self.time_last_action
    }

    /// Accepts the action if more than `timeout` has passed since the last accepted one.
    pub fn try_accept_action(&mut self, now: Instant) -> bool {
        let accept = match self.time_last_action {
            Some(last) => now.saturating_duration_since(last) > self.timeout,
            None => true,
        };
        if accept {
            self.time_last_action = Some(now);
        }
        accept
    }
}

pub fn try_accept_action(now: Instant, state: &mut Debounce) -> bool {
    state.try_accept_action(now)
}

/// Per-frame driver used by the tracker loop.
///
/// Continuous scrolling is not debounced: every pinched frame yields a command.
#[derive(Debug, Default)]
pub struct GestureEngine {
    was_pinching: bool,
}

impl GestureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pinching(&self) -> bool {
        self.was_pinching
    }

    /// Forgets the pinch state, used while scrolling is switched off.
    pub fn reset(&mut self) {
        if self.was_pinching {
            debug!("pinch released");
        }
        self.was_pinching = false;
    }

    pub fn process(&mut self, frame: &LandmarkFrame, config: &GestureConfig) -> Option<ScrollCommand> {
        let pinching = evaluate_pinch(frame, config);

        if pinching != self.was_pinching {
            if pinching {
                debug!("pinch started ({})", config.mode);
            } else {
                debug!("pinch released");
            }
            self.was_pinching = pinching;
        }

        if pinching {
            Some(compute_scroll(frame, config))
        } else {
            None
        }
    }
}
