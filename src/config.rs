use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::args::Args;
use crate::gesture::{GestureConfig, GestureMode, DEFAULT_CLICK_THRESHOLD, DEFAULT_SCROLL_SPEED};

/// Rejected configuration input. The previous value stays in effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' is not a whole number")]
    InvalidNumber(String),
    #[error("{name} must be a positive number, got {value}")]
    OutOfRange { name: &'static str, value: i64 },
    #[error("unknown gesture mode '{0}'")]
    UnknownMode(String),
    #[error("{name} must be above 0 and at most 1, got {value}")]
    NotAScore { name: &'static str, value: String },
}

/// Startup settings, read from an optional JSON file and overridden from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub click_threshold: u32,
    pub scroll_speed: u32,
    pub mode: GestureMode,
    pub scrolling_enabled: bool,
    pub show_video: bool,
    pub camera_index: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub model_path: PathBuf,
    pub palm_model_path: PathBuf,
    // minimum palm detector score to start tracking a hand
    pub min_detection: f32,
    // minimum hand presence score to keep tracking it
    pub min_presence: f32,
    pub units_per_notch: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            click_threshold: DEFAULT_CLICK_THRESHOLD,
            scroll_speed: DEFAULT_SCROLL_SPEED,
            mode: GestureMode::default(),
            scrolling_enabled: true,
            show_video: true,
            camera_index: 0,
            capture_width: 640,
            capture_height: 480,
            model_path: PathBuf::from("models/hand_landmark.onnx"),
            palm_model_path: PathBuf::from("models/palm_detection.onnx"),
            min_detection: 0.7,
            min_presence: 0.7,
            units_per_notch: 100,
        }
    }
}

impl Settings {
    pub const DEFAULT_PATH: &'static str = "handscroll.json";

    /// Loads settings from `path`, or from [`Settings::DEFAULT_PATH`] when no path is given.
    ///
    /// A missing file yields the defaults; a file that does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(Self::DEFAULT_PATH));

        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        settings.validated()
    }

    pub fn apply_args(mut self, args: &Args) -> Result<Self> {
        if let Some(index) = args.camera {
            self.camera_index = index;
        }
        if let Some(model) = &args.model {
            self.model_path = model.clone();
        }
        if let Some(model) = &args.palm_model {
            self.palm_model_path = model.clone();
        }
        if let Some(width) = args.width {
            self.capture_width = width;
        }
        if let Some(height) = args.height {
            self.capture_height = height;
        }
        if let Some(threshold) = args.threshold {
            self.click_threshold = threshold;
        }
        if let Some(speed) = args.speed {
            self.scroll_speed = speed;
        }
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        self.validated()
    }

    fn validated(self) -> Result<Self> {
        check_positive("click_threshold", self.click_threshold as i64)?;
        check_positive("scroll_speed", self.scroll_speed as i64)?;
        check_positive("units_per_notch", self.units_per_notch as i64)?;
        check_score("min_detection", self.min_detection)?;
        check_score("min_presence", self.min_presence)?;
        Ok(self)
    }

    pub fn gesture_config(&self) -> GestureConfig {
        GestureConfig {
            click_threshold: self.click_threshold,
            scroll_speed: self.scroll_speed,
            mode: self.mode,
        }
    }
}

fn check_positive(name: &'static str, value: i64) -> Result<u32, ConfigError> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(ConfigError::OutOfRange { name, value });
    }
    Ok(value as u32)
}

fn check_score(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    // also rejects NaN
    if !(value > 0.0 && value <= 1.0) {
        return Err(ConfigError::NotAScore {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_positive(name: &'static str, text: &str) -> Result<u32, ConfigError> {
    let value: i64 = text
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber(text.trim().to_string()))?;
    check_positive(name, value)
}

pub type SharedConfig = Arc<LiveConfig>;

/// Configuration edited by the UI while the tracker is running.
///
/// Every field is an independent atomic, so a reader never sees a half-written
/// value; there is no consistency guarantee across fields.
#[derive(Debug)]
pub struct LiveConfig {
    click_threshold: AtomicU32,
    scroll_speed: AtomicU32,
    mode: AtomicU8,
    scrolling_enabled: AtomicBool,
    show_video: AtomicBool,
}

impl LiveConfig {
    pub fn new(initial: GestureConfig, scrolling_enabled: bool, show_video: bool) -> Self {
        Self {
            click_threshold: AtomicU32::new(initial.click_threshold),
            scroll_speed: AtomicU32::new(initial.scroll_speed),
            mode: AtomicU8::new(initial.mode.to_u8()),
            scrolling_enabled: AtomicBool::new(scrolling_enabled),
            show_video: AtomicBool::new(show_video),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.gesture_config(),
            settings.scrolling_enabled,
            settings.show_video,
        )
    }

    pub fn snapshot(&self) -> GestureConfig {
        GestureConfig {
            click_threshold: self.click_threshold.load(Ordering::Relaxed),
            scroll_speed: self.scroll_speed.load(Ordering::Relaxed),
            mode: self.mode(),
        }
    }

    pub fn click_threshold(&self) -> u32 {
        self.click_threshold.load(Ordering::Relaxed)
    }

    pub fn set_click_threshold(&self, value: u32) -> Result<(), ConfigError> {
        let value = check_positive("click threshold", value as i64)?;
        self.click_threshold.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Applies a threshold typed into a text field.
    pub fn set_click_threshold_entry(&self, text: &str) -> Result<u32, ConfigError> {
        let value = parse_positive("click threshold", text)?;
        self.click_threshold.store(value, Ordering::Relaxed);
        Ok(value)
    }

    pub fn scroll_speed(&self) -> u32 {
        self.scroll_speed.load(Ordering::Relaxed)
    }

    pub fn set_scroll_speed(&self, value: u32) -> Result<(), ConfigError> {
        let value = check_positive("scroll speed", value as i64)?;
        self.scroll_speed.store(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_scroll_speed_entry(&self, text: &str) -> Result<u32, ConfigError> {
        let value = parse_positive("scroll speed", text)?;
        self.scroll_speed.store(value, Ordering::Relaxed);
        Ok(value)
    }

    pub fn mode(&self) -> GestureMode {
        GestureMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: GestureMode) {
        self.mode.store(mode.to_u8(), Ordering::Relaxed);
    }

    pub fn set_mode_name(&self, name: &str) -> Result<GestureMode, ConfigError> {
        let mode: GestureMode = name.parse()?;
        self.set_mode(mode);
        Ok(mode)
    }

    pub fn scrolling_enabled(&self) -> bool {
        self.scrolling_enabled.load(Ordering::Relaxed)
    }

    pub fn set_scrolling_enabled(&self, enabled: bool) {
        self.scrolling_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flips scrolling on or off and returns the new state.
    pub fn toggle_scrolling(&self) -> bool {
        !self.scrolling_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn show_video(&self) -> bool {
        self.show_video.load(Ordering::Relaxed)
    }

    pub fn set_show_video(&self, show: bool) {
        self.show_video.store(show, Ordering::Relaxed);
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::new(GestureConfig::default(), true, true)
    }
}
