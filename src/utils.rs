use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use image::RgbImage;
use ort::{Environment, ExecutionProvider};

use crate::landmarks::LandmarkFrame;

// make SharedState an alias for a Mutex protected struct State
pub type SharedState = Arc<Mutex<State>>;

/// Data the tracker thread publishes for the UI.
#[derive(Default)]
pub struct State {
    pub fps: Option<f32>,
    pub resolution: Option<(u32, u32)>,
    pub camera_name: Option<String>,
    // latest mirrored frame with the hand overlay, only kept while the video is shown
    pub image: Option<RgbImage>,
    pub landmarks: Option<LandmarkFrame>,
    pub pinching: bool,
    pub last_scroll: Option<i32>,
}

pub fn lock_state(state: &SharedState) -> MutexGuard<'_, State> {
    // a panic on the other thread must not take the UI down with it
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rolling mean of the most recent frame rates.
#[derive(Debug, Clone)]
pub struct FrameRate {
    data: VecDeque<f32>,
    max_length: usize,
}

impl FrameRate {
    pub fn new(max_length: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(max_length),
            max_length: max_length.max(1),
        }
    }

    pub fn push(&mut self, frame_delta: Duration) {
        let seconds = frame_delta.as_secs_f32();
        if seconds <= 0.0 {
            return;
        }

        self.data.push_back(1.0 / seconds);
        if self.data.len() > self.max_length {
            self.data.pop_front();
        }
    }

    pub fn get_mean(&self) -> Option<f32> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f32>() / self.data.len() as f32)
    }
}

/// The ONNX Runtime environment shared by the palm and landmark models.
pub fn onnx_environment() -> Result<Arc<Environment>> {
    let environment = Environment::builder()
        .with_name("handscroll")
        .with_execution_providers([ExecutionProvider::CPU(Default::default())])
        .build()?
        .into_arc();
    Ok(environment)
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Blocks until a line (an empty one counts) arrives on `input`.
///
/// Returns `false` if the input is already closed, as it is for a service or
/// a shell redirect from `/dev/null`.
pub fn wait_for_line<R: BufRead>(mut input: R) -> io::Result<bool> {
    let mut line = String::new();
    Ok(input.read_line(&mut line)? > 0)
}
