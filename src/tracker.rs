//! The frame loop: capture, detect, decide, scroll, publish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use log::{info, warn};

use crate::config::{Settings, SharedConfig};
use crate::gesture::{GestureEngine, ScrollCommand};
use crate::hand_landmarks::model_mediapipe::MediapipeHandLandmarksModel;
use crate::hand_landmarks::HandLandmarksModel;
use crate::landmarks::LandmarkFrame;
use crate::overlay::draw_hand;
use crate::palm_detection::model_blazepalm::BlazePalmModel;
use crate::scroll::{EnigoScroller, LogScroller, ScrollSink};
use crate::utils::{lock_state, onnx_environment, FrameRate, SharedState};
use crate::webcam::{FrameSource, Webcam};

/// What happened to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame could not be read or processed; nothing was evaluated.
    Skipped,
    /// Scrolling is switched off.
    Disabled,
    NoHand,
    /// A hand was found but it is not pinching.
    Idle,
    Scrolled(ScrollCommand),
}

/// Owns the camera, the landmark model and the scroll sink for the lifetime of the loop.
pub struct Tracker<F, M, S> {
    source: F,
    model: M,
    sink: S,
    engine: GestureEngine,
    config: SharedConfig,
    state: SharedState,
    frame_rate: FrameRate,
    last_frame: Option<Instant>,
}

impl<F, M, S> Tracker<F, M, S>
where
    F: FrameSource,
    M: HandLandmarksModel,
    S: ScrollSink,
{
    pub fn new(source: F, model: M, sink: S, config: SharedConfig, state: SharedState) -> Self {
        {
            let mut guard = lock_state(&state);
            guard.resolution = Some(source.resolution());
            guard.camera_name = Some(source.name().to_string());
        }

        Self {
            source,
            model,
            sink,
            engine: GestureEngine::new(),
            config,
            state,
            frame_rate: FrameRate::new(10),
            last_frame: None,
        }
    }

    /// Processes one frame.
    pub fn step(&mut self) -> FrameOutcome {
        // the UI may change these at any time, read them once per frame
        let gesture_config = self.config.snapshot();
        let enabled = self.config.scrolling_enabled();
        let show_video = self.config.show_video();

        let image = match self.source.read_frame() {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping frame: {:#}", e);
                return FrameOutcome::Skipped;
            }
        };

        // mirror the frame so that moving the hand right moves it right on screen
        let image = image.fliph();
        let (width, height) = (image.width(), image.height());

        // switched off: no detection, no overlay, and no pinch carried over
        if !enabled {
            self.engine.reset();
            self.publish(image, LandmarkFrame::empty(), show_video, FrameOutcome::Disabled);
            return FrameOutcome::Disabled;
        }

        let frame = match self.model.run(&image) {
            Ok(Some(hand)) => LandmarkFrame::from_normalized(&hand.points, width, height),
            Ok(None) => LandmarkFrame::empty(),
            Err(e) => {
                warn!("Hand detection failed: {:#}", e);
                return FrameOutcome::Skipped;
            }
        };

        let outcome = match self.engine.process(&frame, &gesture_config) {
            Some(command) => {
                if let Err(e) = self.sink.scroll(command.units()) {
                    warn!("Scroll failed: {:#}", e);
                }
                FrameOutcome::Scrolled(command)
            }
            None if frame.is_empty() => FrameOutcome::NoHand,
            None => FrameOutcome::Idle,
        };

        self.publish(image, frame, show_video, outcome);
        outcome
    }

    /// Runs until `stop` is set. The flag is checked between frames.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("Tracking on {}", self.source.name());
        while !stop.load(Ordering::Relaxed) {
            self.step();
        }
        info!("Tracking stopped");
    }

    fn publish(&mut self, image: DynamicImage, frame: LandmarkFrame, show_video: bool, outcome: FrameOutcome) {
        let now = Instant::now();
        if let Some(last) = self.last_frame {
            self.frame_rate.push(now - last);
        }
        self.last_frame = Some(now);

        let pinching = matches!(outcome, FrameOutcome::Scrolled(_));

        let preview = if show_video {
            let mut rgb = image.into_rgb8();
            draw_hand(&mut rgb, &frame, pinching);
            Some(rgb)
        } else {
            None
        };

        let mut guard = lock_state(&self.state);
        guard.fps = self.frame_rate.get_mean().map(f32::round);
        guard.image = preview;
        guard.pinching = pinching;
        guard.landmarks = if frame.is_empty() { None } else { Some(frame) };
        if let FrameOutcome::Scrolled(command) = outcome {
            guard.last_scroll = Some(command.units());
        }
    }
}

type LiveTracker =
    Tracker<Webcam, MediapipeHandLandmarksModel<BlazePalmModel>, Box<dyn ScrollSink>>;

fn open_tracker(
    settings: &Settings,
    dry_run: bool,
    config: SharedConfig,
    state: SharedState,
) -> Result<LiveTracker> {
    let webcam = Webcam::open(
        settings.camera_index,
        settings.capture_width,
        settings.capture_height,
    )
    .context("Failed to open camera")?;

    let environment = onnx_environment()?;
    let detector = BlazePalmModel::new(
        &environment,
        &settings.palm_model_path,
        settings.min_detection,
    )?;
    let model = MediapipeHandLandmarksModel::new(
        &environment,
        &settings.model_path,
        detector,
        settings.min_presence,
    )?;

    let sink: Box<dyn ScrollSink> = if dry_run {
        info!("Dry run, scroll events are only logged");
        Box::new(LogScroller)
    } else {
        Box::new(EnigoScroller::new(settings.units_per_notch)?)
    };

    Ok(Tracker::new(webcam, model, sink, config, state))
}

/// Starts the tracker on its own thread.
///
/// Returns only after the camera, model and scroll sink are open, so startup
/// failures reach the caller before any frame is processed. Everything the
/// tracker opened is released when the thread ends.
pub fn spawn(
    settings: Settings,
    dry_run: bool,
    config: SharedConfig,
    state: SharedState,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let (tx, rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name("tracker".to_string())
        .spawn(move || {
            // the capture handles are not Send, so they are opened on this thread
            let mut tracker = match open_tracker(&settings, dry_run, config, state) {
                Ok(tracker) => {
                    let _ = tx.send(Ok(()));
                    tracker
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };
            tracker.run(&stop);
        })
        .context("Failed to spawn tracker thread")?;

    match rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(anyhow!("Tracker thread exited during startup")),
    }
}
