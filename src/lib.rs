pub mod app;
pub mod args;
pub mod config;
pub mod gesture;
pub mod hand_landmarks;
pub mod landmarks;
pub mod overlay;
pub mod palm_detection;
pub mod scroll;
pub mod tracker;
pub mod utils;
pub mod webcam;
