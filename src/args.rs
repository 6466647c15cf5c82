use std::path::PathBuf;

use clap::Parser;

use crate::gesture::GestureMode;

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera index (default 0)
    #[arg(short, long)]
    pub camera: Option<u32>,

    /// Path to the hand landmark ONNX model
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Path to the palm detection ONNX model
    #[arg(long)]
    pub palm_model: Option<PathBuf>,

    /// JSON settings file (default handscroll.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Requested capture width
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    pub height: Option<u32>,

    /// Pinch threshold in pixels
    #[arg(short, long)]
    pub threshold: Option<u32>,

    /// Scroll units per pinched frame
    #[arg(short, long)]
    pub speed: Option<u32>,

    /// Gesture mode (INDEX_MIDDLE, THUMB_INDEX, MIDDLE_THUMB, INDEX_THUMB)
    #[arg(short, long)]
    pub mode: Option<GestureMode>,

    /// List available cameras and exit
    #[arg(long)]
    pub list: bool,

    /// Run without a window; press Enter to stop. Without a terminal on stdin
    /// it runs until the process is killed
    #[arg(long)]
    pub headless: bool,

    /// Log scroll events instead of sending them to the OS
    #[arg(long)]
    pub dry_run: bool,
}
