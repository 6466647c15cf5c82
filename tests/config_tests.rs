use std::fs;
use std::path::PathBuf;

use handscroll::args::Args;
use handscroll::config::{LiveConfig, Settings};
use handscroll::gesture::GestureMode;

fn temp_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "handscroll-{}-{}.json",
        name,
        std::process::id()
    ));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_file_gives_defaults() {
    let path = std::env::temp_dir().join("handscroll-does-not-exist.json");
    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let path = temp_config("partial", r#"{ "scroll_speed": 240, "mode": "THUMB_INDEX" }"#);
    let settings = Settings::load(Some(&path)).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(settings.scroll_speed, 240);
    assert_eq!(settings.mode, GestureMode::ThumbIndex);
    assert_eq!(settings.click_threshold, 25);
    assert!(settings.scrolling_enabled);
}

#[test]
fn malformed_file_is_an_error() {
    let path = temp_config("malformed", "{ click_threshold: ");
    let result = Settings::load(Some(&path));
    fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[test]
fn zero_threshold_in_file_is_rejected() {
    let path = temp_config("zero", r#"{ "click_threshold": 0 }"#);
    let result = Settings::load(Some(&path));
    fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[test]
fn command_line_overrides_file() {
    let path = temp_config(
        "overrides",
        r#"{ "camera_index": 1, "click_threshold": 30, "scroll_speed": 180, "mode": "MIDDLE_THUMB" }"#,
    );
    let from_file = Settings::load(Some(&path)).unwrap();
    fs::remove_file(&path).ok();

    let args = Args {
        camera: Some(2),
        threshold: Some(40),
        mode: Some(GestureMode::IndexThumb),
        ..Args::default()
    };
    let settings = from_file.apply_args(&args).unwrap();

    assert_eq!(settings.camera_index, 2);
    assert_eq!(settings.click_threshold, 40);
    assert_eq!(settings.mode, GestureMode::IndexThumb);
    // not given on the command line, so the file value stays
    assert_eq!(settings.scroll_speed, 180);
}

#[test]
fn unusable_notch_size_in_file_is_rejected() {
    let path = temp_config("notch", r#"{ "units_per_notch": 0 }"#);
    let result = Settings::load(Some(&path));
    fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[test]
fn out_of_range_presence_in_file_is_rejected() {
    let path = temp_config("presence", r#"{ "min_presence": 1.5 }"#);
    let result = Settings::load(Some(&path));
    fs::remove_file(&path).ok();

    assert!(result.is_err());
}

#[test]
fn live_config_starts_from_settings() {
    let settings = Settings {
        click_threshold: 60,
        scrolling_enabled: false,
        ..Settings::default()
    };
    let live = LiveConfig::from_settings(&settings);

    assert_eq!(live.click_threshold(), 60);
    assert!(!live.scrolling_enabled());
    assert!(live.toggle_scrolling());
    assert_eq!(live.snapshot(), settings.gesture_config());
}
