use handscroll::gesture::{
    compute_scroll, evaluate_pinch, GestureConfig, GestureEngine, GestureMode, ScrollDirection,
};
use handscroll::landmarks::{LandmarkFrame, LandmarkPoint};

// index tip, middle tip and index MCP of a hand pinching with the index finger raised
fn raised_pinch() -> LandmarkFrame {
    LandmarkFrame::from_points(vec![
        LandmarkPoint::new(8, 100, 50),
        LandmarkPoint::new(12, 103, 52),
        LandmarkPoint::new(5, 100, 80),
    ])
}

#[test]
fn pinch_with_raised_finger_scrolls_up() {
    let frame = raised_pinch();
    let config = GestureConfig::default();

    assert!(evaluate_pinch(&frame, &config));

    let command = compute_scroll(&frame, &config);
    assert_eq!(command.direction, ScrollDirection::Up);
    assert_eq!(command.magnitude, 100);
    assert_eq!(command.units(), 100);
}

#[test]
fn small_threshold_rejects_the_same_hand() {
    let config = GestureConfig {
        click_threshold: 3,
        ..GestureConfig::default()
    };
    assert!(!evaluate_pinch(&raised_pinch(), &config));
}

#[test]
fn level_finger_scrolls_down() {
    let frame = LandmarkFrame::from_points(vec![
        LandmarkPoint::new(8, 100, 80),
        LandmarkPoint::new(12, 101, 80),
        LandmarkPoint::new(5, 140, 80),
    ]);
    let command = compute_scroll(&frame, &GestureConfig::default());
    assert_eq!(command.direction, ScrollDirection::Down);
    assert_eq!(command.units(), -100);
}

#[test]
fn hand_without_index_base_scrolls_down() {
    // index and middle tips pinched, MCP joint not reported
    let frame = LandmarkFrame::from_points(vec![
        LandmarkPoint::new(8, 100, 50),
        LandmarkPoint::new(12, 103, 52),
    ]);
    let config = GestureConfig::default();

    assert!(evaluate_pinch(&frame, &config));
    let command = compute_scroll(&frame, &config);
    assert_eq!(command.direction, ScrollDirection::Down);
    assert_eq!(command.units(), -100);
}

#[test]
fn hand_without_index_tip_scrolls_down() {
    let frame = LandmarkFrame::from_points(vec![
        LandmarkPoint::new(5, 100, 80),
        LandmarkPoint::new(12, 103, 52),
    ]);
    let config = GestureConfig {
        scroll_speed: 300,
        ..GestureConfig::default()
    };

    let command = compute_scroll(&frame, &config);
    assert_eq!(command.direction, ScrollDirection::Down);
    assert_eq!(command.units(), -300);
}

#[test]
fn no_hand_never_pinches() {
    let empty = LandmarkFrame::empty();
    for mode in GestureMode::ALL {
        let config = GestureConfig {
            mode,
            ..GestureConfig::default()
        };
        assert!(!evaluate_pinch(&empty, &config));
    }
}

#[test]
fn evaluation_is_repeatable() {
    let frame = raised_pinch();
    let config = GestureConfig::default();

    let first = (evaluate_pinch(&frame, &config), compute_scroll(&frame, &config));
    let second = (evaluate_pinch(&frame, &config), compute_scroll(&frame, &config));
    assert_eq!(first, second);
}

#[test]
fn magnitude_follows_the_configured_speed() {
    let frame = raised_pinch();
    for speed in [10, 250, 500] {
        let config = GestureConfig {
            scroll_speed: speed,
            ..GestureConfig::default()
        };
        assert_eq!(compute_scroll(&frame, &config).magnitude, speed);
    }
}

#[test]
fn engine_scrolls_every_pinched_frame() {
    let mut engine = GestureEngine::new();
    let config = GestureConfig::default();
    let frame = raised_pinch();

    for _ in 0..3 {
        let command = engine.process(&frame, &config).unwrap();
        assert_eq!(command.units(), 100);
    }
    assert!(engine.is_pinching());

    assert_eq!(engine.process(&LandmarkFrame::empty(), &config), None);
    assert!(!engine.is_pinching());
}
