//! Error handling tests across modules

use head_pose_capture::{
    app::{Command, FrameIssue, HeadPoseApp},
    capture::CaptureState,
    config::Config,
    script::{PoseScript, PoseSegment},
    snapshot::{encode_rgb, ImageFrameSource, SnapshotFormat},
    synthetic::SyntheticFace,
    Error,
};
use image::RgbImage;
use std::time::Duration;

#[test]
fn test_script_errors() {
    match PoseScript::new(Vec::new()) {
        Err(Error::InvalidInput(msg)) => assert!(msg.contains("no segments")),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }

    match PoseScript::new(vec![PoseSegment::hold(0.0, 0.0, 100), PoseSegment::hold(f64::NAN, 0.0, 100)]) {
        Err(Error::InvalidInput(msg)) => assert!(msg.contains("Segment 1")),
        other => panic!("Expected InvalidInput, got {other:?}"),
    }

    assert!(matches!(PoseScript::from_yaml("- { yaw: fast }"), Err(Error::Yaml(_))));
    assert!(matches!(PoseScript::from_file("/nonexistent/script.yaml"), Err(Error::Io(_))));
}

#[test]
fn test_snapshot_without_frame_keeps_target() {
    let mut app = HeadPoseApp::new(&Config::default()).unwrap();
    app.camera_started();
    app.start_session().unwrap();

    // No image ever pushed
    let mut source = ImageFrameSource::new();
    let face = SyntheticFace::default();
    let mut failures = 0;
    for i in 0..100u64 {
        let report = app.process_frame(&face.frame(0.0, 0.0, 0.0, Duration::from_millis(i * 33)), &mut source);
        if let Some(FrameIssue::CaptureFailed(msg)) = report.issue {
            assert!(msg.contains("No frame available"));
            failures += 1;
        }
    }

    assert_eq!(failures, 1);
    assert_eq!(app.state(), CaptureState::Front);
    assert!(app.captures().is_empty());
}

#[test]
fn test_encode_empty_image() {
    let empty = RgbImage::new(0, 0);
    for format in [SnapshotFormat::Png, SnapshotFormat::Jpeg { quality: 80 }] {
        match encode_rgb(&empty, format) {
            Err(e @ Error::CaptureFailure(_)) => assert!(e.is_recoverable()),
            other => panic!("Expected CaptureFailure, got {other:?}"),
        }
    }
}

#[test]
fn test_invalid_filter_in_config() {
    let mut config = Config::default();
    config.filter.validation = "moving_average:0".to_string();

    match config.validate() {
        Err(Error::ConfigError(msg)) => {
            assert!(msg.contains("Validation filter"));
            assert!(msg.contains("Window size"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }
}

#[test]
fn test_command_after_engine_dropped() {
    let app = HeadPoseApp::new(&Config::default()).unwrap();
    let sender = app.command_sender();
    drop(app);

    match sender.send(Command::StartSession) {
        Err(Error::InvalidState(msg)) => assert!(msg.contains("StartSession")),
        other => panic!("Expected InvalidState, got {other:?}"),
    }
}

#[test]
fn test_error_classification() {
    assert!(Error::PipelineNotReady.is_recoverable());
    assert!(Error::Subscriber("down".into()).is_recoverable());
    assert!(!Error::InvalidState("running".into()).is_recoverable());
    assert!(!Error::FilterError("bad".into()).is_recoverable());
}
