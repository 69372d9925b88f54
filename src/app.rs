//! Frame-driven engine tying estimation, validation, capture and gestures together.
//!
//! [`HeadPoseApp`] owns every piece of mutable session state and is driven
//! by one [`HeadPoseApp::process_frame`] call per camera frame. Other
//! threads talk to it only through a [`CommandSender`]; queued commands
//! take effect at the start of the next processed frame.

use crate::{
    capture::{CaptureOrchestrator, CaptureOutcome, CaptureSet, CaptureSink, CaptureState},
    config::Config,
    event_bus::EventBus,
    filters::{create_filter, AngleFilter},
    gesture::{GestureDetector, GestureEvent},
    landmarks::LandmarkFrame,
    orientation::{FaceStatus, Guidance, OrientationTarget, OrientationValidator},
    pose_estimation::{EstimateQuality, PoseEstimate, PoseEstimator, ReferencePose, RotationEstimate},
    snapshot::FrameSource,
    stability::{HoldTick, StabilityTimer},
    Error, Result,
};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::time::Duration;

/// External commands accepted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartSession,
    CancelSession,
    /// Take the reference pose from the next frame with a face
    SetReferencePose,
    ClearReferencePose,
    CameraStarted,
    CameraStopped,
}

/// Cloneable handle for queueing commands from other threads
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Queue a command for the next processed frame
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the engine has been dropped
    pub fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|e| Error::InvalidState(format!("Engine is gone, {:?} not delivered", e.into_inner())))
    }
}

/// Recoverable problem seen while processing a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameIssue {
    PipelineNotReady,
    NoFace,
    /// Estimate fell back to the last good value
    DegenerateGeometry,
    CaptureFailed(String),
    ReferenceRejected(String),
}

/// Per-frame UI state
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp: Duration,
    pub state: CaptureState,
    pub target: Option<OrientationTarget>,
    pub estimate: Option<RotationEstimate>,
    pub status: FaceStatus,
    pub guidance: Guidance,
    pub hold_progress: f64,
    /// Direction captured on this frame
    pub captured: Option<OrientationTarget>,
    pub gesture: Option<GestureEvent>,
    pub issue: Option<FrameIssue>,
}

impl FrameReport {
    fn idle(timestamp: Duration, state: CaptureState) -> Self {
        Self {
            timestamp,
            state,
            target: state.target(),
            estimate: None,
            status: FaceStatus::NotDetected,
            guidance: Guidance::None,
            hold_progress: 0.0,
            captured: None,
            gesture: None,
            issue: None,
        }
    }
}

/// Head-pose interaction engine
pub struct HeadPoseApp {
    estimator: PoseEstimator,
    validator: OrientationValidator,
    timer: StabilityTimer,
    orchestrator: CaptureOrchestrator,
    gestures: Option<GestureDetector>,
    bus: EventBus<GestureEvent>,
    validation_filter: Box<dyn AngleFilter>,
    gesture_filter: Box<dyn AngleFilter>,
    auto_reference: bool,
    reference_requested: bool,
    commands: Receiver<Command>,
    command_sender: Sender<Command>,
}

impl HeadPoseApp {
    /// Build the engine from a configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        info!("Initializing head pose capture engine");

        let format = config.capture.snapshot_format()?;
        let gestures = if config.gesture.enabled {
            info!("Gesture detection enabled");
            Some(GestureDetector::new(config.gesture.clone()))
        } else {
            None
        };
        let (command_sender, commands) = crossbeam_channel::unbounded();

        Ok(Self {
            estimator: PoseEstimator::new(config.pose.clone()),
            validator: OrientationValidator::new(config.orientation.clone()),
            timer: StabilityTimer::new(&config.stability),
            orchestrator: CaptureOrchestrator::new(format),
            gestures,
            bus: EventBus::new(),
            validation_filter: create_filter(&config.filter.validation)?,
            gesture_filter: create_filter(&config.filter.gesture)?,
            auto_reference: config.pose.auto_reference,
            reference_requested: false,
            commands,
            command_sender,
        })
    }

    /// Deliver finished capture sets to `sink`
    pub fn with_sink(mut self, sink: Box<dyn CaptureSink>) -> Self {
        self.orchestrator.set_sink(sink);
        self
    }

    /// Handle for queueing commands from other threads
    pub fn command_sender(&self) -> CommandSender {
        CommandSender {
            sender: self.command_sender.clone(),
        }
    }

    /// Gesture event bus; subscribe here for `GestureEvent`s
    pub fn events(&self) -> &EventBus<GestureEvent> {
        &self.bus
    }

    /// Current capture state
    pub fn state(&self) -> CaptureState {
        self.orchestrator.state()
    }

    /// Directions captured so far in this session
    pub fn captures(&self) -> &CaptureSet {
        self.orchestrator.captures()
    }

    /// Active reference pose, if any
    pub fn reference(&self) -> Option<&ReferencePose> {
        self.estimator.reference()
    }

    /// Start a capture session
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a session is already running
    pub fn start_session(&mut self) -> Result<CaptureState> {
        let state = self.orchestrator.start()?;
        self.timer.reset();
        self.estimator.clear_reference();
        self.validation_filter.reset();
        Ok(state)
    }

    /// Drop all captures and return to INIT
    pub fn cancel_session(&mut self) {
        self.orchestrator.cancel();
        self.timer.reset();
        self.estimator.clear_reference();
        self.reference_requested = false;
    }

    /// Measure yaw and pitch relative to `reference` from now on
    pub fn set_reference_pose(&mut self, reference: ReferencePose) {
        self.estimator.set_reference(reference);
        self.reference_requested = false;
    }

    /// Take the reference pose from the next frame with a face
    pub fn request_reference_pose(&mut self) {
        self.reference_requested = true;
    }

    /// Return to absolute geometric estimation
    pub fn clear_reference_pose(&mut self) {
        self.estimator.clear_reference();
        self.reference_requested = false;
    }

    /// Camera is delivering frames; sessions may capture
    pub fn camera_started(&mut self) {
        info!("Camera started");
        self.orchestrator.set_pipeline_ready(true);
    }

    /// Camera stopped: the active hold is lost and smoothing state discarded
    pub fn camera_stopped(&mut self) {
        info!("Camera stopped");
        self.orchestrator.set_pipeline_ready(false);
        self.timer.reset();
        self.validation_filter.reset();
        self.gesture_filter.reset();
        if let Some(gestures) = self.gestures.as_mut() {
            gestures.reset();
        }
    }

    /// Apply one command immediately
    pub fn apply(&mut self, command: Command) {
        debug!("Command {command:?}");
        match command {
            Command::StartSession => {
                if let Err(e) = self.start_session() {
                    warn!("Cannot start session: {e}");
                }
            }
            Command::CancelSession => self.cancel_session(),
            Command::SetReferencePose => self.request_reference_pose(),
            Command::ClearReferencePose => self.clear_reference_pose(),
            Command::CameraStarted => self.camera_started(),
            Command::CameraStopped => self.camera_stopped(),
        }
    }

    /// Run the engine on one frame
    ///
    /// Never fails: every recoverable problem is reported as a
    /// [`FrameIssue`] and the engine carries on with the next frame.
    pub fn process_frame(&mut self, frame: &LandmarkFrame, source: &mut dyn FrameSource) -> FrameReport {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }

        let now = frame.timestamp();
        if !self.orchestrator.pipeline_ready() {
            let mut report = FrameReport::idle(now, self.state());
            report.issue = Some(FrameIssue::PipelineNotReady);
            return report;
        }

        let estimate = match self.estimator.estimate(frame) {
            Ok(estimate) => estimate,
            Err(e) => {
                debug!("No usable face: {e}");
                return self.face_lost(now);
            }
        };

        let mut issue = None;
        if self.reference_requested {
            match ReferencePose::from_frame(frame) {
                Ok(reference) => self.set_reference_pose(reference),
                Err(e) => {
                    warn!("Reference pose rejected: {e}");
                    issue = Some(FrameIssue::ReferenceRejected(e.to_string()));
                }
            }
        }

        let measured = estimate.quality == EstimateQuality::Measured;
        if !measured {
            issue = Some(FrameIssue::DegenerateGeometry);
        }

        let (pitch, yaw) = self
            .validation_filter
            .apply(estimate.rotation.pitch(), estimate.rotation.yaw());
        let rotation = estimate.rotation.with_angles(pitch, yaw);

        let target = self.orchestrator.active_target();
        let mut validation = self
            .validator
            .validate(Some(&rotation), estimate.bounds.as_ref(), target);
        // Smoothing lags the head; a pose this frame contradicts is not held
        if validation.matched {
            let current = self
                .validator
                .validate(Some(&estimate.rotation), estimate.bounds.as_ref(), target);
            if !current.matched {
                validation = current;
            }
        }

        let (hold_progress, captured, capture_issue) = match target {
            // A fallback estimate is not evidence of a held pose
            Some(target) => self.advance_hold(target, validation.matched && measured, frame, source),
            None => {
                self.timer.reset();
                (0.0, None, None)
            }
        };
        issue = capture_issue.or(issue);

        let gesture = if measured { self.detect_gesture(&estimate, now) } else { None };

        FrameReport {
            timestamp: now,
            state: self.state(),
            target,
            estimate: Some(rotation),
            status: validation.status,
            guidance: validation.guidance,
            hold_progress,
            captured,
            gesture,
            issue,
        }
    }

    fn face_lost(&mut self, now: Duration) -> FrameReport {
        if let Some(target) = self.orchestrator.active_target() {
            self.timer.update(target, false, now);
        }
        self.validation_filter.reset();
        self.gesture_filter.reset();

        let mut report = FrameReport::idle(now, self.state());
        report.guidance = Guidance::CenterFace;
        report.issue = Some(FrameIssue::NoFace);
        report
    }

    fn advance_hold(
        &mut self,
        target: OrientationTarget,
        matched: bool,
        frame: &LandmarkFrame,
        source: &mut dyn FrameSource,
    ) -> (f64, Option<OrientationTarget>, Option<FrameIssue>) {
        let now = frame.timestamp();
        let tick = self.timer.update(target, matched, now);
        if tick != HoldTick::Completed {
            return (tick.progress(), None, None);
        }

        match self.orchestrator.on_hold_complete(target, source, now) {
            Ok(CaptureOutcome::Captured { direction, .. }) => {
                if direction == OrientationTarget::Front {
                    self.install_auto_reference(frame);
                }
                (1.0, Some(direction), None)
            }
            Ok(CaptureOutcome::Completed(_)) => (1.0, Some(target), None),
            Ok(CaptureOutcome::Ignored) => (tick.progress(), None, None),
            Err(e) => {
                warn!("Capture of {target} failed: {e}");
                // Require a fresh hold before retrying
                self.timer.reset();
                (0.0, None, Some(FrameIssue::CaptureFailed(e.to_string())))
            }
        }
    }

    fn install_auto_reference(&mut self, frame: &LandmarkFrame) {
        if !self.auto_reference || self.estimator.reference().is_some() {
            return;
        }
        match ReferencePose::from_frame(frame) {
            Ok(reference) => {
                info!("Reference pose taken from the FRONT capture");
                self.estimator.set_reference(reference);
            }
            Err(e) => warn!("FRONT capture unusable as reference: {e}"),
        }
    }

    fn detect_gesture(&mut self, estimate: &PoseEstimate, now: Duration) -> Option<GestureEvent> {
        let detector = self.gestures.as_mut()?;
        let (pitch, yaw) = self
            .gesture_filter
            .apply(estimate.rotation.pitch(), estimate.rotation.yaw());
        let event = detector.offer(&estimate.rotation.with_angles(pitch, yaw), now)?;

        let report = self.bus.publish(&event);
        debug!("{} delivered to {} subscribers ({} failed)", event.kind, report.delivered, report.failed);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::CoordinateSpace;
    use crate::snapshot::SnapshotFormat;
    use crate::synthetic::SyntheticFace;

    struct BytesSource;

    impl FrameSource for BytesSource {
        fn snapshot(&mut self, _format: SnapshotFormat) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    fn app() -> HeadPoseApp {
        let mut app = HeadPoseApp::new(&Config::default()).unwrap();
        app.camera_started();
        app.start_session().unwrap();
        app
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_frames_ignored_until_pipeline_ready() {
        let mut app = HeadPoseApp::new(&Config::default()).unwrap();
        app.start_session().unwrap();
        let frame = SyntheticFace::default().frame(0.0, 0.0, 0.0, ms(0));
        let report = app.process_frame(&frame, &mut BytesSource);
        assert_eq!(report.issue, Some(FrameIssue::PipelineNotReady));
        assert_eq!(report.state, CaptureState::Init);

        app.camera_started();
        let report = app.process_frame(&frame, &mut BytesSource);
        assert_eq!(report.state, CaptureState::Front);
        assert_eq!(report.status, FaceStatus::Ready);
    }

    #[test]
    fn test_missing_face_reports_no_face() {
        let mut app = app();
        let frame = LandmarkFrame::empty(CoordinateSpace::normalized(), ms(0));
        let report = app.process_frame(&frame, &mut BytesSource);
        assert_eq!(report.issue, Some(FrameIssue::NoFace));
        assert_eq!(report.status, FaceStatus::NotDetected);
        assert!(report.estimate.is_none());
        assert_eq!(report.hold_progress, 0.0);
    }

    #[test]
    fn test_front_hold_captures_and_installs_reference() {
        let mut app = app();
        let face = SyntheticFace::default();
        let mut captured = None;
        for i in 0..90u64 {
            let report = app.process_frame(&face.frame(0.0, 0.0, 0.0, ms(i * 33)), &mut BytesSource);
            captured = captured.or(report.captured);
        }
        assert_eq!(captured, Some(OrientationTarget::Front));
        assert_eq!(app.state(), CaptureState::Left);
        assert!(app.reference().is_some());
    }

    #[test]
    fn test_commands_apply_on_next_frame() {
        let mut app = app();
        let sender = app.command_sender();
        sender.send(Command::CancelSession).unwrap();
        assert_eq!(app.state(), CaptureState::Front);

        let frame = SyntheticFace::default().frame(0.0, 0.0, 0.0, ms(0));
        let report = app.process_frame(&frame, &mut BytesSource);
        assert_eq!(report.state, CaptureState::Init);
    }

    #[test]
    fn test_requested_reference_comes_from_next_frame() {
        let mut app = app();
        app.request_reference_pose();
        let frame = SyntheticFace::default().frame(0.0, 0.0, 0.0, ms(0));
        app.process_frame(&frame, &mut BytesSource);
        assert!(app.reference().is_some());

        app.clear_reference_pose();
        assert!(app.reference().is_none());
    }

    #[test]
    fn test_camera_stop_resets_hold() {
        let mut app = app();
        let face = SyntheticFace::default();
        let report = app.process_frame(&face.frame(0.0, 0.0, 0.0, ms(0)), &mut BytesSource);
        assert_eq!(report.hold_progress, 0.0);
        let report = app.process_frame(&face.frame(0.0, 0.0, 0.0, ms(1000)), &mut BytesSource);
        assert!(report.hold_progress > 0.3);

        app.camera_stopped();
        app.camera_started();
        let report = app.process_frame(&face.frame(0.0, 0.0, 0.0, ms(1100)), &mut BytesSource);
        assert_eq!(report.hold_progress, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.stability.hold_duration_ms = 0;
        assert!(HeadPoseApp::new(&config).is_err());
    }
}
