//! Multi-angle capture sequencing.
//!
//! The orchestrator visits FRONT, LEFT, RIGHT, UP and DOWN in that order.
//! Each completed stability hold for the active target takes one snapshot
//! and advances; after DOWN the full set is handed to the configured
//! [`CaptureSink`] and the session stops.

use crate::{
    orientation::OrientationTarget,
    snapshot::{FrameSource, SnapshotFormat},
    Error, Result,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Public session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Init,
    Front,
    Left,
    Right,
    Up,
    Down,
    Completed,
}

impl CaptureState {
    /// Target captured in this state, if it is a capturing state
    pub const fn target(self) -> Option<OrientationTarget> {
        match self {
            Self::Front => Some(OrientationTarget::Front),
            Self::Left => Some(OrientationTarget::Left),
            Self::Right => Some(OrientationTarget::Right),
            Self::Up => Some(OrientationTarget::Up),
            Self::Down => Some(OrientationTarget::Down),
            Self::Init | Self::Completed => None,
        }
    }
}

impl From<OrientationTarget> for CaptureState {
    fn from(target: OrientationTarget) -> Self {
        match target {
            OrientationTarget::Front => Self::Front,
            OrientationTarget::Left => Self::Left,
            OrientationTarget::Right => Self::Right,
            OrientationTarget::Up => Self::Up,
            OrientationTarget::Down => Self::Down,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target() {
            Some(target) => write!(f, "{target}"),
            None if *self == Self::Init => f.write_str("INIT"),
            None => f.write_str("COMPLETED"),
        }
    }
}

/// One captured direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub direction: OrientationTarget,
    pub image_data: Vec<u8>,
    pub format: SnapshotFormat,
    pub timestamp: Duration,
}

/// Captured records keyed by direction, at most one per direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSet {
    records: BTreeMap<OrientationTarget, CaptureRecord>,
}

impl CaptureSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record unless its direction is already present
    ///
    /// Returns whether the record was stored.
    pub fn insert(&mut self, record: CaptureRecord) -> bool {
        if self.records.contains_key(&record.direction) {
            return false;
        }
        self.records.insert(record.direction, record);
        true
    }

    /// Record for one direction
    pub fn get(&self, direction: OrientationTarget) -> Option<&CaptureRecord> {
        self.records.get(&direction)
    }

    /// Whether `direction` has been captured
    pub fn contains(&self, direction: OrientationTarget) -> bool {
        self.records.contains_key(&direction)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All five directions present
    pub fn is_complete(&self) -> bool {
        OrientationTarget::ALL.iter().all(|d| self.records.contains_key(d))
    }

    /// Directions present, in visiting order
    pub fn directions(&self) -> Vec<OrientationTarget> {
        self.records.keys().copied().collect()
    }

    /// Records in visiting order
    pub fn iter(&self) -> impl Iterator<Item = &CaptureRecord> {
        self.records.values()
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records in visiting order, consuming the set
    pub fn into_records(self) -> Vec<CaptureRecord> {
        self.records.into_values().collect()
    }
}

/// Receiver of the finished capture set (e.g. an uploader)
///
/// Called once per completed session from the frame-processing path;
/// implementations must hand the set off without blocking.
pub trait CaptureSink: Send {
    fn deliver(&mut self, captures: CaptureSet);
}

impl<F> CaptureSink for F
where
    F: FnMut(CaptureSet) + Send,
{
    fn deliver(&mut self, captures: CaptureSet) {
        self(captures);
    }
}

/// Forwards finished sets over a channel to an asynchronous consumer
pub struct ChannelSink {
    sender: Sender<CaptureSet>,
}

impl ChannelSink {
    /// Sink plus the receiving end of an unbounded channel
    pub fn new() -> (Self, Receiver<CaptureSet>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }

    /// Sink over an existing channel
    pub fn from_sender(sender: Sender<CaptureSet>) -> Self {
        Self { sender }
    }
}

impl CaptureSink for ChannelSink {
    fn deliver(&mut self, captures: CaptureSet) {
        match self.sender.try_send(captures) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Capture consumer is not keeping up; capture set dropped"),
            Err(TrySendError::Disconnected(_)) => warn!("Capture consumer is gone; capture set dropped"),
        }
    }
}

/// Result of handing a completed hold to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The hold was not for the active target (stale or no session)
    Ignored,
    /// Direction stored; the session moved on to `next`
    Captured {
        direction: OrientationTarget,
        next: OrientationTarget,
    },
    /// Last direction stored; the full set was delivered
    Completed(CaptureSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingPipeline,
    Active(OrientationTarget),
    Completed,
}

/// Fixed-order capture state machine
pub struct CaptureOrchestrator {
    phase: Phase,
    pipeline_ready: bool,
    format: SnapshotFormat,
    captures: CaptureSet,
    sink: Option<Box<dyn CaptureSink>>,
}

impl CaptureOrchestrator {
    /// Idle orchestrator encoding snapshots as `format`
    pub fn new(format: SnapshotFormat) -> Self {
        Self {
            phase: Phase::Idle,
            pipeline_ready: false,
            format,
            captures: CaptureSet::new(),
            sink: None,
        }
    }

    /// Deliver completed sets to `sink`
    pub fn with_sink(mut self, sink: Box<dyn CaptureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the completion sink
    pub fn set_sink(&mut self, sink: Box<dyn CaptureSink>) {
        self.sink = Some(sink);
    }

    /// Public session state
    pub fn state(&self) -> CaptureState {
        match self.phase {
            Phase::Idle | Phase::AwaitingPipeline => CaptureState::Init,
            Phase::Active(target) => target.into(),
            Phase::Completed => CaptureState::Completed,
        }
    }

    /// Target currently being captured
    pub fn active_target(&self) -> Option<OrientationTarget> {
        match self.phase {
            Phase::Active(target) => Some(target),
            _ => None,
        }
    }

    /// A session was started and has not finished or been cancelled
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::AwaitingPipeline | Phase::Active(_))
    }

    /// Whether the camera pipeline reported ready
    pub fn pipeline_ready(&self) -> bool {
        self.pipeline_ready
    }

    /// Records stored in the current or last session
    pub fn captures(&self) -> &CaptureSet {
        &self.captures
    }

    /// Encoding requested for snapshots
    pub fn format(&self) -> SnapshotFormat {
        self.format
    }

    /// Camera/model readiness; capturing starts only once ready
    ///
    /// Losing readiness does not leave an active target; holds simply
    /// cannot complete without frames.
    pub fn set_pipeline_ready(&mut self, ready: bool) {
        self.pipeline_ready = ready;
        if ready && self.phase == Phase::AwaitingPipeline {
            info!("Pipeline ready, capturing {}", OrientationTarget::Front);
            self.phase = Phase::Active(OrientationTarget::Front);
        }
    }

    /// Begin a new session; a finished session is discarded first
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a session is already running
    pub fn start(&mut self) -> Result<CaptureState> {
        if self.is_running() {
            return Err(Error::InvalidState(format!("Session already running ({})", self.state())));
        }

        self.captures.clear();
        self.phase = if self.pipeline_ready {
            Phase::Active(OrientationTarget::Front)
        } else {
            Phase::AwaitingPipeline
        };
        info!("Capture session started ({})", self.state());
        Ok(self.state())
    }

    /// Drop every record and return to INIT
    pub fn cancel(&mut self) {
        if self.phase != Phase::Idle {
            info!("Capture session cancelled in {}", self.state());
        }
        self.captures.clear();
        self.phase = Phase::Idle;
    }

    /// Handle a completed stability hold for `target`
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailure` if the snapshot fails or is empty. The
    /// state does not change, so the next successful hold retries.
    pub fn on_hold_complete(
        &mut self,
        target: OrientationTarget,
        source: &mut dyn FrameSource,
        timestamp: Duration,
    ) -> Result<CaptureOutcome> {
        if self.phase != Phase::Active(target) {
            debug!("Ignoring hold for {target} in {}", self.state());
            return Ok(CaptureOutcome::Ignored);
        }

        let image_data = source.snapshot(self.format).map_err(|e| match e {
            Error::CaptureFailure(_) => e,
            other => Error::CaptureFailure(other.to_string()),
        })?;
        if image_data.is_empty() {
            return Err(Error::CaptureFailure(format!("Empty snapshot for {target}")));
        }

        let stored = self.captures.insert(CaptureRecord {
            direction: target,
            image_data,
            format: self.format,
            timestamp,
        });
        if stored {
            info!("Captured {target} ({}/{})", self.captures.len(), OrientationTarget::ALL.len());
        }

        match target.next() {
            Some(next) => {
                self.phase = Phase::Active(next);
                Ok(CaptureOutcome::Captured { direction: target, next })
            }
            None => {
                self.phase = Phase::Completed;
                info!("Capture session completed with {} records", self.captures.len());
                let captures = self.captures.clone();
                if let Some(sink) = self.sink.as_mut() {
                    sink.deliver(captures.clone());
                }
                Ok(CaptureOutcome::Completed(captures))
            }
        }
    }
}
