//! Scripted head motion for replaying the engine without a camera.
//!
//! A script is a YAML list of segments, each holding a pose for a number
//! of milliseconds:
//!
//! ```yaml
//! - { yaw: 0.0, pitch: 0.0, duration_ms: 3000 }
//! - { yaw: 25.0, pitch: 0.0, duration_ms: 3000 }
//! - { visible: false, duration_ms: 500 }
//! ```

use crate::{
    landmarks::LandmarkFrame,
    synthetic::SyntheticFace,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One held pose
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSegment {
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub roll: f64,
    pub duration_ms: u64,
    /// `false` simulates the face leaving the frame
    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn visible_default() -> bool {
    true
}

impl PoseSegment {
    /// Visible pose held for `duration_ms`
    pub fn hold(yaw: f64, pitch: f64, duration_ms: u64) -> Self {
        Self {
            yaw,
            pitch,
            roll: 0.0,
            duration_ms,
            visible: true,
        }
    }

    /// No face for `duration_ms`
    pub fn hidden(duration_ms: u64) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            duration_ms,
            visible: false,
        }
    }
}

/// Ordered, non-empty list of segments
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PoseScript {
    segments: Vec<PoseSegment>,
}

impl PoseScript {
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty script or non-finite angles
    pub fn new(segments: Vec<PoseSegment>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidInput("Pose script has no segments".to_string()));
        }
        if let Some(i) = segments
            .iter()
            .position(|s| !(s.yaw.is_finite() && s.pitch.is_finite() && s.roll.is_finite()))
        {
            return Err(Error::InvalidInput(format!("Segment {i} has a non-finite angle")));
        }
        Ok(Self { segments })
    }

    /// Load a script from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// # Errors
    ///
    /// Returns `Yaml` for malformed input and `InvalidInput` for an invalid script
    pub fn from_yaml(content: &str) -> Result<Self> {
        let segments: Vec<PoseSegment> = serde_yaml::from_str(content)?;
        Self::new(segments)
    }

    /// Frontal, left, right, up and down, each held for `hold_ms`
    pub fn capture_sequence(hold_ms: u64) -> Self {
        Self {
            segments: vec![
                PoseSegment::hold(0.0, 0.0, hold_ms),
                PoseSegment::hold(25.0, 0.0, hold_ms),
                PoseSegment::hold(-25.0, 0.0, hold_ms),
                PoseSegment::hold(0.0, -25.0, hold_ms),
                PoseSegment::hold(0.0, 25.0, hold_ms),
            ],
        }
    }

    /// Segments in playback order
    pub fn segments(&self) -> &[PoseSegment] {
        &self.segments
    }

    /// Sum of every segment duration
    pub fn total_duration(&self) -> Duration {
        Duration::from_millis(self.segments.iter().map(|s| s.duration_ms).sum())
    }

    /// Segment active at `elapsed`, `None` past the end
    pub fn segment_at(&self, elapsed: Duration) -> Option<&PoseSegment> {
        let mut end = Duration::ZERO;
        self.segments.iter().find(|segment| {
            end += Duration::from_millis(segment.duration_ms);
            elapsed < end
        })
    }

    /// Landmark frames sampled at `fps` over the whole script
    pub fn frames(&self, face: SyntheticFace, fps: u32) -> impl Iterator<Item = LandmarkFrame> + '_ {
        let step = Duration::from_secs(1) / fps.max(1);
        let total = self.total_duration();
        let space = face.space();
        (0u32..)
            .map(move |i| step * i)
            .take_while(move |&t| t < total)
            .filter_map(move |t| {
                let segment = self.segment_at(t)?;
                Some(if segment.visible {
                    face.frame(segment.yaw, segment.pitch, segment.roll, t)
                } else {
                    LandmarkFrame::empty(space, t)
                })
            })
    }
}
