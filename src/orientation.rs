//! Orientation targets, face-bounds checks and per-target band matching.
//!
//! Every target is an angular band on yaw and pitch plus a roll limit.
//! The directional bands start strictly above the frontal threshold, so
//! no estimate can match two targets.

use crate::{config::OrientationConfig, landmarks::BoundingBox, pose_estimation::RotationEstimate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture direction, in visiting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrientationTarget {
    Front,
    Left,
    Right,
    Up,
    Down,
}

impl OrientationTarget {
    /// All targets in visiting order
    pub const ALL: [Self; 5] = [Self::Front, Self::Left, Self::Right, Self::Up, Self::Down];

    /// Target visited after this one, `None` after the last
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Front => Some(Self::Left),
            Self::Left => Some(Self::Right),
            Self::Right => Some(Self::Up),
            Self::Up => Some(Self::Down),
            Self::Down => None,
        }
    }

    /// Upper-case direction name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Front => "FRONT",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for OrientationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status category shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceStatus {
    NotDetected,
    OutOfBounds,
    WrongOrientation,
    Ready,
}

/// Face placement relative to the guide circle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsCheck {
    Valid,
    OffCenter,
    TooSmall,
    TooLarge,
}

impl BoundsCheck {
    /// Face is placed well enough to capture
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Corrective hint for the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    CenterFace,
    MoveCloser,
    MoveBack,
    TurnLeft,
    TurnRight,
    LookUp,
    LookDown,
    LevelHead,
    Hold,
    None,
}

/// Outcome of validating one estimate against one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    pub matched: bool,
    pub status: FaceStatus,
    pub guidance: Guidance,
    /// `None` when no face was detected
    pub bounds: Option<BoundsCheck>,
}

impl Validation {
    fn not_detected() -> Self {
        Self {
            matched: false,
            status: FaceStatus::NotDetected,
            guidance: Guidance::CenterFace,
            bounds: None,
        }
    }
}

/// Closed or half-open interval on one axis
#[derive(Debug, Clone, Copy)]
struct Band {
    min: f64,
    max: f64,
    min_open: bool,
    max_open: bool,
}

impl Band {
    const fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            min_open: false,
            max_open: false,
        }
    }

    fn contains(&self, value: f64) -> bool {
        let above = if self.min_open { value > self.min } else { value >= self.min };
        let below = if self.max_open { value < self.max } else { value <= self.max };
        above && below
    }

    /// -1 below the band, 1 above it, 0 inside
    fn side(&self, value: f64) -> i8 {
        if self.contains(value) {
            0
        } else if value <= self.min {
            -1
        } else {
            1
        }
    }
}

/// Validates rotation estimates and face bounds against capture targets
#[derive(Debug, Clone)]
pub struct OrientationValidator {
    config: OrientationConfig,
}

impl OrientationValidator {
    /// Validator for the given bands and bounds
    pub fn new(config: OrientationConfig) -> Self {
        Self { config }
    }

    /// Bands and bounds in use
    pub fn config(&self) -> &OrientationConfig {
        &self.config
    }

    /// Yaw band and pitch band for a target
    fn bands(&self, target: OrientationTarget) -> (Band, Band) {
        let t = self.config.angle_threshold;
        let front = Band::closed(-t, t);
        let positive = |max: f64| Band {
            min: t,
            max,
            min_open: true,
            max_open: false,
        };
        let negative = |max: f64| Band {
            min: -max,
            max: -t,
            min_open: false,
            max_open: true,
        };

        match target {
            OrientationTarget::Front => (front, front),
            OrientationTarget::Left => (positive(self.config.turn_max), front),
            OrientationTarget::Right => (negative(self.config.turn_max), front),
            OrientationTarget::Up => (front, negative(self.config.tilt_max)),
            OrientationTarget::Down => (front, positive(self.config.tilt_max)),
        }
    }

    fn roll_ok(&self, rotation: &RotationEstimate) -> bool {
        rotation.roll().abs() <= self.config.roll_threshold
    }

    /// Whether the rotation lies inside the target's bands (bounds not considered)
    pub fn matches(&self, rotation: &RotationEstimate, target: OrientationTarget) -> bool {
        let (yaw, pitch) = self.bands(target);
        self.roll_ok(rotation) && yaw.contains(rotation.yaw()) && pitch.contains(rotation.pitch())
    }

    /// Target whose band contains the rotation, if any
    pub fn classify(&self, rotation: &RotationEstimate) -> Option<OrientationTarget> {
        OrientationTarget::ALL
            .into_iter()
            .find(|&target| self.matches(rotation, target))
    }

    /// Check the face bounding box against the guide circle
    pub fn check_bounds(&self, bbox: &BoundingBox) -> BoundsCheck {
        let (cx, cy) = bbox.center();
        let (gx, gy) = self.config.guide_center;
        if (cx - gx).hypot(cy - gy) > self.config.max_center_offset {
            return BoundsCheck::OffCenter;
        }

        let width = bbox.width();
        if width < self.config.min_face_ratio {
            BoundsCheck::TooSmall
        } else if width > self.config.max_face_ratio {
            BoundsCheck::TooLarge
        } else {
            BoundsCheck::Valid
        }
    }

    /// Validate one frame's estimate against the active target
    ///
    /// `rotation` is `None` when no face was found; `target` is `None`
    /// when no target is active, which never matches.
    pub fn validate(
        &self,
        rotation: Option<&RotationEstimate>,
        bbox: Option<&BoundingBox>,
        target: Option<OrientationTarget>,
    ) -> Validation {
        let (Some(rotation), Some(bbox)) = (rotation, bbox) else {
            return Validation::not_detected();
        };

        let bounds = self.check_bounds(bbox);
        if !bounds.is_valid() {
            let guidance = match bounds {
                BoundsCheck::TooSmall => Guidance::MoveCloser,
                BoundsCheck::TooLarge => Guidance::MoveBack,
                _ => Guidance::CenterFace,
            };
            return Validation {
                matched: false,
                status: FaceStatus::OutOfBounds,
                guidance,
                bounds: Some(bounds),
            };
        }

        let Some(target) = target else {
            return Validation {
                matched: false,
                status: FaceStatus::WrongOrientation,
                guidance: Guidance::None,
                bounds: Some(bounds),
            };
        };

        if self.matches(rotation, target) {
            Validation {
                matched: true,
                status: FaceStatus::Ready,
                guidance: Guidance::Hold,
                bounds: Some(bounds),
            }
        } else {
            Validation {
                matched: false,
                status: FaceStatus::WrongOrientation,
                guidance: self.guidance(rotation, target),
                bounds: Some(bounds),
            }
        }
    }

    fn guidance(&self, rotation: &RotationEstimate, target: OrientationTarget) -> Guidance {
        if !self.roll_ok(rotation) {
            return Guidance::LevelHead;
        }

        let (yaw_band, pitch_band) = self.bands(target);
        let yaw_hint = match yaw_band.side(rotation.yaw()) {
            // Positive yaw is a turn to the subject's left
            -1 => Some(Guidance::TurnLeft),
            1 => Some(Guidance::TurnRight),
            _ => None,
        };
        let pitch_hint = match pitch_band.side(rotation.pitch()) {
            -1 => Some(Guidance::LookDown),
            1 => Some(Guidance::LookUp),
            _ => None,
        };

        // Fix the axis the target is about first
        let primary_is_pitch = matches!(target, OrientationTarget::Up | OrientationTarget::Down);
        let (first, second) = if primary_is_pitch {
            (pitch_hint, yaw_hint)
        } else {
            (yaw_hint, pitch_hint)
        };
        first.or(second).unwrap_or(Guidance::None)
    }
}
