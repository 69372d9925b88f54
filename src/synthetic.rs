//! Synthetic landmark frames from a canonical 3D face model.
//!
//! The model is expressed in inter-eye units (x right, y down, z toward
//! the camera) and projected orthographically. Its proportions match the
//! estimator's default depth ratios, so single-axis rotations come back
//! out of [`crate::pose_estimation::PoseEstimator`] unchanged. Frames are
//! produced in the mirrored (selfie) convention.

use crate::{
    constants::{CHIN, FACE_MESH_LANDMARKS, FOREHEAD, LEFT_EYE_OUTER, NOSE_TIP, RIGHT_EYE_OUTER},
    landmarks::{CoordinateSpace, Landmark, LandmarkFrame},
    Error, Result,
};
use std::f64::consts::TAU;
use std::time::Duration;

const MODEL_LEFT_EYE: [f64; 3] = [-0.5, 0.0, 0.0];
const MODEL_RIGHT_EYE: [f64; 3] = [0.5, 0.0, 0.0];
const MODEL_NOSE_TIP: [f64; 3] = [0.0, 0.35, 0.5];
const MODEL_FOREHEAD: [f64; 3] = [0.0, -0.5, 0.1];
const MODEL_CHIN: [f64; 3] = [0.0, 1.2, 0.1];

/// Face oval: ellipse through forehead and chin
const OVAL_CENTER_Y: f64 = 0.35;
const OVAL_RADIUS_X: f64 = 0.8;
const OVAL_RADIUS_Y: f64 = 0.85;
const OVAL_POINTS: usize = 36;

/// Projects the canonical face into 468-point landmark frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFace {
    /// Eye-midpoint position, normalized frame units
    center: (f64, f64),
    /// Normalized frame heights per inter-eye unit
    scale: f64,
    /// Frame width over height
    aspect_ratio: f64,
}

impl Default for SyntheticFace {
    /// A face roughly 40% of the frame wide, centred in the guide circle
    fn default() -> Self {
        Self {
            center: (0.5, 0.42),
            scale: 0.25,
            aspect_ratio: 1.0,
        }
    }
}

impl SyntheticFace {
    /// # Errors
    ///
    /// Returns `InvalidInput` for non-finite or non-positive geometry
    pub fn new(center: (f64, f64), scale: f64, aspect_ratio: f64) -> Result<Self> {
        if !(center.0.is_finite() && center.1.is_finite()) {
            return Err(Error::InvalidInput("Face center must be finite".to_string()));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidInput(format!("Invalid face scale: {scale}")));
        }
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return Err(Error::InvalidInput(format!("Invalid aspect ratio: {aspect_ratio}")));
        }
        Ok(Self {
            center,
            scale,
            aspect_ratio,
        })
    }

    /// Same face with its eye midpoint moved to `(x, y)`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-finite centre
    pub fn with_center(self, x: f64, y: f64) -> Result<Self> {
        Self::new((x, y), self.scale, self.aspect_ratio)
    }

    /// Same face at a different size
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-finite or non-positive scale
    pub fn with_scale(self, scale: f64) -> Result<Self> {
        Self::new(self.center, scale, self.aspect_ratio)
    }

    /// Coordinate space of the frames this face produces
    pub fn space(&self) -> CoordinateSpace {
        CoordinateSpace::Normalized {
            aspect_ratio: self.aspect_ratio,
        }
    }

    /// Landmark frame for a head at the given rotation (degrees)
    pub fn frame(&self, yaw: f64, pitch: f64, roll: f64, timestamp: Duration) -> LandmarkFrame {
        let rotation = Rotation::new(finite_or_zero(yaw), finite_or_zero(pitch), finite_or_zero(roll));

        let oval: Vec<Landmark> = (0..OVAL_POINTS)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let angle = TAU * i as f64 / OVAL_POINTS as f64;
                let model = [
                    OVAL_RADIUS_X * angle.cos(),
                    OVAL_CENTER_Y + OVAL_RADIUS_Y * angle.sin(),
                    0.0,
                ];
                self.project(rotation.apply(model))
            })
            .collect();

        let mut points: Vec<Landmark> = (0..FACE_MESH_LANDMARKS).map(|i| oval[i % OVAL_POINTS]).collect();
        for (index, model) in [
            (NOSE_TIP, MODEL_NOSE_TIP),
            (LEFT_EYE_OUTER, MODEL_LEFT_EYE),
            (RIGHT_EYE_OUTER, MODEL_RIGHT_EYE),
            (FOREHEAD, MODEL_FOREHEAD),
            (CHIN, MODEL_CHIN),
        ] {
            points[index] = self.project(rotation.apply(model));
        }

        LandmarkFrame::from_trusted(points, self.space(), timestamp)
    }

    fn project(&self, [x, y, z]: [f64; 3]) -> Landmark {
        // Scale is in frame heights; x is stored in frame widths
        Landmark::new(
            self.center.0 + x * self.scale / self.aspect_ratio,
            self.center.1 + y * self.scale,
            z * self.scale,
        )
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Yaw, then pitch, then in-plane roll
#[derive(Debug, Clone, Copy)]
struct Rotation {
    yaw: (f64, f64),
    pitch: (f64, f64),
    roll: (f64, f64),
}

impl Rotation {
    fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        let sc = |deg: f64| deg.to_radians().sin_cos();
        Self {
            yaw: sc(yaw),
            pitch: sc(pitch),
            roll: sc(roll),
        }
    }

    fn apply(&self, [x, y, z]: [f64; 3]) -> [f64; 3] {
        // Positive yaw swings the nose image-left (mirrored feed)
        let (s, c) = self.yaw;
        let (x, z) = (x * c - z * s, x * s + z * c);

        // Positive pitch swings the nose down
        let (s, c) = self.pitch;
        let (y, z) = (y * c + z * s, -y * s + z * c);

        let (s, c) = self.roll;
        [x * c - y * s, x * s + y * c, z]
    }
}
