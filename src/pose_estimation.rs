//! Head rotation estimation from 2D landmark geometry.
//!
//! Roll comes from the eye line. Yaw and pitch are measured in the
//! face-aligned frame (de-rotated by roll): yaw from the nose tip's
//! offset along the eye line, pitch from the nose tip's position between
//! forehead and chin. With a [`ReferencePose`] both are expressed relative
//! to the frontal geometry captured for this session instead; the eye
//! distance is then compared after dividing out the change in face size,
//! so stepping toward or away from the camera does not read as a turn.

use crate::{
    config::PoseConfig,
    constants::{CHIN, EPSILON, FOREHEAD, LEFT_EYE_OUTER, MAX_ANGLE, MIN_REQUIRED_LANDMARKS, NOSE_TIP, RIGHT_EYE_OUTER},
    landmarks::{BoundingBox, Landmark, LandmarkFrame},
    Error, Result,
};
use log::debug;

/// Lower bound on the pitch cosine used to undo foreshortening of the face axis
const MIN_PITCH_COSINE: f64 = 0.2;

/// Head rotation in degrees
///
/// Positive yaw: subject turned to their left. Positive pitch: looking
/// down. Every component is finite and clamped to ±90°.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationEstimate {
    yaw: f64,
    pitch: f64,
    roll: f64,
}

impl RotationEstimate {
    /// Build an estimate, clamping each angle and mapping non-finite input to zero
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            yaw: clamp_angle(yaw, MAX_ANGLE),
            pitch: clamp_angle(pitch, MAX_ANGLE),
            roll: clamp_angle(roll, MAX_ANGLE),
        }
    }

    /// Facing the camera
    pub const fn neutral() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }

    /// Yaw in degrees, positive to the subject's left
    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    /// Pitch in degrees, positive looking down
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Roll in degrees
    pub fn roll(&self) -> f64 {
        self.roll
    }

    /// Same roll, different yaw/pitch (used after smoothing)
    pub fn with_angles(&self, pitch: f64, yaw: f64) -> Self {
        Self::new(yaw, pitch, self.roll)
    }

    fn clamped(self, limit: f64) -> Self {
        Self {
            yaw: clamp_angle(self.yaw, limit),
            pitch: clamp_angle(self.pitch, limit),
            roll: clamp_angle(self.roll, limit),
        }
    }
}

fn clamp_angle(value: f64, limit: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-limit, limit)
    } else {
        0.0
    }
}

/// Whether the estimate was measured from this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateQuality {
    Measured,
    /// Geometry was degenerate; the last good (or neutral) estimate is reported
    Fallback,
}

/// Anchor landmarks in isotropic frame units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAnchors {
    /// Eye corner on the image-left side
    pub left_eye: Landmark,
    /// Eye corner on the image-right side
    pub right_eye: Landmark,
    pub nose_tip: Landmark,
    pub forehead: Landmark,
    pub chin: Landmark,
}

impl FaceAnchors {
    fn from_frame(frame: &LandmarkFrame) -> Result<Self> {
        let fetch = |index: usize| {
            frame.isotropic(index).ok_or(Error::NoFaceDetected {
                found: frame.len(),
                required: MIN_REQUIRED_LANDMARKS,
            })
        };

        let (mut left_eye, mut right_eye) = (fetch(LEFT_EYE_OUTER)?, fetch(RIGHT_EYE_OUTER)?);
        if right_eye.x < left_eye.x {
            std::mem::swap(&mut left_eye, &mut right_eye);
        }

        Ok(Self {
            left_eye,
            right_eye,
            nose_tip: fetch(NOSE_TIP)?,
            forehead: fetch(FOREHEAD)?,
            chin: fetch(CHIN)?,
        })
    }

    fn eye_midpoint(&self) -> (f64, f64) {
        (
            (self.left_eye.x + self.right_eye.x) / 2.0,
            (self.left_eye.y + self.right_eye.y) / 2.0,
        )
    }

    fn eye_vector(&self) -> (f64, f64) {
        (self.right_eye.x - self.left_eye.x, self.right_eye.y - self.left_eye.y)
    }
}

/// Eye-line frame: unit vector along the eyes, its downward normal and the eye distance
#[derive(Debug, Clone, Copy)]
struct EyeFrame {
    along: (f64, f64),
    down: (f64, f64),
    distance: f64,
    midpoint: (f64, f64),
}

impl EyeFrame {
    fn new(anchors: &FaceAnchors) -> Option<Self> {
        let (ex, ey) = anchors.eye_vector();
        let distance = ex.hypot(ey);
        if !(distance.is_finite() && distance > EPSILON) {
            return None;
        }
        let along = (ex / distance, ey / distance);
        Some(Self {
            along,
            down: (-along.1, along.0),
            distance,
            midpoint: anchors.eye_midpoint(),
        })
    }

    fn roll_degrees(&self) -> f64 {
        self.along.1.atan2(self.along.0).to_degrees()
    }

    /// Nose offset along the eye line, in eye distances (positive = image right)
    fn nose_offset(&self, nose: Landmark) -> f64 {
        let (dx, dy) = (nose.x - self.midpoint.0, nose.y - self.midpoint.1);
        (dx * self.along.0 + dy * self.along.1) / self.distance
    }

    /// Nose drop below the eye line, in eye distances
    fn nose_drop(&self, nose: Landmark) -> f64 {
        let (dx, dy) = (nose.x - self.midpoint.0, nose.y - self.midpoint.1);
        (dx * self.down.0 + dy * self.down.1) / self.distance
    }
}

/// Forehead-to-chin axis: its length and the nose tip's position along it
#[derive(Debug, Clone, Copy, PartialEq)]
struct FaceAxis {
    length: f64,
    /// 0 at the forehead, 1 at the chin
    nose_fraction: f64,
}

impl FaceAxis {
    fn new(anchors: &FaceAnchors) -> Option<Self> {
        let axis = (anchors.chin.x - anchors.forehead.x, anchors.chin.y - anchors.forehead.y);
        let length_sq = axis.0 * axis.0 + axis.1 * axis.1;
        if !(length_sq.is_finite() && length_sq >= EPSILON) {
            return None;
        }
        let nose = (anchors.nose_tip.x - anchors.forehead.x, anchors.nose_tip.y - anchors.forehead.y);
        Some(Self {
            length: length_sq.sqrt(),
            nose_fraction: (nose.0 * axis.0 + nose.1 * axis.1) / length_sq,
        })
    }
}

/// Frontal geometry captured once per session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePose {
    eye_distance: f64,
    nose_offset: f64,
    nose_drop: f64,
    axis: FaceAxis,
}

impl ReferencePose {
    /// Capture a reference from a frontal frame
    ///
    /// # Errors
    ///
    /// Returns `NoFaceDetected` if the frame lacks anchor landmarks and
    /// `DegenerateGeometry` if the eye distance, nose drop or forehead-to-chin
    /// length is near zero.
    pub fn from_frame(frame: &LandmarkFrame) -> Result<Self> {
        if frame.len() < MIN_REQUIRED_LANDMARKS {
            return Err(Error::NoFaceDetected {
                found: frame.len(),
                required: MIN_REQUIRED_LANDMARKS,
            });
        }
        let anchors = FaceAnchors::from_frame(frame)?;
        let eyes = EyeFrame::new(&anchors)
            .ok_or_else(|| Error::DegenerateGeometry("reference eye distance is zero".to_string()))?;

        let nose_drop = eyes.nose_drop(anchors.nose_tip);
        if nose_drop.abs() < EPSILON {
            return Err(Error::DegenerateGeometry(
                "reference nose tip lies on the eye line".to_string(),
            ));
        }

        let axis = FaceAxis::new(&anchors)
            .ok_or_else(|| Error::DegenerateGeometry("reference forehead and chin coincide".to_string()))?;

        Ok(Self {
            eye_distance: eyes.distance,
            nose_offset: eyes.nose_offset(anchors.nose_tip),
            nose_drop,
            axis,
        })
    }

    /// Eye distance of the reference frame, isotropic frame units
    pub fn eye_distance(&self) -> f64 {
        self.eye_distance
    }
}

/// Result of estimating one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    pub rotation: RotationEstimate,
    pub quality: EstimateQuality,
    pub anchors: FaceAnchors,
    /// Normalized landmark bounding box
    pub bounds: Option<BoundingBox>,
}

/// Landmark-geometry head pose estimator
pub struct PoseEstimator {
    config: PoseConfig,
    reference: Option<ReferencePose>,
    last_good: Option<RotationEstimate>,
}

impl PoseEstimator {
    /// Estimator without a reference pose
    pub fn new(config: PoseConfig) -> Self {
        Self {
            config,
            reference: None,
            last_good: None,
        }
    }

    /// Reference pose in use, if any
    pub fn reference(&self) -> Option<&ReferencePose> {
        self.reference.as_ref()
    }

    /// Estimate relative to `reference` from now on
    pub fn set_reference(&mut self, reference: ReferencePose) {
        debug!("Reference pose set (eye distance {:.4})", reference.eye_distance);
        self.reference = Some(reference);
    }

    /// Return to absolute geometric estimation
    pub fn clear_reference(&mut self) {
        self.reference = None;
    }

    /// Forget the reference and the last good estimate
    pub fn reset(&mut self) {
        self.reference = None;
        self.last_good = None;
    }

    /// Estimate head rotation for one frame
    ///
    /// # Errors
    ///
    /// Returns `NoFaceDetected` when the frame has fewer landmarks than the
    /// anchors need. Degenerate geometry is not an error: it yields the
    /// last good estimate flagged [`EstimateQuality::Fallback`].
    pub fn estimate(&mut self, frame: &LandmarkFrame) -> Result<PoseEstimate> {
        if frame.len() < MIN_REQUIRED_LANDMARKS {
            return Err(Error::NoFaceDetected {
                found: frame.len(),
                required: MIN_REQUIRED_LANDMARKS,
            });
        }

        let anchors = FaceAnchors::from_frame(frame)?;
        let bounds = frame.bounding_box();

        let measured = EyeFrame::new(&anchors).and_then(|eyes| self.measure(&anchors, &eyes));
        let (rotation, quality) = match measured {
            Some(rotation) => {
                self.last_good = Some(rotation);
                (rotation, EstimateQuality::Measured)
            }
            None => {
                debug!("Degenerate landmark geometry, reusing last good estimate");
                (
                    self.last_good.unwrap_or_else(RotationEstimate::neutral),
                    EstimateQuality::Fallback,
                )
            }
        };

        Ok(PoseEstimate {
            rotation,
            quality,
            anchors,
            bounds,
        })
    }

    fn measure(&self, anchors: &FaceAnchors, eyes: &EyeFrame) -> Option<RotationEstimate> {
        // Mirrored feed: turning to the subject's left moves the nose image-left
        let yaw_sign = if self.config.mirrored { -1.0 } else { 1.0 };
        let roll = eyes.roll_degrees();

        let axis = FaceAxis::new(anchors)?;

        let (yaw, pitch) = match &self.reference {
            Some(reference) => {
                let size_ratio = self.face_size(&axis) / self.face_size(&reference.axis);
                let ratio = (eyes.distance / reference.eye_distance / size_ratio).min(1.0);
                let shift = eyes.nose_offset(anchors.nose_tip) - reference.nose_offset;
                let direction = if shift.abs() < EPSILON { 0.0 } else { yaw_sign * shift.signum() };
                let yaw = direction * ratio.acos().to_degrees();

                let drop_ratio = eyes.nose_drop(anchors.nose_tip) / reference.nose_drop;
                let pitch = (drop_ratio - 1.0) * self.config.reference_pitch_scale;
                (yaw, pitch)
            }
            None => {
                let offset = eyes.nose_offset(anchors.nose_tip);
                let yaw = (yaw_sign * offset / self.config.yaw_depth_ratio).atan().to_degrees();
                (yaw, self.geometric_pitch(&axis))
            }
        };

        if !(yaw.is_finite() && pitch.is_finite() && roll.is_finite()) {
            return None;
        }

        Some(
            RotationEstimate {
                yaw,
                pitch,
                roll,
            }
            .clamped(self.config.max_angle.min(MAX_ANGLE)),
        )
    }

    fn geometric_pitch(&self, axis: &FaceAxis) -> f64 {
        ((axis.nose_fraction - self.config.neutral_pitch_fraction) / self.config.pitch_depth_ratio)
            .atan()
            .to_degrees()
    }

    /// Face size unaffected by yaw: the forehead-to-chin length with pitch foreshortening removed
    fn face_size(&self, axis: &FaceAxis) -> f64 {
        let cosine = self.geometric_pitch(axis).to_radians().cos().max(MIN_PITCH_COSINE);
        axis.length / cosine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::CoordinateSpace;
    use crate::synthetic::SyntheticFace;
    use std::time::Duration;

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(PoseConfig::default())
    }

    #[test]
    fn test_frontal_face_is_neutral() {
        let frame = SyntheticFace::default().frame(0.0, 0.0, 0.0, Duration::ZERO);
        let estimate = estimator().estimate(&frame).unwrap();
        assert_eq!(estimate.quality, EstimateQuality::Measured);
        assert!(estimate.rotation.yaw().abs() < 1e-6);
        assert!(estimate.rotation.pitch().abs() < 1e-6);
        assert!(estimate.rotation.roll().abs() < 1e-6);
    }

    #[test]
    fn test_recovers_single_axis_rotation() {
        let face = SyntheticFace::default();
        let mut estimator = estimator();

        let yaw = estimator.estimate(&face.frame(25.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        assert!((yaw.rotation.yaw() - 25.0).abs() < 0.5, "yaw {}", yaw.rotation.yaw());

        let pitch = estimator.estimate(&face.frame(0.0, -20.0, 0.0, Duration::ZERO)).unwrap();
        assert!((pitch.rotation.pitch() + 20.0).abs() < 0.5, "pitch {}", pitch.rotation.pitch());

        let roll = estimator.estimate(&face.frame(0.0, 0.0, 10.0, Duration::ZERO)).unwrap();
        assert!((roll.rotation.roll() - 10.0).abs() < 0.5, "roll {}", roll.rotation.roll());
        assert!(roll.rotation.yaw().abs() < 0.5);
    }

    #[test]
    fn test_unmirrored_flips_yaw() {
        let config = PoseConfig {
            mirrored: false,
            ..PoseConfig::default()
        };
        let mut estimator = PoseEstimator::new(config);
        let frame = SyntheticFace::default().frame(20.0, 0.0, 0.0, Duration::ZERO);
        assert!(estimator.estimate(&frame).unwrap().rotation.yaw() < -15.0);
    }

    #[test]
    fn test_insufficient_landmarks_is_no_face() {
        let frame = LandmarkFrame::empty(CoordinateSpace::normalized(), Duration::ZERO);
        assert!(matches!(
            estimator().estimate(&frame),
            Err(Error::NoFaceDetected { found: 0, .. })
        ));
    }

    #[test]
    fn test_collapsed_eyes_fall_back() {
        let face = SyntheticFace::default();
        let mut estimator = estimator();
        let good = estimator.estimate(&face.frame(20.0, 0.0, 0.0, Duration::ZERO)).unwrap();

        let mut points = face.frame(0.0, 0.0, 0.0, Duration::ZERO).points().to_vec();
        points[RIGHT_EYE_OUTER] = points[LEFT_EYE_OUTER];
        let frame = LandmarkFrame::new(points, CoordinateSpace::normalized(), Duration::ZERO).unwrap();

        let estimate = estimator.estimate(&frame).unwrap();
        assert_eq!(estimate.quality, EstimateQuality::Fallback);
        assert_eq!(estimate.rotation, good.rotation);
        assert!(estimate.rotation.yaw().is_finite());
    }

    #[test]
    fn test_reference_relative_estimation() {
        let face = SyntheticFace::default();
        let mut estimator = estimator();
        let reference = ReferencePose::from_frame(&face.frame(0.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        estimator.set_reference(reference);

        let front = estimator.estimate(&face.frame(0.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        assert!(front.rotation.yaw().abs() < 1e-6);
        assert!(front.rotation.pitch().abs() < 1e-6);

        let left = estimator.estimate(&face.frame(25.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        assert!((left.rotation.yaw() - 25.0).abs() < 1.0, "yaw {}", left.rotation.yaw());

        let right = estimator.estimate(&face.frame(-25.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        assert!((right.rotation.yaw() + 25.0).abs() < 1.0);

        let down = estimator.estimate(&face.frame(0.0, 25.0, 0.0, Duration::ZERO)).unwrap();
        assert!(down.rotation.pitch() > 15.0);
    }

    #[test]
    fn test_reference_survives_distance_change() {
        use crate::{config::OrientationConfig, orientation::{OrientationTarget, OrientationValidator}};

        let mut estimator = estimator();
        let reference = ReferencePose::from_frame(&SyntheticFace::default().frame(0.0, 0.0, 0.0, Duration::ZERO)).unwrap();
        estimator.set_reference(reference);
        let validator = OrientationValidator::new(OrientationConfig::default());

        // User steps back about 5% after the reference was taken
        for scale in [0.25 * 0.99, 0.2375, 0.225, 0.27] {
            let face = SyntheticFace::default().with_scale(scale).unwrap();

            let front = estimator.estimate(&face.frame(1.0, 0.0, 0.0, Duration::ZERO)).unwrap();
            assert!(front.rotation.yaw().abs() < 2.0, "scale {scale}: yaw {}", front.rotation.yaw());
            assert_eq!(validator.classify(&front.rotation), Some(OrientationTarget::Front));

            let up = estimator.estimate(&face.frame(1.0, -25.0, 0.0, Duration::ZERO)).unwrap();
            assert!(up.rotation.yaw().abs() < 2.0, "scale {scale}: yaw {}", up.rotation.yaw());
            assert_eq!(validator.classify(&up.rotation), Some(OrientationTarget::Up));

            let left = estimator.estimate(&face.frame(25.0, 0.0, 0.0, Duration::ZERO)).unwrap();
            assert!((left.rotation.yaw() - 25.0).abs() < 1.0, "scale {scale}: yaw {}", left.rotation.yaw());
        }
    }

    #[test]
    fn test_degenerate_reference_rejected() {
        let face = SyntheticFace::default();
        let mut points = face.frame(0.0, 0.0, 0.0, Duration::ZERO).points().to_vec();
        points[RIGHT_EYE_OUTER] = points[LEFT_EYE_OUTER];
        let frame = LandmarkFrame::new(points, CoordinateSpace::normalized(), Duration::ZERO).unwrap();
        assert!(matches!(ReferencePose::from_frame(&frame), Err(Error::DegenerateGeometry(_))));
    }

    #[test]
    fn test_rotation_estimate_clamps() {
        let estimate = RotationEstimate::new(400.0, f64::NAN, -200.0);
        assert_eq!(estimate.yaw(), 90.0);
        assert_eq!(estimate.pitch(), 0.0);
        assert_eq!(estimate.roll(), -90.0);
    }
}
