//! Constants used throughout the library

/// Nose tip landmark (468-point face mesh)
pub const NOSE_TIP: usize = 1;

/// Outer corner of the eye on the image-left side
pub const LEFT_EYE_OUTER: usize = 33;

/// Outer corner of the eye on the image-right side
pub const RIGHT_EYE_OUTER: usize = 263;

/// Top of the forehead on the face midline
pub const FOREHEAD: usize = 10;

/// Bottom of the chin on the face midline
pub const CHIN: usize = 152;

/// Number of points produced by the face mesh model
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Smallest frame that contains every anchor index above
pub const MIN_REQUIRED_LANDMARKS: usize = RIGHT_EYE_OUTER + 1;

/// Orientation thresholds (degrees)
pub const DEFAULT_ANGLE_THRESHOLD: f64 = 15.0;
pub const DEFAULT_ROLL_THRESHOLD: f64 = 15.0;
pub const DEFAULT_BAND_MAX: f64 = 35.0;

/// Practical clamp for every estimated angle (degrees)
pub const MAX_ANGLE: f64 = 90.0;

/// Nose protrusion over outer inter-eye distance
pub const DEFAULT_YAW_DEPTH_RATIO: f64 = 0.5;

/// Nose protrusion over forehead-to-chin height
pub const DEFAULT_PITCH_DEPTH_RATIO: f64 = 0.4 / 1.7;

/// Nose tip position between forehead and chin when facing the camera
pub const DEFAULT_NEUTRAL_PITCH_FRACTION: f64 = 0.5;

/// Degrees per unit change of the reference-relative pitch ratio
pub const DEFAULT_REFERENCE_PITCH_SCALE: f64 = 45.0;

/// Stability hold
pub const DEFAULT_HOLD_DURATION_MS: u64 = 2500;

/// Gesture detection defaults
pub const DEFAULT_GESTURE_COOLDOWN_MS: u64 = 1000;
pub const DEFAULT_GESTURE_HISTORY: usize = 24;
pub const DEFAULT_GESTURE_SAMPLE_INTERVAL: usize = 2;
pub const DEFAULT_QUICK_TURN_WINDOW_MS: u64 = 200;
pub const DEFAULT_QUICK_TURN_MIN_DELTA: f64 = 15.0;
pub const DEFAULT_QUICK_TURN_MIN_VELOCITY: f64 = 0.15;
pub const DEFAULT_OSCILLATION_WINDOW_MS: u64 = 800;
pub const DEFAULT_NOISE_FLOOR: f64 = 1.0;
pub const DEFAULT_SHAKE_MIN_REVERSALS: usize = 2;
pub const DEFAULT_NOD_MIN_REVERSALS: usize = 1;
pub const DEFAULT_NOD_MIN_RANGE: f64 = 10.0;
pub const DEFAULT_GESTURE_MIN_HISTORY: usize = 5;
pub const DEFAULT_QUICK_TURN_MIN_SAMPLES: usize = 3;
pub const DEFAULT_SHAKE_MIN_SAMPLES: usize = 6;
pub const DEFAULT_NOD_MIN_SAMPLES: usize = 5;

/// Face bounds defaults (normalized frame units)
pub const DEFAULT_GUIDE_CENTER: (f64, f64) = (0.5, 0.5);
pub const DEFAULT_MAX_CENTER_OFFSET: f64 = 0.2;
pub const DEFAULT_MIN_FACE_RATIO: f64 = 0.2;
pub const DEFAULT_MAX_FACE_RATIO: f64 = 0.7;

/// Default JPEG quality for snapshots
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-9;
