//! Configuration management for the head pose capture engine

use crate::{
    constants::{
        DEFAULT_ANGLE_THRESHOLD, DEFAULT_BAND_MAX, DEFAULT_GESTURE_COOLDOWN_MS, DEFAULT_GESTURE_HISTORY,
        DEFAULT_GESTURE_MIN_HISTORY, DEFAULT_GESTURE_SAMPLE_INTERVAL, DEFAULT_GUIDE_CENTER, DEFAULT_HOLD_DURATION_MS,
        DEFAULT_JPEG_QUALITY, DEFAULT_MAX_CENTER_OFFSET, DEFAULT_MAX_FACE_RATIO, DEFAULT_MIN_FACE_RATIO,
        DEFAULT_NEUTRAL_PITCH_FRACTION, DEFAULT_NOD_MIN_RANGE, DEFAULT_NOD_MIN_REVERSALS, DEFAULT_NOD_MIN_SAMPLES,
        DEFAULT_NOISE_FLOOR, DEFAULT_OSCILLATION_WINDOW_MS, DEFAULT_PITCH_DEPTH_RATIO, DEFAULT_QUICK_TURN_MIN_DELTA,
        DEFAULT_QUICK_TURN_MIN_SAMPLES, DEFAULT_QUICK_TURN_MIN_VELOCITY, DEFAULT_QUICK_TURN_WINDOW_MS,
        DEFAULT_REFERENCE_PITCH_SCALE, DEFAULT_ROLL_THRESHOLD, DEFAULT_SHAKE_MIN_REVERSALS, DEFAULT_SHAKE_MIN_SAMPLES,
        DEFAULT_YAW_DEPTH_RATIO, MAX_ANGLE,
    },
    filters::create_filter,
    snapshot::SnapshotFormat,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pose estimation configuration
    pub pose: PoseConfig,

    /// Orientation validation configuration
    pub orientation: OrientationConfig,

    /// Stability hold configuration
    pub stability: StabilityConfig,

    /// Capture configuration
    pub capture: CaptureConfig,

    /// Gesture detection configuration
    pub gesture: GestureConfig,

    /// Angle smoothing configuration
    pub filter: FilterConfig,
}

/// Pose estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Landmarks come from a mirrored (selfie) feed
    pub mirrored: bool,

    /// Clamp for every estimated angle (degrees)
    pub max_angle: f64,

    /// Nose protrusion over inter-eye distance
    pub yaw_depth_ratio: f64,

    /// Nose protrusion over forehead-to-chin height
    pub pitch_depth_ratio: f64,

    /// Nose position between forehead and chin when facing the camera
    pub neutral_pitch_fraction: f64,

    /// Degrees per unit of reference-relative pitch ratio
    pub reference_pitch_scale: f64,

    /// Install a reference pose from the first FRONT capture
    pub auto_reference: bool,
}

/// Orientation bands and face bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Off-axis tolerance T (degrees)
    pub angle_threshold: f64,

    /// Maximum head tilt for every target (degrees)
    pub roll_threshold: f64,

    /// LEFT/RIGHT yaw band upper bound; lower bound is `angle_threshold`
    pub turn_max: f64,

    /// UP/DOWN pitch band upper bound; lower bound is `angle_threshold`
    pub tilt_max: f64,

    /// Guide circle center (normalized)
    pub guide_center: (f64, f64),

    /// Maximum face-center distance from the guide center (normalized)
    pub max_center_offset: f64,

    /// Minimum face width as a fraction of frame width
    pub min_face_ratio: f64,

    /// Maximum face width as a fraction of frame width
    pub max_face_ratio: f64,
}

/// Stability hold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Continuous match time required before a capture (milliseconds)
    pub hold_duration_ms: u64,
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Snapshot encoding: "png" or "jpeg"
    pub format: String,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
}

/// Gesture detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Run gesture detection
    pub enabled: bool,

    /// Feed every Nth processed frame to the detector
    pub sample_interval: usize,

    /// Capacity of each yaw/pitch history
    pub history_len: usize,

    /// Minimum spacing between emitted events (milliseconds)
    pub cooldown_ms: u64,

    /// Samples recorded before any gesture is considered
    pub min_history: usize,

    /// Quick turn sub-window (milliseconds)
    pub quick_turn_window_ms: u64,

    /// Minimum yaw change for a quick turn (degrees)
    pub quick_turn_min_delta: f64,

    /// Minimum yaw velocity for a quick turn (degrees per millisecond)
    pub quick_turn_min_velocity: f64,

    /// Samples needed inside the quick turn window
    pub quick_turn_min_samples: usize,

    /// Shake/nod window (milliseconds)
    pub oscillation_window_ms: u64,

    /// Consecutive deltas below this are noise (degrees)
    pub noise_floor: f64,

    /// Sign reversals needed for a shake
    pub shake_min_reversals: usize,

    /// Samples needed inside the oscillation window for a shake
    pub shake_min_samples: usize,

    /// Sign reversals needed for a nod
    pub nod_min_reversals: usize,

    /// Minimum pitch range for a nod (degrees)
    pub nod_min_range: f64,

    /// Samples needed inside the oscillation window for a nod
    pub nod_min_samples: usize,
}

/// Angle smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filter applied before orientation validation
    pub validation: String,

    /// Filter applied before gesture detection
    pub gesture: String,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            mirrored: true,
            max_angle: MAX_ANGLE,
            yaw_depth_ratio: DEFAULT_YAW_DEPTH_RATIO,
            pitch_depth_ratio: DEFAULT_PITCH_DEPTH_RATIO,
            neutral_pitch_fraction: DEFAULT_NEUTRAL_PITCH_FRACTION,
            reference_pitch_scale: DEFAULT_REFERENCE_PITCH_SCALE,
            auto_reference: true,
        }
    }
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            angle_threshold: DEFAULT_ANGLE_THRESHOLD,
            roll_threshold: DEFAULT_ROLL_THRESHOLD,
            turn_max: DEFAULT_BAND_MAX,
            tilt_max: DEFAULT_BAND_MAX,
            guide_center: DEFAULT_GUIDE_CENTER,
            max_center_offset: DEFAULT_MAX_CENTER_OFFSET,
            min_face_ratio: DEFAULT_MIN_FACE_RATIO,
            max_face_ratio: DEFAULT_MAX_FACE_RATIO,
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            hold_duration_ms: DEFAULT_HOLD_DURATION_MS,
        }
    }
}

impl StabilityConfig {
    /// Hold duration as a `Duration`
    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_duration_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: "jpeg".to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CaptureConfig {
    /// Snapshot format described by this section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown format name
    pub fn snapshot_format(&self) -> Result<SnapshotFormat> {
        match self.format.to_lowercase().as_str() {
            "png" => Ok(SnapshotFormat::Png),
            "jpeg" | "jpg" => Ok(SnapshotFormat::Jpeg {
                quality: self.jpeg_quality,
            }),
            other => Err(Error::ConfigError(format!("Unknown snapshot format: {other}"))),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval: DEFAULT_GESTURE_SAMPLE_INTERVAL,
            history_len: DEFAULT_GESTURE_HISTORY,
            cooldown_ms: DEFAULT_GESTURE_COOLDOWN_MS,
            min_history: DEFAULT_GESTURE_MIN_HISTORY,
            quick_turn_window_ms: DEFAULT_QUICK_TURN_WINDOW_MS,
            quick_turn_min_delta: DEFAULT_QUICK_TURN_MIN_DELTA,
            quick_turn_min_velocity: DEFAULT_QUICK_TURN_MIN_VELOCITY,
            quick_turn_min_samples: DEFAULT_QUICK_TURN_MIN_SAMPLES,
            oscillation_window_ms: DEFAULT_OSCILLATION_WINDOW_MS,
            noise_floor: DEFAULT_NOISE_FLOOR,
            shake_min_reversals: DEFAULT_SHAKE_MIN_REVERSALS,
            shake_min_samples: DEFAULT_SHAKE_MIN_SAMPLES,
            nod_min_reversals: DEFAULT_NOD_MIN_REVERSALS,
            nod_min_range: DEFAULT_NOD_MIN_RANGE,
            nod_min_samples: DEFAULT_NOD_MIN_SAMPLES,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            validation: "none".to_string(),
            gesture: "none".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        let pose = &self.pose;
        if !(pose.max_angle > 0.0 && pose.max_angle <= 180.0) {
            return Err(Error::ConfigError("Max angle must be in (0, 180]".to_string()));
        }
        if pose.yaw_depth_ratio <= 0.0 || pose.pitch_depth_ratio <= 0.0 {
            return Err(Error::ConfigError("Depth ratios must be greater than 0".to_string()));
        }
        if !(0.0..=1.0).contains(&pose.neutral_pitch_fraction) {
            return Err(Error::ConfigError(
                "Neutral pitch fraction must be between 0.0 and 1.0".to_string(),
            ));
        }
        if pose.reference_pitch_scale <= 0.0 {
            return Err(Error::ConfigError("Reference pitch scale must be greater than 0".to_string()));
        }

        // Bands start at the FRONT threshold so targets never overlap
        let orientation = &self.orientation;
        if orientation.angle_threshold <= 0.0 || orientation.roll_threshold <= 0.0 {
            return Err(Error::ConfigError("Angle thresholds must be greater than 0".to_string()));
        }
        if orientation.turn_max <= orientation.angle_threshold {
            return Err(Error::ConfigError(format!(
                "Turn band max ({}) must exceed the angle threshold ({})",
                orientation.turn_max, orientation.angle_threshold
            )));
        }
        if orientation.tilt_max <= orientation.angle_threshold {
            return Err(Error::ConfigError(format!(
                "Tilt band max ({}) must exceed the angle threshold ({})",
                orientation.tilt_max, orientation.angle_threshold
            )));
        }
        if orientation.max_center_offset <= 0.0 {
            return Err(Error::ConfigError("Max center offset must be greater than 0".to_string()));
        }
        if !(orientation.min_face_ratio > 0.0
            && orientation.max_face_ratio <= 1.0
            && orientation.min_face_ratio < orientation.max_face_ratio)
        {
            return Err(Error::ConfigError(
                "Face ratio range must satisfy 0 < min < max <= 1".to_string(),
            ));
        }

        if self.stability.hold_duration_ms == 0 {
            return Err(Error::ConfigError("Hold duration must be greater than 0".to_string()));
        }

        if !(1..=100).contains(&self.capture.jpeg_quality) {
            return Err(Error::ConfigError("JPEG quality must be between 1 and 100".to_string()));
        }
        self.capture.snapshot_format()?;

        let gesture = &self.gesture;
        if gesture.sample_interval == 0 {
            return Err(Error::ConfigError("Gesture sample interval must be greater than 0".to_string()));
        }
        if gesture.history_len < 2 {
            return Err(Error::ConfigError("Gesture history must hold at least 2 samples".to_string()));
        }
        if gesture.quick_turn_window_ms == 0 || gesture.oscillation_window_ms == 0 {
            return Err(Error::ConfigError("Gesture windows must be greater than 0".to_string()));
        }
        if gesture.quick_turn_min_velocity <= 0.0 || gesture.nod_min_range <= 0.0 {
            return Err(Error::ConfigError(
                "Gesture velocity and range thresholds must be greater than 0".to_string(),
            ));
        }
        if gesture.shake_min_reversals == 0 || gesture.nod_min_reversals == 0 {
            return Err(Error::ConfigError("Reversal counts must be greater than 0".to_string()));
        }
        if gesture.quick_turn_min_samples < 2 || gesture.shake_min_samples < 3 || gesture.nod_min_samples < 3 {
            return Err(Error::ConfigError(
                "Quick turns need at least 2 samples, shakes and nods at least 3".to_string(),
            ));
        }
        let most_needed = gesture
            .min_history
            .max(gesture.quick_turn_min_samples)
            .max(gesture.shake_min_samples)
            .max(gesture.nod_min_samples);
        if most_needed > gesture.history_len {
            return Err(Error::ConfigError(format!(
                "Gesture history of {} samples cannot hold the {most_needed} a gesture needs",
                gesture.history_len
            )));
        }

        create_filter(&self.filter.validation)
            .map_err(|e| Error::ConfigError(format!("Validation filter: {e}")))?;
        create_filter(&self.filter.gesture).map_err(|e| Error::ConfigError(format!("Gesture filter: {e}")))?;

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Capture Configuration

# Pose estimation
pose:
  mirrored: true
  max_angle: 90.0
  yaw_depth_ratio: 0.5
  pitch_depth_ratio: 0.235294
  neutral_pitch_fraction: 0.5
  reference_pitch_scale: 45.0
  auto_reference: true

# Orientation bands (degrees) and face bounds (normalized)
orientation:
  angle_threshold: 15.0
  roll_threshold: 15.0
  turn_max: 35.0
  tilt_max: 35.0
  guide_center: [0.5, 0.5]
  max_center_offset: 0.2
  min_face_ratio: 0.2
  max_face_ratio: 0.7

# Stability hold
stability:
  hold_duration_ms: 2500

# Snapshot encoding
capture:
  format: "jpeg"
  jpeg_quality: 90

# Gesture detection
gesture:
  enabled: true
  sample_interval: 2
  history_len: 24
  cooldown_ms: 1000
  min_history: 5
  quick_turn_window_ms: 200
  quick_turn_min_delta: 15.0
  quick_turn_min_velocity: 0.15
  quick_turn_min_samples: 3
  oscillation_window_ms: 800
  noise_floor: 1.0
  shake_min_reversals: 2
  shake_min_samples: 6
  nod_min_reversals: 1
  nod_min_range: 10.0
  nod_min_samples: 5

# Angle smoothing (none, exponential[:alpha], moving_average[:window], kalman)
filter:
  validation: "none"
  gesture: "none"
"#;
