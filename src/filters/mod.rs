//! Smoothing filters for noisy pitch/yaw estimates.
//!
//! Landmark jitter makes raw angles flicker across band edges; a filter
//! on the validation path keeps holds from breaking on single noisy
//! frames, and one on the gesture path suppresses spurious reversals.

/// Kalman filter with a constant-velocity model
pub mod kalman;

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{Error, Result};

/// Trait for all angle filters
pub trait AngleFilter: Send + Sync {
    /// Apply filter to input angles
    fn apply(&mut self, pitch: f64, yaw: f64) -> (f64, f64);

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl AngleFilter for NoFilter {
    fn apply(&mut self, pitch: f64, yaw: f64) -> (f64, f64) {
        (pitch, yaw)
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create an angle filter from a `name[:param]` spec
///
/// # Errors
///
/// Returns `FilterError` for unknown names or out-of-range parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn AngleFilter>> {
    let spec = spec.trim().to_lowercase();
    let (name, param) = match spec.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (spec.as_str(), None),
    };

    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "kalman" => Ok(Box::new(kalman::KalmanFilter::new())),
        "moving_average" | "movingaverage" => {
            let window = match param {
                Some(p) => p
                    .parse::<usize>()
                    .map_err(|_| Error::FilterError(format!("Window size must be a positive integer: {p}")))?,
                None => 5,
            };
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        "exponential" => {
            let alpha = match param {
                Some(p) => p
                    .parse::<f64>()
                    .map_err(|_| Error::FilterError(format!("Alpha must be a number: {p}")))?,
                None => 0.5,
            };
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        let (pitch, yaw) = filter.apply(10.0, 20.0);
        assert_eq!(pitch, 10.0);
        assert_eq!(yaw, 20.0);
    }

    #[test]
    fn test_create_filter() {
        assert!(create_filter("none").is_ok());
        assert!(create_filter("kalman").is_ok());
        assert!(create_filter("exponential:0.3").is_ok());
        assert!(create_filter("moving_average:4").is_ok());
        assert!(create_filter("unknown").is_err());
    }

    #[test]
    fn test_create_filter_parameters() {
        match create_filter("moving_average:0") {
            Err(Error::FilterError(msg)) => assert!(msg.contains("Window size")),
            _ => panic!("Expected FilterError"),
        }
        match create_filter("exponential:2.0") {
            Err(Error::FilterError(msg)) => assert!(msg.contains("Alpha")),
            _ => panic!("Expected FilterError"),
        }
        assert!(create_filter("exponential:abc").is_err());
        assert!(create_filter("moving_average:-3").is_err());
    }
}
