//! Error types for the head pose capture library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// The frame carries fewer landmarks than the estimator needs
    #[error("No face detected: {found} landmarks, need at least {required}")]
    NoFaceDetected {
        /// Landmarks present in the frame
        found: usize,
        /// Minimum landmark count required
        required: usize,
    },

    /// Landmark geometry collapsed (e.g. eye distance close to zero)
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Snapshot could not be taken or encoded
    #[error("Capture failure: {0}")]
    CaptureFailure(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Camera or landmark model has not signalled readiness
    #[error("Camera pipeline is not ready")]
    PipelineNotReady,

    /// An event subscriber failed while handling an event
    #[error("Subscriber error: {0}")]
    Subscriber(String),

    /// Filter initialization error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the condition only degrades the current frame and the
    /// engine can carry on with the next one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoFaceDetected { .. }
                | Self::DegenerateGeometry(_)
                | Self::CaptureFailure(_)
                | Self::Subscriber(_)
                | Self::PipelineNotReady
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
