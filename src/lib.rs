//! Head-pose interaction engine for guided multi-angle face capture.
//!
//! This library turns per-frame facial landmarks from an external
//! face-mesh detector into:
//! - a head rotation estimate (yaw, pitch, roll) from landmark geometry
//! - a guided capture session that photographs the face looking FRONT,
//!   LEFT, RIGHT, UP and DOWN, each after a wall-clock stability hold
//! - discrete head gestures (quick turns, shakes, nods) fanned out to
//!   any number of listeners
//!
//! The engine is single-threaded and frame-driven: call
//! [`app::HeadPoseApp::process_frame`] once per camera frame.
//!
//! # Examples
//!
//! ## Capture session
//!
//! ```no_run
//! use head_pose_capture::{
//!     app::HeadPoseApp, capture::ChannelSink, config::Config, landmarks::LandmarkFrame,
//!     snapshot::ImageFrameSource,
//! };
//!
//! # fn next_frame() -> Option<(LandmarkFrame, image::RgbImage)> { None }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, uploads) = ChannelSink::new();
//! let mut app = HeadPoseApp::new(&Config::default())?.with_sink(Box::new(sink));
//! let mut source = ImageFrameSource::new();
//!
//! app.camera_started();
//! app.start_session()?;
//!
//! while let Some((landmarks, image)) = next_frame() {
//!     source.push(image);
//!     let report = app.process_frame(&landmarks, &mut source);
//!     println!("{} {:?} {:.0}%", report.state, report.guidance, report.hold_progress * 100.0);
//! }
//!
//! if let Ok(captures) = uploads.try_recv() {
//!     println!("{} directions captured", captures.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Gesture events
//!
//! ```
//! use head_pose_capture::{app::HeadPoseApp, config::Config, gesture::GestureKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = HeadPoseApp::new(&Config::default())?;
//! let subscription = app.events().subscribe(|event| {
//!     if event.kind == GestureKind::HeadNod {
//!         println!("confirmed ({:.2})", event.confidence);
//!     }
//!     Ok(())
//! });
//! subscription.unsubscribe();
//! # Ok(())
//! # }
//! ```

/// Landmark frames from the external detector
pub mod landmarks;

/// Head rotation estimation from landmark geometry
pub mod pose_estimation;

/// Orientation targets, bands and face bounds
pub mod orientation;

/// Wall-clock stability hold
pub mod stability;

/// Capture state machine and capture delivery
pub mod capture;

/// Snapshot sources and encoding
pub mod snapshot;

/// Quick turn, shake and nod detection
pub mod gesture;

/// Typed publish/subscribe
pub mod event_bus;

/// Signal filtering algorithms for smoothing pose estimates
pub mod filters;

/// Frame-driven engine facade
pub mod app;

/// Synthetic landmark frames
pub mod synthetic;

/// Scripted head motion
pub mod script;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
