//! Wall-clock stability hold.
//!
//! Progress is a pure function of the window start, the current time and
//! the required duration, re-evaluated on every tick. The only state is
//! the optional active window.

use crate::{config::StabilityConfig, orientation::OrientationTarget};
use log::debug;
use std::time::Duration;

/// Fraction of `required` elapsed since `started_at`, in `[0, 1]`
///
/// A clock that appears to run backwards counts as no progress.
pub fn hold_progress(started_at: Duration, now: Duration, required: Duration) -> f64 {
    if required.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_sub(started_at);
    (elapsed.as_secs_f64() / required.as_secs_f64()).min(1.0)
}

/// An uninterrupted match for one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityWindow {
    pub target: OrientationTarget,
    pub started_at: Duration,
    completed: bool,
}

/// Result of feeding one validator outcome to the timer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HoldTick {
    /// No match, no window
    Idle,
    Holding { progress: f64 },
    /// The hold just reached the required duration; reported once per window
    Completed,
}

impl HoldTick {
    /// Hold progress in `[0, 1]`
    pub fn progress(&self) -> f64 {
        match *self {
            Self::Idle => 0.0,
            Self::Holding { progress } => progress,
            Self::Completed => 1.0,
        }
    }
}

pub struct StabilityTimer {
    required: Duration,
    window: Option<StabilityWindow>,
}

impl StabilityTimer {
    /// Timer using the configured hold duration
    #[must_use]
    pub fn new(config: &StabilityConfig) -> Self {
        Self::with_duration(config.hold_duration())
    }

    /// Timer requiring `required` of continuous match
    pub fn with_duration(required: Duration) -> Self {
        Self { required, window: None }
    }

    /// Hold duration needed for a capture
    pub fn required(&self) -> Duration {
        self.required
    }

    /// Active hold window, if any
    pub fn window(&self) -> Option<&StabilityWindow> {
        self.window.as_ref()
    }

    /// Progress of the active window at `now`, 0 without one
    pub fn progress(&self, now: Duration) -> f64 {
        self.window
            .map_or(0.0, |w| hold_progress(w.started_at, now, self.required))
    }

    /// Feed the validator outcome for `target` at monotonic time `now`
    pub fn update(&mut self, target: OrientationTarget, matched: bool, now: Duration) -> HoldTick {
        if !matched {
            if let Some(window) = self.window.take() {
                if !window.completed {
                    debug!("Hold on {} broken after {:?}", window.target, now.saturating_sub(window.started_at));
                }
            }
            return HoldTick::Idle;
        }

        if self.window.map_or(true, |w| w.target != target) {
            self.window = Some(StabilityWindow {
                target,
                started_at: now,
                completed: false,
            });
        }
        let Some(window) = self.window.as_mut() else {
            return HoldTick::Idle;
        };

        let progress = hold_progress(window.started_at, now, self.required);
        if progress >= 1.0 && !window.completed {
            window.completed = true;
            HoldTick::Completed
        } else {
            HoldTick::Holding { progress }
        }
    }

    /// Discard the active window; the next match starts from zero
    pub fn reset(&mut self) {
        self.window = None;
    }
}
