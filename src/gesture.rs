//! Head gesture detection from a rolling pose history.
//!
//! Yaw and pitch are kept in two bounded histories. Each new sample is
//! checked for a quick turn, a shake and a nod, in that priority order,
//! behind one cooldown shared by every gesture type. Nothing is reported
//! until the history and the relevant window hold enough readings, so a
//! single landmark jump cannot pass for a gesture.

use crate::{config::GestureConfig, pose_estimation::RotationEstimate};
use log::{debug, info};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// One down-sampled pose reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub yaw: f64,
    pub pitch: f64,
    pub timestamp: Duration,
}

impl MotionSample {
    /// Sample the yaw and pitch of an estimate
    pub fn from_rotation(rotation: &RotationEstimate, timestamp: Duration) -> Self {
        Self {
            yaw: rotation.yaw(),
            pitch: rotation.pitch(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    QuickLeftTurn,
    QuickRightTurn,
    HeadShake,
    HeadNod,
}

impl GestureKind {
    /// Event name as published
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuickLeftTurn => "QUICK_LEFT_TURN",
            Self::QuickRightTurn => "QUICK_RIGHT_TURN",
            Self::HeadShake => "HEAD_SHAKE",
            Self::HeadNod => "HEAD_NOD",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistical summary of a sample window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Mean value of the data
    pub mean: f64,
    /// Standard deviation of the data
    pub std_dev: f64,
    /// Minimum value in the window
    pub min: f64,
    /// Maximum value in the window
    pub max: f64,
    /// Range (max - min) of the data
    pub range: f64,
}

impl WindowStats {
    /// Statistics over `values`, `None` when empty
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            range: max - min,
        })
    }
}

/// Measurements that triggered an event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvidence {
    /// Samples in the evaluated window
    pub samples: usize,
    /// Direction reversals (0 for quick turns)
    pub reversals: usize,
    /// Last minus first angle in the window (degrees)
    pub delta: f64,
    /// Mean angular speed over the window (degrees per millisecond)
    pub velocity: f64,
    pub stats: WindowStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    /// In `[0, 1]`
    pub confidence: f64,
    pub detected_at: Duration,
    pub evidence: GestureEvidence,
}

#[derive(Debug, Clone, Copy)]
struct TimedAngle {
    value: f64,
    timestamp: Duration,
}

/// Quick turn, shake and nod detector
pub struct GestureDetector {
    config: GestureConfig,
    yaw_history: VecDeque<TimedAngle>,
    pitch_history: VecDeque<TimedAngle>,
    frames_seen: usize,
    last_event: Option<Duration>,
}

impl GestureDetector {
    /// Detector with empty histories
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        let capacity = config.history_len.max(2);
        Self {
            config,
            yaw_history: VecDeque::with_capacity(capacity),
            pitch_history: VecDeque::with_capacity(capacity),
            frames_seen: 0,
            last_event: None,
        }
    }

    /// Thresholds in use
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Samples currently held
    pub fn history_len(&self) -> usize {
        self.yaw_history.len()
    }

    /// Feed one processed frame; only every `sample_interval`th frame is sampled
    pub fn offer(&mut self, rotation: &RotationEstimate, timestamp: Duration) -> Option<GestureEvent> {
        let sampled = self.frames_seen % self.config.sample_interval.max(1) == 0;
        self.frames_seen = self.frames_seen.wrapping_add(1);
        if !sampled {
            return None;
        }
        self.add_sample(MotionSample::from_rotation(rotation, timestamp))
    }

    /// Record a sample and run detection
    pub fn add_sample(&mut self, sample: MotionSample) -> Option<GestureEvent> {
        let capacity = self.config.history_len.max(2);
        push_capped(&mut self.yaw_history, sample.yaw, sample.timestamp, capacity);
        push_capped(&mut self.pitch_history, sample.pitch, sample.timestamp, capacity);

        let now = sample.timestamp;
        if self.in_cooldown(now) || self.yaw_history.len() < self.config.min_history {
            return None;
        }

        let event = self
            .detect_quick_turn(now)
            .or_else(|| self.detect_shake(now))
            .or_else(|| self.detect_nod(now))?;

        info!(
            "Gesture {} (confidence {:.2}, {} reversals)",
            event.kind, event.confidence, event.evidence.reversals
        );
        self.last_event = Some(now);
        Some(event)
    }

    /// Clear both histories and the cooldown
    pub fn reset(&mut self) {
        self.yaw_history.clear();
        self.pitch_history.clear();
        self.frames_seen = 0;
        self.last_event = None;
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    fn in_cooldown(&self, now: Duration) -> bool {
        self.last_event
            .is_some_and(|last| now.saturating_sub(last) < self.cooldown())
    }

    /// Samples inside `span` before `now`
    ///
    /// Motion recorded during a cooldown is dropped rather than reported
    /// once the cooldown ends, so every event needs fresh evidence.
    fn window(&self, history: &VecDeque<TimedAngle>, now: Duration, span_ms: u64) -> Vec<TimedAngle> {
        let start = now.saturating_sub(Duration::from_millis(span_ms));
        let floor = self.last_event.map_or(Duration::ZERO, |last| last + self.cooldown());
        history
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp >= floor && s.timestamp <= now)
            .copied()
            .collect()
    }

    fn detect_quick_turn(&self, now: Duration) -> Option<GestureEvent> {
        let window = self.window(&self.yaw_history, now, self.config.quick_turn_window_ms);
        if window.len() < self.config.quick_turn_min_samples.max(2) {
            return None;
        }
        let (first, last) = (window.first()?, window.last()?);
        let elapsed_ms = last.timestamp.saturating_sub(first.timestamp).as_secs_f64() * 1000.0;
        if elapsed_ms <= 0.0 {
            return None;
        }

        let delta = last.value - first.value;
        let velocity = delta.abs() / elapsed_ms;
        if delta.abs() < self.config.quick_turn_min_delta || velocity < self.config.quick_turn_min_velocity {
            return None;
        }

        // Positive yaw is a turn to the subject's left
        let kind = if delta > 0.0 {
            GestureKind::QuickLeftTurn
        } else {
            GestureKind::QuickRightTurn
        };
        let values: Vec<f64> = window.iter().map(|s| s.value).collect();
        Some(GestureEvent {
            kind,
            confidence: (velocity / (2.0 * self.config.quick_turn_min_velocity)).min(1.0),
            detected_at: now,
            evidence: GestureEvidence {
                samples: window.len(),
                reversals: 0,
                delta,
                velocity,
                stats: WindowStats::from_values(&values)?,
            },
        })
    }

    fn detect_shake(&self, now: Duration) -> Option<GestureEvent> {
        let (evidence, values) = self.oscillation(&self.yaw_history, now, self.config.shake_min_samples)?;
        if evidence.reversals < self.config.shake_min_reversals {
            return None;
        }
        debug!("Shake window: {values:?}");

        #[allow(clippy::cast_precision_loss)]
        let confidence = evidence.reversals as f64 / (2 * self.config.shake_min_reversals) as f64;
        Some(GestureEvent {
            kind: GestureKind::HeadShake,
            confidence: confidence.min(1.0),
            detected_at: now,
            evidence,
        })
    }

    fn detect_nod(&self, now: Duration) -> Option<GestureEvent> {
        let (evidence, values) = self.oscillation(&self.pitch_history, now, self.config.nod_min_samples)?;
        if evidence.reversals < self.config.nod_min_reversals || evidence.stats.range < self.config.nod_min_range {
            return None;
        }
        debug!("Nod window: {values:?}");

        #[allow(clippy::cast_precision_loss)]
        let reversal_ratio = evidence.reversals as f64 / (2 * self.config.nod_min_reversals) as f64;
        let range_ratio = evidence.stats.range / self.config.nod_min_range;
        Some(GestureEvent {
            kind: GestureKind::HeadNod,
            confidence: (reversal_ratio * range_ratio).min(1.0),
            detected_at: now,
            evidence,
        })
    }

    /// Reversal evidence over the oscillation window, `None` below `min_samples` readings
    fn oscillation(
        &self,
        history: &VecDeque<TimedAngle>,
        now: Duration,
        min_samples: usize,
    ) -> Option<(GestureEvidence, Vec<f64>)> {
        let window = self.window(history, now, self.config.oscillation_window_ms);
        if window.len() < min_samples.max(3) {
            return None;
        }

        let values: Vec<f64> = window.iter().map(|s| s.value).collect();
        let (first, last) = (window.first()?, window.last()?);
        let elapsed_ms = last.timestamp.saturating_sub(first.timestamp).as_secs_f64() * 1000.0;
        let travel: f64 = values.windows(2).map(|pair| (pair[1] - pair[0]).abs()).sum();

        let evidence = GestureEvidence {
            samples: window.len(),
            reversals: count_reversals(&values, self.config.noise_floor),
            delta: last.value - first.value,
            velocity: if elapsed_ms > 0.0 { travel / elapsed_ms } else { 0.0 },
            stats: WindowStats::from_values(&values)?,
        };
        Some((evidence, values))
    }
}

fn push_capped(history: &mut VecDeque<TimedAngle>, value: f64, timestamp: Duration, capacity: usize) {
    while history.len() >= capacity {
        history.pop_front();
    }
    history.push_back(TimedAngle { value, timestamp });
}

/// Sign changes between consecutive deltas; deltas under `noise_floor` are skipped
pub fn count_reversals(values: &[f64], noise_floor: f64) -> usize {
    let mut reversals = 0;
    let mut last_sign = 0.0;
    for pair in values.windows(2) {
        let delta = pair[1] - pair[0];
        if delta.abs() < noise_floor {
            continue;
        }
        let sign = delta.signum();
        if last_sign != 0.0 && sign != last_sign {
            reversals += 1;
        }
        last_sign = sign;
    }
    reversals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(yaw: f64, pitch: f64, ms: u64) -> MotionSample {
        MotionSample {
            yaw,
            pitch,
            timestamp: Duration::from_millis(ms),
        }
    }

    fn detector() -> GestureDetector {
        GestureDetector::new(GestureConfig::default())
    }

    /// Feed `(yaw, pitch)` pairs 100 ms apart starting at `start_ms`
    fn feed(detector: &mut GestureDetector, start_ms: u64, angles: &[(f64, f64)]) -> Vec<GestureEvent> {
        angles
            .iter()
            .enumerate()
            .filter_map(|(i, &(yaw, pitch))| detector.add_sample(sample(yaw, pitch, start_ms + 100 * i as u64)))
            .collect()
    }

    #[test]
    fn test_window_stats() {
        let stats = WindowStats::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.range, 4.0);
        assert!((stats.std_dev - std::f64::consts::SQRT_2).abs() < 1e-10);
        assert!(WindowStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_count_reversals_ignores_noise() {
        assert_eq!(count_reversals(&[0.0, 5.0, 0.0, 5.0], 1.0), 2);
        assert_eq!(count_reversals(&[0.0, 5.0, 5.5, 6.0, 0.0], 1.0), 1);
        assert_eq!(count_reversals(&[0.0, 0.5, 0.0, 0.5, 0.0], 1.0), 0);
        assert_eq!(count_reversals(&[0.0, 1.0, 2.0, 3.0], 1.0), 0);
    }

    #[test]
    fn test_still_head_emits_nothing() {
        let mut detector = detector();
        let events = feed(&mut detector, 0, &[(0.0, 0.0); 30]);
        assert!(events.is_empty());
    }

    /// Head resting at zero for five readings, then a shake
    const SHAKE: [(f64, f64); 6] = [(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (8.0, 0.0), (-4.0, 0.0), (8.0, 0.0)];

    #[test]
    fn test_quick_left_turn() {
        let mut detector = detector();
        for ms in [0, 50, 100, 150] {
            assert!(detector.add_sample(sample(0.0, 0.0, ms)).is_none());
        }
        // 20 degrees over the full window is too slow
        assert!(detector.add_sample(sample(20.0, 0.0, 200)).is_none());
        let event = detector.add_sample(sample(40.0, 0.0, 250)).unwrap();
        assert_eq!(event.kind, GestureKind::QuickLeftTurn);
        assert!((event.evidence.delta - 40.0).abs() < 1e-9);
        assert_eq!(event.evidence.samples, 5);
        assert!(event.confidence > 0.0 && event.confidence <= 1.0);
        assert_eq!(event.detected_at, Duration::from_millis(250));
    }

    #[test]
    fn test_quick_right_turn() {
        let mut detector = detector();
        assert!(feed(&mut detector, 0, &[(0.0, 0.0); 4]).is_empty());
        let event = detector.add_sample(sample(-40.0, 0.0, 400)).unwrap();
        assert_eq!(event.kind, GestureKind::QuickRightTurn);
        assert_eq!(event.evidence.samples, 3);
        // 0.2 deg/ms against a 0.15 threshold
        assert!((event.confidence - 0.2 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_single_jump_is_not_a_turn() {
        let mut detector = detector();
        assert!(detector.add_sample(sample(0.0, 0.0, 0)).is_none());
        assert!(detector.add_sample(sample(16.0, 0.0, 66)).is_none());
    }

    #[test]
    fn test_sparse_window_is_not_a_turn() {
        let mut detector = detector();
        for ms in [0, 300, 600, 900] {
            detector.add_sample(sample(0.0, 0.0, ms));
        }
        // Only two readings fall inside the 200 ms window
        assert!(detector.add_sample(sample(40.0, 0.0, 1100)).is_none());

        let config = GestureConfig {
            quick_turn_min_samples: 2,
            ..GestureConfig::default()
        };
        let mut lenient = GestureDetector::new(config);
        for ms in [0, 300, 600, 900] {
            lenient.add_sample(sample(0.0, 0.0, ms));
        }
        let event = lenient.add_sample(sample(40.0, 0.0, 1100)).unwrap();
        assert_eq!(event.kind, GestureKind::QuickLeftTurn);
    }

    #[test]
    fn test_slow_turn_is_not_quick() {
        let mut detector = detector();
        // 5 degrees per 100 ms never reaches the minimum delta inside one window
        let angles: Vec<(f64, f64)> = (0..10).map(|i| (5.0 * f64::from(i), 0.0)).collect();
        assert!(feed(&mut detector, 0, &angles).is_empty());
    }

    #[test]
    fn test_head_shake() {
        let mut detector = detector();
        let events = feed(&mut detector, 0, &SHAKE);
        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.kind, GestureKind::HeadShake);
        assert_eq!(event.evidence.reversals, 2);
        assert_eq!(event.evidence.samples, 6);
        assert!((event.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_short_shake_needs_more_readings() {
        let mut detector = detector();
        // Two reversals, but only five readings in the window
        let events = feed(&mut detector, 0, &[(0.0, 0.0), (0.0, 0.0), (8.0, 0.0), (-4.0, 0.0), (8.0, 0.0)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_head_nod() {
        let mut detector = detector();
        let events = feed(&mut detector, 0, &[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 12.0), (0.0, 0.0)]);
        assert_eq!(events.len(), 1);
        let event = events[0];
        assert_eq!(event.kind, GestureKind::HeadNod);
        assert!((event.evidence.stats.range - 12.0).abs() < 1e-9);
        assert!((event.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_shallow_nod_ignored() {
        let mut detector = detector();
        let events = feed(&mut detector, 0, &[(0.0, 0.0), (0.0, 0.0), (0.0, 6.0), (0.0, 0.0), (0.0, 6.0), (0.0, 0.0)]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_quick_turn_takes_priority() {
        let mut detector = detector();
        // Pitch oscillates enough for a nod on the same sample as a fast turn
        let events = feed(&mut detector, 0, &[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (0.0, 12.0), (40.0, 0.0)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, GestureKind::QuickLeftTurn);
    }

    #[test]
    fn test_history_is_capped() {
        let mut detector = detector();
        feed(&mut detector, 0, &[(0.0, 0.0); 40]);
        assert_eq!(detector.history_len(), GestureConfig::default().history_len);
    }

    #[test]
    fn test_offer_down_samples() {
        let config = GestureConfig {
            sample_interval: 3,
            ..GestureConfig::default()
        };
        let mut detector = GestureDetector::new(config);
        let rotation = RotationEstimate::neutral();
        for i in 0..9u64 {
            detector.offer(&rotation, Duration::from_millis(33 * i));
        }
        assert_eq!(detector.history_len(), 3);
    }

    #[test]
    fn test_reset_clears_cooldown() {
        let mut detector = detector();
        assert_eq!(feed(&mut detector, 0, &SHAKE).len(), 1);
        detector.reset();
        assert_eq!(detector.history_len(), 0);
        let events = feed(&mut detector, 600, &SHAKE);
        assert_eq!(events.len(), 1);
    }
}
