use super::AngleFilter;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<(f64, f64)>,
}

impl ExponentialFilter {
    /// # Panics
    ///
    /// Panics if `alpha` is outside `(0, 1]`; use [`super::create_filter`]
    /// for checked construction.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }
}

impl AngleFilter for ExponentialFilter {
    fn apply(&mut self, pitch: f64, yaw: f64) -> (f64, f64) {
        let filtered = match self.last {
            Some((last_pitch, last_yaw)) => (
                self.alpha * pitch + (1.0 - self.alpha) * last_pitch,
                self.alpha * yaw + (1.0 - self.alpha) * last_yaw,
            ),
            None => (pitch, yaw),
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
