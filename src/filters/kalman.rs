use super::AngleFilter;
use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

type Matrix2x4<T> = nalgebra::Matrix<T, nalgebra::U2, nalgebra::U4, nalgebra::ArrayStorage<T, 2, 4>>;

/// Constant-velocity Kalman filter over (pitch, yaw)
pub struct KalmanFilter {
    // State: [pitch, yaw, pitch_rate, yaw_rate]
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    transition: Matrix4<f64>,
    measurement: Matrix2x4<f64>,
}

impl KalmanFilter {
    /// Filter tuned for a 30 FPS camera
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame_rate(30.0, 0.1, 1.0)
    }

    /// Filter for a given frame rate, process noise `q` and measurement noise `r`
    pub fn with_frame_rate(fps: f64, q: f64, r: f64) -> Self {
        let dt = 1.0 / fps.max(1.0);

        let transition = Matrix4::new(
            1.0, 0.0, dt, 0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        // Only the angles are measured
        let measurement = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        let process_noise = Matrix4::new(
            q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0, 0.0,
            0.0, q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0,
            q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2), 0.0,
            0.0, q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2),
        );

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity() * 1000.0,
            process_noise,
            measurement_noise: Matrix2::identity() * r,
            transition,
            measurement,
        }
    }

    fn predict(&mut self) {
        self.state = self.transition * self.state;
        self.covariance = self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    fn update(&mut self, observed: Vector2<f64>) {
        let innovation = observed - self.measurement * self.state;
        let innovation_cov = self.measurement * self.covariance * self.measurement.transpose() + self.measurement_noise;

        // Singular innovation covariance: keep the prediction
        let Some(inverse) = innovation_cov.try_inverse() else {
            return;
        };
        let gain = self.covariance * self.measurement.transpose() * inverse;

        self.state += gain * innovation;
        self.covariance = (Matrix4::identity() - gain * self.measurement) * self.covariance;
    }
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl AngleFilter for KalmanFilter {
    fn apply(&mut self, pitch: f64, yaw: f64) -> (f64, f64) {
        self.predict();
        self.update(Vector2::new(pitch, yaw));
        (self.state[0], self.state[1])
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity() * 1000.0;
    }

    fn name(&self) -> &str {
        "KalmanFilter"
    }
}
