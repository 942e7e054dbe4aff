use nalgebra as na;

const DT: f32 = 1.0 / 30.0;
const SIGMA_P: f32 = 0.5;
const SIGMA_V: f32 = 0.1;

/// Constant-velocity Kalman filter over a tracked centroid.
///
/// State is `[x, y, vx, vy]`; only the position is observed. The update
/// step uses a diagonal approximation of the innovation covariance, so the
/// gain never mixes the two measurement axes.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    state: na::Vector4<f32>,
    covariance: na::Matrix4<f32>,
    transition: na::Matrix4<f32>,
    observation: na::Matrix2x4<f32>,
    measurement_noise: na::Matrix2<f32>,
}

impl KalmanFilter {
    pub fn new(x: f32, y: f32) -> Self {
        #[rustfmt::skip]
        let transition = na::Matrix4::new(
            1.0, 0.0, DT, 0.0,
            0.0, 1.0, 0.0, DT,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        #[rustfmt::skip]
        let observation = na::Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        Self {
            state: na::Vector4::new(x, y, 0.0, 0.0),
            covariance: na::Matrix4::from_diagonal(&na::Vector4::new(2.0, 2.0, 50.0, 50.0)),
            transition,
            observation,
            measurement_noise: na::Matrix2::from_diagonal_element(0.05),
        }
    }

    #[inline]
    pub fn position(&self) -> (f32, f32) {
        (self.state[0], self.state[1])
    }

    #[inline]
    pub fn velocity(&self) -> (f32, f32) {
        (self.state[2], self.state[3])
    }

    /// Advance the state one frame. Process noise scales with the current
    /// speed estimate: a fast target gets more positional slack and a
    /// tighter velocity band.
    pub fn predict(&mut self) {
        let speed = self.state[2].hypot(self.state[3]);
        let scale = 1.0 + speed / 100.0;
        let sp = SIGMA_P * scale;
        let sv = SIGMA_V / scale;

        let process_noise =
            na::Matrix4::from_diagonal(&na::Vector4::new(sp, sp, sv, sv));

        self.state = self.transition * self.state;
        self.covariance =
            self.transition * self.covariance * self.transition.transpose() + process_noise;
    }

    /// Fold in an observed centroid.
    pub fn update(&mut self, x: f32, y: f32) {
        let measurement = na::Vector2::new(x, y);
        let innovation = measurement - self.observation * self.state;

        let s = self.observation * self.covariance * self.observation.transpose()
            + self.measurement_noise;
        // Diagonal-only inverse of the innovation covariance.
        let s_inv = na::Matrix2::from_diagonal(&na::Vector2::new(
            1.0 / s[(0, 0)],
            1.0 / s[(1, 1)],
        ));

        let gain = self.covariance * self.observation.transpose() * s_inv;

        self.state += gain * innovation;
        self.covariance =
            (na::Matrix4::identity() - gain * self.observation) * self.covariance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_has_zero_velocity() {
        let f = KalmanFilter::new(10.0, 20.0);
        assert_eq!(f.position(), (10.0, 20.0));
        assert_eq!(f.velocity(), (0.0, 0.0));
    }

    #[test]
    fn converges_on_a_stationary_target() {
        let mut f = KalmanFilter::new(95.0, 105.0);
        for _ in 0..30 {
            f.predict();
            f.update(100.0, 100.0);
        }

        let (x, y) = f.position();
        assert!((x - 100.0).abs() < 1.0);
        assert!((y - 100.0).abs() < 1.0);
    }

    #[test]
    fn tracks_velocity_direction_of_a_moving_target() {
        let mut f = KalmanFilter::new(0.0, 0.0);
        for step in 1..=60 {
            f.predict();
            f.update(step as f32 * 2.0, 0.0);
        }

        let (vx, vy) = f.velocity();
        assert!(vx > 0.0);
        assert!(vy.abs() < vx);
    }

    #[test]
    fn updates_shrink_positional_uncertainty() {
        let mut f = KalmanFilter::new(0.0, 0.0);
        let before = f.covariance[(0, 0)];

        f.predict();
        f.update(0.0, 0.0);
        f.predict();
        f.update(0.0, 0.0);

        assert!(f.covariance[(0, 0)] < before);
    }
}
