//! Constant-velocity Kalman filter for bounding boxes in XYAH space.
//!
//! The 8-dimensional state is `[cx, cy, a, h, vcx, vcy, va, vh]`; the
//! 4-dimensional observation is the box itself, `[cx, cy, a, h]`. Noise is
//! scaled by the current box height so tracks of different sizes get
//! comparable uncertainty.

use nalgebra::{DMatrix, DVector, Matrix4, SMatrix};
use ndarray::{Array1, Array2};
use thiserror::Error;

/// 0.95 quantile of the chi-square distribution, indexed by degrees of
/// freedom (1 through 9). Use `CHI2INV95[4]` to gate a full XYAH
/// measurement and `CHI2INV95[2]` for the position-only distance.
pub const CHI2INV95: [f64; 10] = [
    0.0, 3.8415, 5.9915, 7.8147, 9.4877, 11.070, 12.592, 14.067, 15.507, 16.919,
];

/// Failures of the filter's linear algebra.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("projected covariance is not positive definite")]
    NotPositiveDefinite,

    #[error("measurement contains a non-finite value")]
    NonFiniteMeasurement,

    #[error("track has no filter state")]
    Uninitialized,
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let dt = 1.0;
        let mut motion_mat = Array2::eye(2 * ndim);
        for i in 0..ndim {
            motion_mat[[i, ndim + i]] = dt;
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Create a track state from an unassociated XYAH measurement.
    ///
    /// Velocities start at zero with a large uncertainty.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(8);
        for i in 0..4 {
            mean[i] = measurement[i];
        }

        let h = measurement[3];
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        (mean, diagonal_variance(&std))
    }

    /// Run the prediction step one frame ahead.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];
        let motion_cov = diagonal_variance(&std);

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Project the state distribution into measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = mean[3];
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];
        let innovation_cov = diagonal_variance(&std);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Run the correction step with an XYAH measurement.
    ///
    /// The gain is obtained by a Cholesky solve against the projected
    /// covariance; a covariance that is not positive definite is reported
    /// instead of producing a corrupted state.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>), FilterError> {
        if measurement.iter().any(|m| !m.is_finite()) {
            return Err(FilterError::NonFiniteMeasurement);
        }

        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let s = Matrix4::from_fn(|i, j| projected_cov[[i, j]]);
        let cholesky = s.cholesky().ok_or(FilterError::NotPositiveDefinite)?;

        // K = P * H^T * S^-1, solved as S * K^T = (P * H^T)^T.
        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let pht_t = SMatrix::<f64, 4, 8>::from_fn(|i, j| pht[[j, i]]);
        let gain_t = cholesky.solve(&pht_t);
        let kalman_gain = Array2::from_shape_fn((8, 4), |(i, j)| gain_t[(j, i)]);

        let innovation = Array1::from(measurement.to_vec()) - &projected_mean;

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance =
            covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Ok((new_mean, new_covariance))
    }

    /// Squared Mahalanobis distance between the state distribution and each
    /// XYAH measurement.
    ///
    /// With `only_position` the distance is computed over the box center
    /// alone (2 degrees of freedom). Compare against [`CHI2INV95`] to gate.
    pub fn gating_distance(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurements: &[[f64; 4]],
        only_position: bool,
    ) -> Result<Array1<f64>, FilterError> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let dim = if only_position { 2 } else { 4 };

        let s = DMatrix::from_fn(dim, dim, |i, j| projected_cov[[i, j]]);
        let factor = s.cholesky().ok_or(FilterError::NotPositiveDefinite)?.l();

        let distances = measurements
            .iter()
            .map(|measurement| {
                let d = DVector::from_fn(dim, |i, _| measurement[i] - projected_mean[i]);
                factor
                    .solve_lower_triangular(&d)
                    .map(|z| z.norm_squared())
                    .ok_or(FilterError::NotPositiveDefinite)
            })
            .collect::<Result<Vec<f64>, FilterError>>()?;

        Ok(Array1::from(distances))
    }
}

fn diagonal_variance(std: &[f64]) -> Array2<f64> {
    let mut cov = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        cov[[i, i]] = s * s;
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[3], 50.0);
        assert!(mean.iter().skip(4).all(|&v| v == 0.0));

        // 2 * (1/20) * 50 = 5 -> variance 25; 10 * (1/160) * 50 = 3.125
        assert!((cov[[0, 0]] - 25.0).abs() < 1e-9);
        assert!((cov[[2, 2]] - 1e-4).abs() < 1e-12);
        assert!((cov[[4, 4]] - 3.125 * 3.125).abs() < 1e-9);
        assert!((cov[[6, 6]] - 1e-10).abs() < 1e-15);
        assert_eq!(cov[[0, 1]], 0.0);
    }

    #[test]
    fn test_predict_applies_velocity_and_grows_uncertainty() {
        let kf = KalmanFilter::new();
        let (mut mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        mean[4] = 3.0;
        mean[5] = -2.0;

        let (predicted, predicted_cov) = kf.predict(&mean, &cov);
        assert!((predicted[0] - 103.0).abs() < 1e-9);
        assert!((predicted[1] - 198.0).abs() < 1e-9);
        assert_eq!(predicted[3], 50.0);
        assert!(predicted_cov[[0, 0]] > cov[[0, 0]]);
        // Position and velocity become correlated after one step.
        assert!(predicted_cov[[0, 4]] > 0.0);
    }

    #[test]
    fn test_project_adds_measurement_noise() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        let (projected_mean, projected_cov) = kf.project(&mean, &cov);
        assert_eq!(projected_mean.len(), 4);
        assert_eq!(projected_cov.dim(), (4, 4));
        // 25 + (50 / 20)^2
        assert!((projected_cov[[0, 0]] - 31.25).abs() < 1e-9);
        assert!((projected_cov[[2, 2]] - (1e-4 + 1e-2)).abs() < 1e-12);
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        let (mean, cov) = kf.predict(&mean, &cov);

        let (updated, updated_cov) = kf.update(&mean, &cov, [110.0, 200.0, 0.5, 50.0]).unwrap();
        assert!(updated[0] > 100.0 && updated[0] < 110.0);
        assert!(updated[4] > 0.0, "velocity should pick up the displacement");
        assert!(updated_cov[[0, 0]] < cov[[0, 0]]);
    }

    #[test]
    fn test_update_rejects_indefinite_covariance() {
        let kf = KalmanFilter::new();
        let (mean, _) = kf.initiate([100.0, 200.0, 0.5, 10.0]);
        let covariance = -Array2::<f64>::eye(8);
        assert_eq!(
            kf.update(&mean, &covariance, [100.0, 200.0, 0.5, 10.0]),
            Err(FilterError::NotPositiveDefinite)
        );
    }

    #[test]
    fn test_update_rejects_non_finite_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 10.0]);
        assert_eq!(
            kf.update(&mean, &cov, [f64::NAN, 200.0, 0.5, 10.0]),
            Err(FilterError::NonFiniteMeasurement)
        );
    }

    #[test]
    fn test_gating_distance() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);

        let distances = kf
            .gating_distance(
                &mean,
                &cov,
                &[[100.0, 200.0, 0.5, 50.0], [105.0, 200.0, 0.5, 50.0]],
                false,
            )
            .unwrap();
        assert!(distances[0].abs() < 1e-12);
        // Diagonal projected covariance: 5^2 / 31.25
        assert!((distances[1] - 0.8).abs() < 1e-9);
        assert!(distances[1] < CHI2INV95[4]);
    }

    #[test]
    fn test_gating_distance_position_only_ignores_shape() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);

        let full = kf
            .gating_distance(&mean, &cov, &[[100.0, 200.0, 0.9, 80.0]], false)
            .unwrap();
        let position = kf
            .gating_distance(&mean, &cov, &[[100.0, 200.0, 0.9, 80.0]], true)
            .unwrap();
        assert!(full[0] > CHI2INV95[4]);
        assert!(position[0].abs() < 1e-12);
    }
}
