//! Unscented Kalman filter on manifolds.
//!
//! Jacobian-free: both steps retract scaled sigma points onto the manifold
//! through the group's plus, push them through the model, and lift the spread
//! back with minus. Control noise enters through a second sigma-point set in
//! control space, so the motion model's noise Jacobian is never needed.
//!
//! The propagated mean is the on-manifold weighted mean of the sigma points,
//! found by fixed-point iteration on the retraction; the iteration is bounded
//! and reports [`FilterError::MeanNotConverged`] instead of looping.

use crate::filters::{check_control, check_measurement, FilterError, FilterResult, KalmanFilter};
use crate::linalg::{self, LinAlgError};
use crate::manifold::{LieGroup, Tangent};
use crate::models::{MeasurementModel, SystemModel};
use nalgebra::{DMatrix, DVector};

const MEAN_MAX_ITERATIONS: usize = 100;
const MEAN_TOLERANCE: f64 = 1e-9;

/// Sigma-point spread parameters.
///
/// `alpha` scales the sigma-point offsets to `alpha·√d` standard deviations.
/// The remaining classic parameters are fixed: `kappa` through
/// `lambda = (alpha² − 1)·d`, and `beta = 2` (Gaussian prior) in the central
/// covariance weight.
#[derive(Clone, Copy, Debug)]
pub struct UnscentedParams {
    alpha: f64,
}

impl UnscentedParams {
    /// Create with the given spread scale.
    ///
    /// # Panics
    /// Panics unless `0 < alpha <= 1`.
    pub fn new(alpha: f64) -> Self {
        assert!(
            alpha > 0.0 && alpha <= 1.0,
            "sigma-point spread alpha must be in (0, 1]"
        );
        UnscentedParams { alpha }
    }

    /// Weights for a `d`-dimensional sigma-point set:
    /// `(scale, w_mean_center, w_cov_center, w_other)`.
    fn weights(&self, d: usize) -> (f64, f64, f64, f64) {
        let d = d as f64;
        let lambda = (self.alpha * self.alpha - 1.0) * d;
        let scale = (d + lambda).sqrt();
        let w_mean_center = lambda / (d + lambda);
        let w_cov_center = w_mean_center + 3.0 - self.alpha * self.alpha;
        let w_other = 1.0 / (2.0 * (d + lambda));
        (scale, w_mean_center, w_cov_center, w_other)
    }
}

impl Default for UnscentedParams {
    fn default() -> Self {
        UnscentedParams { alpha: 1.0 }
    }
}

/// Unscented Kalman filter on a Lie group state.
#[derive(Clone, Debug)]
pub struct Ukfm<S: LieGroup> {
    state: S,
    covariance: DMatrix<f64>,
    params: UnscentedParams,
}

impl<S: LieGroup> Ukfm<S> {
    /// Create the filter with default sigma-point parameters.
    pub fn new(state: S, covariance: DMatrix<f64>) -> FilterResult<Self> {
        Self::with_params(state, covariance, UnscentedParams::default())
    }

    /// Create the filter with explicit sigma-point parameters.
    pub fn with_params(
        state: S,
        covariance: DMatrix<f64>,
        params: UnscentedParams,
    ) -> FilterResult<Self> {
        linalg::check_covariance(&covariance, S::DOF)
            .map_err(FilterError::InvalidInitialCovariance)?;
        Ok(Ukfm {
            state,
            covariance,
            params,
        })
    }

    /// On-manifold weighted mean of propagated sigma points by fixed-point
    /// iteration: repeatedly average the lifted residuals and retract.
    fn sigma_mean(
        &self,
        center: &S,
        points: &[S],
        w_center: f64,
        w_other: f64,
    ) -> FilterResult<S> {
        let mut mean = center.clone();
        for _ in 0..MEAN_MAX_ITERATIONS {
            let mut residual = w_center * center.right_minus(&mean).coeffs();
            for point in points {
                residual += w_other * point.right_minus(&mean).coeffs();
            }
            if residual.norm() < MEAN_TOLERANCE {
                return Ok(mean);
            }
            mean = mean.right_plus(&S::Tangent::from_coeffs(&residual), None, None);
        }
        Err(FilterError::MeanNotConverged {
            iterations: MEAN_MAX_ITERATIONS,
        })
    }
}

impl<S: LieGroup> KalmanFilter<S> for Ukfm<S> {
    fn propagate<M: SystemModel<State = S>>(
        &mut self,
        model: &M,
        control: &DVector<f64>,
        dt: f64,
    ) -> FilterResult<()> {
        check_control(model, control)?;
        let n = S::DOF;
        let q = model.control_dim();

        // State sigma points: X ⊞ (±scale·column of √P) pushed through f.
        let (scale, w_mean_center, w_cov_center, w_other) = self.params.weights(n);
        let sqrt_cov = linalg::sqrt_psd(&self.covariance)?;
        let center = model.step(&self.state, control, None, None);
        let mut points = Vec::with_capacity(2 * n);
        for i in 0..n {
            let offset = scale * sqrt_cov.column(i).into_owned();
            for sign in [1.0, -1.0] {
                let perturbed = self
                    .state
                    .right_plus(&S::Tangent::from_coeffs(&(sign * &offset)), None, None);
                points.push(model.step(&perturbed, control, None, None));
            }
        }
        let mean = self.sigma_mean(&center, &points, w_mean_center, w_other)?;

        let mut covariance = DMatrix::zeros(n, n);
        let center_err = center.right_minus(&mean).coeffs();
        covariance += w_cov_center * &center_err * center_err.transpose();
        for point in &points {
            let err = point.right_minus(&mean).coeffs();
            covariance += w_other * &err * err.transpose();
        }

        // Control-noise sigma points against the new mean.
        let (noise_scale, _, _, noise_w_other) = self.params.weights(q);
        let noise_sqrt = linalg::sqrt_psd(&(model.noise_covariance() * dt))?;
        for i in 0..q {
            let offset = noise_scale * noise_sqrt.column(i).into_owned();
            for sign in [1.0, -1.0] {
                let noisy = model.step(&self.state, &(control + sign * &offset), None, None);
                let err = noisy.right_minus(&mean).coeffs();
                covariance += noise_w_other * &err * err.transpose();
            }
        }

        linalg::symmetrize(&mut covariance);
        self.state = mean;
        self.covariance = covariance;
        Ok(())
    }

    fn update<M: MeasurementModel<State = S>>(
        &mut self,
        model: &M,
        measurement: &DVector<f64>,
    ) -> FilterResult<()> {
        check_measurement(model, measurement)?;
        let n = S::DOF;
        let m = model.dim();
        let (scale, w_mean_center, w_cov_center, w_other) = self.params.weights(n);
        let sqrt_cov = linalg::sqrt_psd(&self.covariance)?;

        let center_obs = model.observe(&self.state, None);
        let mut offsets = Vec::with_capacity(2 * n);
        let mut observations = Vec::with_capacity(2 * n);
        for i in 0..n {
            let offset = scale * sqrt_cov.column(i).into_owned();
            for sign in [1.0, -1.0] {
                let signed = sign * &offset;
                let perturbed =
                    self.state
                        .right_plus(&S::Tangent::from_coeffs(&signed), None, None);
                observations.push(model.observe(&perturbed, None));
                offsets.push(signed);
            }
        }

        let mut predicted = w_mean_center * &center_obs;
        for obs in &observations {
            predicted += w_other * obs;
        }

        let mut innovation_cov = model.noise_covariance().clone();
        let center_diff = &center_obs - &predicted;
        innovation_cov += w_cov_center * &center_diff * center_diff.transpose();
        let mut cross_cov = DMatrix::zeros(n, m);
        for (offset, obs) in offsets.iter().zip(&observations) {
            let diff = obs - &predicted;
            innovation_cov += w_other * &diff * diff.transpose();
            cross_cov += w_other * offset * diff.transpose();
        }
        linalg::symmetrize(&mut innovation_cov);

        // K = P_xy·S⁻¹ via a Cholesky solve on Sᵀ = S
        let gain = linalg::solve_spd(&innovation_cov, &cross_cov.transpose())
            .map_err(|err| match err {
                LinAlgError::Singular => FilterError::SingularInnovation,
                other => FilterError::LinAlg(other),
            })?
            .transpose();

        let innovation = measurement - predicted;
        let correction = S::Tangent::from_coeffs(&(&gain * innovation));
        self.state = self.state.right_plus(&correction, None, None);
        self.covariance -= &gain * innovation_cov * gain.transpose();
        linalg::symmetrize(&mut self.covariance);
        Ok(())
    }

    fn state(&self) -> &S {
        &self.state
    }

    fn covariance(&self) -> DMatrix<f64> {
        self.covariance.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Ekf;
    use crate::manifold::{Rn, SE2};
    use crate::models::{
        BundleAdapter, DiffDriveModel, DiffDriveState, GpsModel, WheelKinematics,
    };

    fn nominal_state() -> DiffDriveState {
        DiffDriveState::new(SE2::identity(), Rn::from_slice(&[1.0, 1.0, 1.0]))
    }

    fn model() -> DiffDriveModel {
        DiffDriveModel::with_wheel_variance(WheelKinematics::new(0.15, 0.15, 0.4), 9e-5)
    }

    #[test]
    #[should_panic(expected = "alpha must be in (0, 1]")]
    fn test_params_reject_zero_alpha() {
        UnscentedParams::new(0.0);
    }

    #[test]
    #[should_panic(expected = "alpha must be in (0, 1]")]
    fn test_params_reject_large_alpha() {
        UnscentedParams::new(1.5);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let (_, w_mean_center, _, w_other) = UnscentedParams::default().weights(6);
        assert!((w_mean_center + 12.0 * w_other - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfectly_known_state_stays_fixed_under_update() {
        // Zero covariance collapses all sigma points; the gain must be zero.
        let gps = BundleAdapter::<_, Rn<3>>::new(GpsModel::new(DMatrix::from_diagonal(
            &DVector::from_element(2, 6e-3),
        )));
        let mut ukf = Ukfm::new(nominal_state(), DMatrix::zeros(6, 6)).unwrap();
        ukf.update(&gps, &DVector::from_column_slice(&[5.0, -5.0]))
            .unwrap();
        assert!(ukf
            .state()
            .first()
            .is_approx(&SE2::identity(), 1e-12));
        assert!(ukf.covariance().norm() < 1e-12);
    }

    #[test]
    fn test_propagate_matches_ekf_for_small_covariance() {
        // With a tight prior the sigma points stay in the linear regime, so
        // one prediction must agree with the linearized filter.
        let cov = DMatrix::from_diagonal(&DVector::from_element(6, 1e-6));
        let mut ekf = Ekf::new(nominal_state(), cov.clone()).unwrap();
        let mut ukf = Ukfm::new(nominal_state(), cov).unwrap();
        let u = DVector::from_column_slice(&[0.005, 0.0035]);
        ekf.propagate(&model(), &u, 0.01).unwrap();
        ukf.propagate(&model(), &u, 0.01).unwrap();
        let state_gap = ekf.state().right_minus(ukf.state()).coeffs().norm();
        assert!(state_gap < 1e-9, "means differ: {state_gap}");
        let cov_gap = (ekf.covariance() - ukf.covariance()).norm();
        assert!(cov_gap < 1e-9, "covariances differ: {cov_gap}");
    }

    #[test]
    fn test_propagate_keeps_covariance_psd() {
        let cov = DMatrix::from_diagonal(&DVector::from_column_slice(&[
            0.1, 0.1, 0.17, 1e-5, 1e-5, 1e-5,
        ]));
        let mut ukf = Ukfm::new(nominal_state(), cov).unwrap();
        let u = DVector::from_column_slice(&[0.005, 0.0035]);
        for _ in 0..50 {
            ukf.propagate(&model(), &u, 0.01).unwrap();
            assert!(linalg::min_eigenvalue(&ukf.covariance()) > -1e-9);
        }
    }

    #[test]
    fn test_update_shrinks_position_uncertainty() {
        let gps = BundleAdapter::<_, Rn<3>>::new(GpsModel::new(DMatrix::from_diagonal(
            &DVector::from_element(2, 6e-3),
        )));
        let cov = DMatrix::from_diagonal(&DVector::from_column_slice(&[
            0.1, 0.1, 0.17, 1e-5, 1e-5, 1e-5,
        ]));
        let mut ukf = Ukfm::new(nominal_state(), cov).unwrap();
        let before = ukf.covariance()[(0, 0)];
        ukf.update(&gps, &DVector::zeros(2)).unwrap();
        assert!(ukf.covariance()[(0, 0)] < before);
    }
}
