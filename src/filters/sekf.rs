//! Square-root extended Kalman filter.
//!
//! Algebraically equivalent to the EKF but carries a square-root factor `L`
//! with `P = L·Lᵀ` instead of the covariance itself. Both the prediction and
//! the update are single QR triangularizations of stacked pre-arrays, so the
//! reconstructed covariance is positive semi-definite by construction and the
//! effective precision is roughly doubled.
//!
//! Prediction triangularizes `[L·Fᵀ ; Q_d^{1/2}ᵀ·Wᵀ]`. The update uses the
//! block pre-array
//!
//! ```text
//!   | R^{1/2}ᵀ   0  |          | Y  Z |
//!   | (H·L)ᵀ    Lᵀ  |  =  Q ·  | 0  T |
//! ```
//!
//! whose triangular post-array contains the innovation factor `Y` (with
//! `YᵀY = S`), the gain numerator `Z` (with `K = Zᵀ·Y⁻ᵀ`), and the posterior
//! factor `Tᵀ` in one step.

use crate::filters::{check_control, check_measurement, FilterError, FilterResult, KalmanFilter};
use crate::linalg;
use crate::manifold::{LieGroup, Tangent};
use crate::models::{MeasurementModel, SystemModel};
use nalgebra::{DMatrix, DVector};

/// Square-root EKF carrying a factor `L` with `P = L·Lᵀ`.
#[derive(Clone, Debug)]
pub struct Sekf<S: LieGroup> {
    state: S,
    factor: DMatrix<f64>,
}

impl<S: LieGroup> Sekf<S> {
    /// Create the filter from an initial state and a symmetric PSD initial
    /// covariance; the covariance is factored once at construction.
    pub fn new(state: S, covariance: DMatrix<f64>) -> FilterResult<Self> {
        linalg::check_symmetric(&covariance, S::DOF)
            .map_err(FilterError::InvalidInitialCovariance)?;
        let factor =
            linalg::sqrt_psd(&covariance).map_err(FilterError::InvalidInitialCovariance)?;
        Ok(Sekf { state, factor })
    }

    /// The internal square-root factor.
    pub fn factor(&self) -> &DMatrix<f64> {
        &self.factor
    }
}

impl<S: LieGroup> KalmanFilter<S> for Sekf<S> {
    fn propagate<M: SystemModel<State = S>>(
        &mut self,
        model: &M,
        control: &DVector<f64>,
        dt: f64,
    ) -> FilterResult<()> {
        check_control(model, control)?;
        let n = S::DOF;
        let q = model.control_dim();
        let mut jac_state = DMatrix::zeros(n, n);
        let mut jac_noise = DMatrix::zeros(n, q);
        self.state = model.step(
            &self.state,
            control,
            Some(&mut jac_state),
            Some(&mut jac_noise),
        );

        let noise_sqrt = linalg::sqrt_psd(&(model.noise_covariance() * dt))?;

        // Pre-array Aᵀ·A = F·P·Fᵀ + W·Q_d·Wᵀ
        let mut pre = DMatrix::zeros(n + q, n);
        pre.view_mut((0, 0), (n, n))
            .copy_from(&(self.factor.transpose() * jac_state.transpose()));
        pre.view_mut((n, 0), (q, n))
            .copy_from(&(noise_sqrt.transpose() * jac_noise.transpose()));
        self.factor = pre.qr().r().transpose();
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
        let mut jac = DMatrix::zeros(m, n);
        let predicted = model.observe(&self.state, Some(&mut jac));

        let noise_sqrt = linalg::sqrt_psd(model.noise_covariance())?;

        let mut pre = DMatrix::zeros(m + n, m + n);
        pre.view_mut((0, 0), (m, m))
            .copy_from(&noise_sqrt.transpose());
        pre.view_mut((m, 0), (n, m))
            .copy_from(&(self.factor.transpose() * jac.transpose()));
        pre.view_mut((m, m), (n, n))
            .copy_from(&self.factor.transpose());

        let post = pre.qr().r();
        let innovation_factor = post.view((0, 0), (m, m)).into_owned();
        let gain_numerator = post.view((0, m), (m, n)).into_owned();
        let posterior_factor = post.view((m, m), (n, n)).into_owned();

        // dx = Zᵀ·(Y⁻ᵀ·z); Yᵀ is lower triangular
        let innovation = measurement - predicted;
        let whitened = innovation_factor
            .transpose()
            .solve_lower_triangular(&innovation)
            .ok_or(FilterError::SingularInnovation)?;
        let correction = S::Tangent::from_coeffs(&(gain_numerator.transpose() * whitened));
        self.state = self.state.right_plus(&correction, None, None);
        self.factor = posterior_factor.transpose();
        Ok(())
    }

    fn state(&self) -> &S {
        &self.state
    }

    fn covariance(&self) -> DMatrix<f64> {
        &self.factor * self.factor.transpose()
    }
}
