//! Extended Kalman filter on the tangent space at the current mean.

use crate::filters::{check_control, check_measurement, FilterError, FilterResult, KalmanFilter};
use crate::linalg::{self, LinAlgError};
use crate::manifold::{LieGroup, Tangent};
use crate::models::{MeasurementModel, SystemModel};
use nalgebra::{DMatrix, DVector};

/// Standard EKF: linearizes the models about the mean, propagates the
/// covariance through the state/noise Jacobians, and corrects the mean by a
/// tangent-space retraction of the Kalman-weighted innovation.
#[derive(Clone, Debug)]
pub struct Ekf<S: LieGroup> {
    state: S,
    covariance: DMatrix<f64>,
}

impl<S: LieGroup> Ekf<S> {
    /// Create the filter from an initial state and a symmetric PSD initial
    /// covariance of the state's tangent dimension.
    pub fn new(state: S, covariance: DMatrix<f64>) -> FilterResult<Self> {
        linalg::check_covariance(&covariance, S::DOF)
            .map_err(FilterError::InvalidInitialCovariance)?;
        Ok(Ekf { state, covariance })
    }
}

impl<S: LieGroup> KalmanFilter<S> for Ekf<S> {
    fn propagate<M: SystemModel<State = S>>(
        &mut self,
        model: &M,
        control: &DVector<f64>,
        dt: f64,
    ) -> FilterResult<()> {
        check_control(model, control)?;
        let mut jac_state = DMatrix::zeros(S::DOF, S::DOF);
        let mut jac_noise = DMatrix::zeros(S::DOF, model.control_dim());
        self.state = model.step(
            &self.state,
            control,
            Some(&mut jac_state),
            Some(&mut jac_noise),
        );

        let noise_discrete = model.noise_covariance() * dt;
        self.covariance = &jac_state * &self.covariance * jac_state.transpose()
            + &jac_noise * noise_discrete * jac_noise.transpose();
        linalg::symmetrize(&mut self.covariance);
        Ok(())
    }

    fn update<M: MeasurementModel<State = S>>(
        &mut self,
        model: &M,
        measurement: &DVector<f64>,
    ) -> FilterResult<()> {
        check_measurement(model, measurement)?;
        let mut jac = DMatrix::zeros(model.dim(), S::DOF);
        let predicted = model.observe(&self.state, Some(&mut jac));

        let innovation_cov =
            &jac * &self.covariance * jac.transpose() + model.noise_covariance();
        // K = P·Hᵀ·S⁻¹, computed as (S⁻¹·H·P)ᵀ through a Cholesky solve
        let gain = linalg::solve_spd(&innovation_cov, &(&jac * &self.covariance))
            .map_err(|err| match err {
                LinAlgError::Singular => FilterError::SingularInnovation,
                other => FilterError::LinAlg(other),
            })?
            .transpose();

        let innovation = measurement - predicted;
        let correction = S::Tangent::from_coeffs(&(&gain * innovation));
        self.state = self.state.right_plus(&correction, None, None);

        // Joseph form preserves symmetry and positive semi-definiteness
        let identity = DMatrix::identity(S::DOF, S::DOF);
        let ikh = identity - &gain * &jac;
        self.covariance = &ikh * &self.covariance * ikh.transpose()
            + &gain * model.noise_covariance() * gain.transpose();
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
