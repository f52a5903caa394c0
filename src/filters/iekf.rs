//! Invariant extended Kalman filter.
//!
//! Carries the estimation error in the right-invariant frame: the error `e`
//! is defined through `X = Exp(e) ∘ X̂`, related to the usual local (right)
//! perturbation `δ` by `e = Ad(X̂)·δ`. Linearizing the motion model in this
//! frame conjugates the local Jacobians by adjoints,
//!
//! ```text
//!   F_e = Ad(X̂⁺) · F · Ad(X̂)⁻¹        W_e = Ad(X̂⁺) · W
//!   H_e = H · Ad(X̂)⁻¹
//! ```
//!
//! For the differential-drive model the pose block of `F_e` collapses to the
//! identity: the pose error dynamics become log-linear and independent of the
//! estimate, which is the property that gives the IEKF its consistency
//! advantage over the EKF when the estimate is far from the truth.
//!
//! The correction is applied on the left, `X̂⁺ = Exp(K·z) ∘ X̂`, matching the
//! frame the gain is computed in.

use crate::filters::{check_control, check_measurement, FilterError, FilterResult, KalmanFilter};
use crate::linalg::{self, LinAlgError};
use crate::manifold::{LieGroup, Tangent};
use crate::models::{MeasurementModel, SystemModel};
use nalgebra::{DMatrix, DVector};

/// Right-invariant EKF; the covariance carrier lives in the invariant frame.
#[derive(Clone, Debug)]
pub struct Iekf<S: LieGroup> {
    state: S,
    /// Covariance of the invariant error `e`, with `X = Exp(e) ∘ X̂`.
    covariance: DMatrix<f64>,
}

impl<S: LieGroup> Iekf<S> {
    /// Create the filter from an initial state and a symmetric PSD initial
    /// covariance expressed, like the other filters, in the tangent space at
    /// the mean; it is moved to the invariant frame internally.
    pub fn new(state: S, covariance: DMatrix<f64>) -> FilterResult<Self> {
        linalg::check_covariance(&covariance, S::DOF)
            .map_err(FilterError::InvalidInitialCovariance)?;
        let adj = state.adjoint();
        let mut invariant = &adj * covariance * adj.transpose();
        linalg::symmetrize(&mut invariant);
        Ok(Iekf {
            state,
            covariance: invariant,
        })
    }

    /// The covariance of the invariant (left) error, without re-expression.
    pub fn invariant_covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}

impl<S: LieGroup> KalmanFilter<S> for Iekf<S> {
    fn propagate<M: SystemModel<State = S>>(
        &mut self,
        model: &M,
        control: &DVector<f64>,
        dt: f64,
    ) -> FilterResult<()> {
        check_control(model, control)?;
        let mut jac_state = DMatrix::zeros(S::DOF, S::DOF);
        let mut jac_noise = DMatrix::zeros(S::DOF, model.control_dim());
        let adj_prev_inv = self.state.inverse(None).adjoint();
        self.state = model.step(
            &self.state,
            control,
            Some(&mut jac_state),
            Some(&mut jac_noise),
        );
        let adj_next = self.state.adjoint();

        let jac_invariant = &adj_next * jac_state * adj_prev_inv;
        let jac_noise_invariant = &adj_next * jac_noise;
        let noise_discrete = model.noise_covariance() * dt;
        self.covariance = &jac_invariant * &self.covariance * jac_invariant.transpose()
            + &jac_noise_invariant * noise_discrete * jac_noise_invariant.transpose();
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
        let jac_invariant = jac * self.state.inverse(None).adjoint();

        let innovation_cov =
            &jac_invariant * &self.covariance * jac_invariant.transpose()
                + model.noise_covariance();
        let gain = linalg::solve_spd(&innovation_cov, &(&jac_invariant * &self.covariance))
            .map_err(|err| match err {
                LinAlgError::Singular => FilterError::SingularInnovation,
                other => FilterError::LinAlg(other),
            })?
            .transpose();

        let innovation = measurement - predicted;
        let correction = S::Tangent::from_coeffs(&(&gain * innovation));
        self.state = self.state.left_plus(&correction);

        let identity = DMatrix::identity(S::DOF, S::DOF);
        let ikh = identity - &gain * &jac_invariant;
        self.covariance = &ikh * &self.covariance * ikh.transpose()
            + &gain * model.noise_covariance() * gain.transpose();
        linalg::symmetrize(&mut self.covariance);
        Ok(())
    }

    fn state(&self) -> &S {
        &self.state
    }

    fn covariance(&self) -> DMatrix<f64> {
        // Re-express in the tangent space at the mean: δ = Ad(X̂)⁻¹·e.
        let adj_inv = self.state.inverse(None).adjoint();
        let mut local = &adj_inv * &self.covariance * adj_inv.transpose();
        linalg::symmetrize(&mut local);
        local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::{Rn, SE2};
    use crate::models::{
        BundleAdapter, DiffDriveModel, DiffDriveState, GpsModel, WheelKinematics,
    };

    fn initial_covariance() -> DMatrix<f64> {
        DMatrix::from_diagonal(&DVector::from_column_slice(&[
            0.1, 0.1, 0.17, 1e-5, 1e-5, 1e-5,
        ]))
    }

    fn away_from_identity() -> DiffDriveState {
        DiffDriveState::new(
            SE2::from_xy_angle(2.0, -1.0, 1.2),
            Rn::from_slice(&[1.0, 1.0, 1.0]),
        )
    }

    #[test]
    fn test_covariance_frame_round_trip() {
        // covariance() must undo the internal change of frame exactly.
        let iekf = Iekf::new(away_from_identity(), initial_covariance()).unwrap();
        assert!((iekf.covariance() - initial_covariance()).norm() < 1e-12);
    }

    #[test]
    fn test_pose_error_dynamics_are_log_linear() {
        // With an exactly known calibration and no control noise, the
        // invariant-frame pose covariance block must not change under
        // propagation, whatever the trajectory.
        let model = DiffDriveModel::with_wheel_variance(WheelKinematics::new(0.15, 0.15, 0.4), 0.0);
        let mut cov = DMatrix::zeros(6, 6);
        cov.view_mut((0, 0), (3, 3))
            .copy_from(&DMatrix::from_diagonal(&DVector::from_column_slice(&[
                0.1, 0.2, 0.05,
            ])));
        let mut iekf = Iekf::new(away_from_identity(), cov).unwrap();
        let before = iekf.invariant_covariance().clone();
        for step in 0..100 {
            // Strongly turning trajectory to exercise the state dependence.
            let u = DVector::from_column_slice(&[0.004, 0.004 + 0.002 * (step as f64).sin()]);
            iekf.propagate(&model, &u, 0.01).unwrap();
        }
        let after = iekf.invariant_covariance();
        assert!(
            (after.view((0, 0), (3, 3)) - before.view((0, 0), (3, 3))).norm() < 1e-10,
            "invariant pose block drifted"
        );
    }

    #[test]
    fn test_propagate_keeps_covariance_psd() {
        let model = DiffDriveModel::with_wheel_variance(WheelKinematics::new(0.15, 0.15, 0.4), 9e-5);
        let mut iekf = Iekf::new(away_from_identity(), initial_covariance()).unwrap();
        let u = DVector::from_column_slice(&[0.005, 0.0035]);
        for _ in 0..50 {
            iekf.propagate(&model, &u, 0.01).unwrap();
            assert!(linalg::min_eigenvalue(&iekf.covariance()) > -1e-9);
        }
    }

    #[test]
    fn test_update_shrinks_position_uncertainty() {
        let gps = BundleAdapter::<_, Rn<3>>::new(GpsModel::new(DMatrix::from_diagonal(
            &DVector::from_element(2, 6e-3),
        )));
        let mut iekf = Iekf::new(away_from_identity(), initial_covariance()).unwrap();
        let before = iekf.covariance()[(0, 0)];
        let y = DVector::from_column_slice(&[2.0, -1.0]);
        iekf.update(&gps, &y).unwrap();
        assert!(iekf.covariance()[(0, 0)] < before);
    }
}
