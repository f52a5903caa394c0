//! Differential-drive motion model with on-line wheel calibration.
//!
//! The control is a pair of incremental wheel angles `u = (φ_l, φ_r)`
//! measured by the encoders over one time step. Assuming constant wheel
//! velocities between steps, the base moves along a small arc
//!
//! ```text
//!   dl = (r_l·φ_l + r_r·φ_r) / 2        // arc length
//!   dθ = (r_r·φ_r − r_l·φ_l) / d        // arc angle
//! ```
//!
//! with wheel radii `r_l`, `r_r` and wheel separation `d`. Expressed in the
//! tangent space of SE(2) the arc is `b = (dl, 0, dθ)` (the lateral component
//! stays zero: wheel slippage is absorbed by the control noise), and the pose
//! advances as `pose ∘ Exp(b)`.
//!
//! The state is a bundle of the pose and three calibration factors
//! `k = (k₀, k₁, k₂)` that scale the nominal radii and separation. The
//! calibration is static under motion; only its coupling into the arc makes
//! it observable, through the cross-covariance created by the state Jacobian.

use crate::manifold::{Bundle, BundleTangent, LieGroup, Rn, SE2Tangent, Tangent, SE2};
use crate::models::SystemModel;
use nalgebra::{DMatrix, DVector, Matrix3x2};

/// Composite state of the differential-drive robot: pose and calibration.
pub type DiffDriveState = Bundle<SE2, Rn<3>>;

/// Tangent vector of [`DiffDriveState`].
pub type DiffDriveTangent = BundleTangent<SE2, Rn<3>>;

/// Nominal wheel geometry, configured once and read-only thereafter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelKinematics {
    /// Left wheel radius in meters.
    pub radius_left: f64,
    /// Right wheel radius in meters.
    pub radius_right: f64,
    /// Distance between the wheels in meters.
    pub separation: f64,
}

impl WheelKinematics {
    /// Create a kinematics description.
    pub fn new(radius_left: f64, radius_right: f64, separation: f64) -> Self {
        WheelKinematics {
            radius_left,
            radius_right,
            separation,
        }
    }
}

/// Differential-drive system model with calibration coupling.
#[derive(Clone, Debug)]
pub struct DiffDriveModel {
    kinematics: WheelKinematics,
    noise: DMatrix<f64>,
}

impl DiffDriveModel {
    /// Create the model with zero control noise.
    pub fn new(kinematics: WheelKinematics) -> Self {
        DiffDriveModel {
            kinematics,
            noise: DMatrix::zeros(2, 2),
        }
    }

    /// Create the model with a per-wheel noise variance (diagonal covariance).
    pub fn with_wheel_variance(kinematics: WheelKinematics, variance: f64) -> Self {
        let mut model = DiffDriveModel::new(kinematics);
        model.set_noise_covariance(DMatrix::from_diagonal(&DVector::from_element(2, variance)));
        model
    }

    /// Replace the 2×2 control-noise covariance.
    ///
    /// # Panics
    /// Panics if the matrix is not 2×2.
    pub fn set_noise_covariance(&mut self, covariance: DMatrix<f64>) {
        assert_eq!(
            (covariance.nrows(), covariance.ncols()),
            (2, 2),
            "control noise covariance must be 2x2"
        );
        self.noise = covariance;
    }

    /// The configured kinematics.
    pub fn kinematics(&self) -> WheelKinematics {
        self.kinematics
    }

    /// The local-frame arc for a control under the state's calibration,
    /// together with its Jacobians with respect to the control and the
    /// calibration factors.
    fn arc(
        &self,
        calibration: &Rn<3>,
        control: &DVector<f64>,
    ) -> (SE2Tangent, Matrix3x2<f64>, nalgebra::Matrix3<f64>) {
        let k = calibration.vector();
        let radius_left = self.kinematics.radius_left * k[0];
        let radius_right = self.kinematics.radius_right * k[1];
        let separation = self.kinematics.separation * k[2];

        let (phi_l, phi_r) = (control[0], control[1]);
        let dl = 0.5 * (radius_left * phi_l + radius_right * phi_r);
        let dtheta = (radius_right * phi_r - radius_left * phi_l) / separation;
        let arc = SE2Tangent::new(dl, 0.0, dtheta);

        // ∂b/∂u
        let jac_control = Matrix3x2::new(
            0.5 * radius_left,
            0.5 * radius_right,
            0.0,
            0.0,
            -radius_left / separation,
            radius_right / separation,
        );

        // ∂b/∂k
        let dl_dk0 = 0.5 * self.kinematics.radius_left * phi_l;
        let dl_dk1 = 0.5 * self.kinematics.radius_right * phi_r;
        let dth_dk0 = -self.kinematics.radius_left * phi_l / separation;
        let dth_dk1 = self.kinematics.radius_right * phi_r / separation;
        let dth_dk2 = -dtheta / k[2];
        let jac_calib = nalgebra::Matrix3::new(
            dl_dk0, dl_dk1, 0.0, //
            0.0, 0.0, 0.0, //
            dth_dk0, dth_dk1, dth_dk2,
        );

        (arc, jac_control, jac_calib)
    }
}

impl SystemModel for DiffDriveModel {
    type State = DiffDriveState;

    fn control_dim(&self) -> usize {
        2
    }

    fn step(
        &self,
        state: &Self::State,
        control: &DVector<f64>,
        jacobian_state: Option<&mut DMatrix<f64>>,
        jacobian_noise: Option<&mut DMatrix<f64>>,
    ) -> Self::State {
        assert_eq!(control.len(), 2, "diff drive control is [phi_l, phi_r]");
        let (arc, jac_control, jac_calib) = self.arc(state.second(), control);

        let want_jacobians = jacobian_state.is_some() || jacobian_noise.is_some();
        let next_pose = if want_jacobians {
            let arc_jr = arc.right_jacobian();
            let mut jac_pose = DMatrix::zeros(3, 3);
            let next_pose = state.first().right_plus(&arc, Some(&mut jac_pose), None);

            if let Some(jac) = jacobian_state {
                // | Ad(Exp(b))⁻¹   Jr(b)·∂b/∂k |
                // |      0              I      |
                let coupling = &arc_jr * DMatrix::from_column_slice(3, 3, jac_calib.as_slice());
                let mut f = DMatrix::identity(6, 6);
                f.view_mut((0, 0), (3, 3)).copy_from(&jac_pose);
                f.view_mut((0, 3), (3, 3)).copy_from(&coupling);
                *jac = f;
            }
            if let Some(jac) = jacobian_noise {
                let top = &arc_jr * DMatrix::from_column_slice(3, 2, jac_control.as_slice());
                let mut w = DMatrix::zeros(6, 2);
                w.view_mut((0, 0), (3, 2)).copy_from(&top);
                *jac = w;
            }
            next_pose
        } else {
            state.first().right_plus(&arc, None, None)
        };

        Bundle::new(next_pose, state.second().clone())
    }

    fn noise_covariance(&self) -> &DMatrix<f64> {
        &self.noise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn nominal_state() -> DiffDriveState {
        DiffDriveState::new(SE2::identity(), Rn::from_slice(&[1.0, 1.0, 1.0]))
    }

    fn model() -> DiffDriveModel {
        DiffDriveModel::with_wheel_variance(WheelKinematics::new(0.15, 0.15, 0.4), 9e-5)
    }

    #[test]
    fn test_equal_wheels_go_straight() {
        let model = model();
        let u = DVector::from_column_slice(&[0.5, 0.5]);
        let next = model.step(&nominal_state(), &u, None, None);
        // dl = r·φ, no rotation, no lateral motion
        assert!((next.first().x() - 0.15 * 0.5).abs() < 1e-12);
        assert!(next.first().y().abs() < 1e-12);
        assert!(next.first().angle().abs() < 1e-12);
    }

    #[test]
    fn test_differential_wheels_turn() {
        let model = model();
        let u = DVector::from_column_slice(&[0.2, 0.6]);
        let next = model.step(&nominal_state(), &u, None, None);
        let expected_dtheta = 0.15 * (0.6 - 0.2) / 0.4;
        assert!((next.first().angle() - expected_dtheta).abs() < 1e-12);
    }

    #[test]
    fn test_calibration_scales_the_arc() {
        let model = model();
        let state = DiffDriveState::new(SE2::identity(), Rn::from_slice(&[0.5, 0.5, 1.0]));
        let u = DVector::from_column_slice(&[0.5, 0.5]);
        let next = model.step(&state, &u, None, None);
        assert!((next.first().x() - 0.5 * 0.15 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_calibration_is_static_under_motion() {
        let model = model();
        let u = DVector::from_column_slice(&[0.3, 0.7]);
        let next = model.step(&nominal_state(), &u, None, None);
        assert_eq!(next.second().vector(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_state_jacobian_finite_difference() {
        let model = model();
        let state = DiffDriveState::new(
            SE2::from_xy_angle(0.4, -0.2, 0.7),
            Rn::from_slice(&[1.1, 0.9, 1.05]),
        );
        let u = DVector::from_column_slice(&[0.5, 0.35]);
        let mut f = DMatrix::zeros(6, 6);
        let base = model.step(&state, &u, Some(&mut f), None);

        let eps = 1e-7;
        for i in 0..6 {
            let mut v = DVector::zeros(6);
            v[i] = eps;
            let perturbed = state.right_plus(&DiffDriveTangent::from_coeffs(&v), None, None);
            let numeric = model
                .step(&perturbed, &u, None, None)
                .right_minus(&base)
                .coeffs()
                / eps;
            for r in 0..6 {
                assert!(
                    (numeric[r] - f[(r, i)]).abs() < 1e-5,
                    "state jacobian mismatch at ({r}, {i}): {} vs {}",
                    numeric[r],
                    f[(r, i)]
                );
            }
        }
    }

    #[test]
    fn test_noise_jacobian_finite_difference() {
        let model = model();
        let state = DiffDriveState::new(
            SE2::from_xy_angle(-0.1, 0.3, -0.5),
            Rn::from_slice(&[0.95, 1.05, 1.0]),
        );
        let u = DVector::from_column_slice(&[0.5, 0.35]);
        let mut w = DMatrix::zeros(6, 2);
        let base = model.step(&state, &u, None, Some(&mut w));

        let eps = 1e-7;
        for i in 0..2 {
            let mut du = u.clone();
            du[i] += eps;
            let numeric = model
                .step(&state, &du, None, None)
                .right_minus(&base)
                .coeffs()
                / eps;
            for r in 0..6 {
                assert!(
                    (numeric[r] - w[(r, i)]).abs() < 1e-5,
                    "noise jacobian mismatch at ({r}, {i})"
                );
            }
        }
    }

    #[test]
    fn test_zero_control_is_identity() {
        let model = model();
        let u = DVector::zeros(2);
        let state = DiffDriveState::new(
            SE2::from_xy_angle(1.0, 2.0, 0.5),
            Rn::from_slice(&[1.0, 1.0, 1.0]),
        );
        let next = model.step(&state, &u, None, None);
        assert!(next.first().is_approx(state.first(), 1e-12));
    }
}
