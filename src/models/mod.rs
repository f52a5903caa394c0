//! System and measurement model interfaces consumed by every filter.
//!
//! Models are deterministic: they predict states and observations and expose
//! analytic Jacobians plus a noise covariance. All randomness (simulated
//! control and sensor noise) lives outside, in the orchestration layer.

use crate::manifold::LieGroup;
use nalgebra::{DMatrix, DVector};

pub mod bundle_adapter;
pub mod diff_drive;
pub mod landmark;

pub use bundle_adapter::BundleAdapter;
pub use diff_drive::{DiffDriveModel, DiffDriveState, DiffDriveTangent, WheelKinematics};
pub use landmark::{GpsModel, LandmarkModel};

/// Motion model: maps (state, control) to the next state.
///
/// The same `step` serves ground-truth simulation (no Jacobians requested)
/// and filter propagation (state and noise Jacobians requested).
pub trait SystemModel {
    /// The state manifold the model advances.
    type State: LieGroup;

    /// Dimension of the control vector.
    fn control_dim(&self) -> usize;

    /// Advance the state by one control increment.
    ///
    /// # Arguments
    /// * `jacobian_state` - optional DOF×DOF Jacobian of the next state with
    ///   respect to a right perturbation of the current state
    /// * `jacobian_noise` - optional DOF×control_dim Jacobian with respect to
    ///   additive control noise
    fn step(
        &self,
        state: &Self::State,
        control: &DVector<f64>,
        jacobian_state: Option<&mut DMatrix<f64>>,
        jacobian_noise: Option<&mut DMatrix<f64>>,
    ) -> Self::State;

    /// Continuous-time control-noise covariance (control_dim square).
    ///
    /// Filters discretize it as `Q·dt` for a step of duration `dt`.
    fn noise_covariance(&self) -> &DMatrix<f64>;
}

/// Measurement model: maps a state to a predicted observation.
pub trait MeasurementModel {
    /// The state manifold the model observes.
    type State: LieGroup;

    /// Dimension of the observation vector.
    fn dim(&self) -> usize;

    /// Predicted observation, with optional dim×DOF Jacobian with respect to
    /// a right perturbation of the state.
    fn observe(
        &self,
        state: &Self::State,
        jacobian_state: Option<&mut DMatrix<f64>>,
    ) -> DVector<f64>;

    /// Measurement-noise covariance (dim square).
    fn noise_covariance(&self) -> &DMatrix<f64>;
}
