//! Recursive Bayesian filters on manifolds.
//!
//! Four interchangeable filters consume the same model interfaces:
//! - [`Ekf`]: extended Kalman filter on the tangent space at the mean
//! - [`Sekf`]: square-root EKF, algebraically equivalent, QR-based
//! - [`Iekf`]: invariant EKF with a right-invariant (log-linear) error
//! - [`Ukfm`]: unscented Kalman filter on manifolds, Jacobian-free
//!
//! Each filter owns exactly one (state, covariance) pair and is mutated only
//! by its own `propagate`/`update` calls; instances share no mutable state,
//! so running several filters side by side is safe as long as calls on one
//! instance are serialized by the caller.
//!
//! Failures are local to the failing instance: a singular innovation or a
//! non-converged sigma-point mean leaves the other filters untouched, and the
//! caller decides whether to skip the step or abort. There is no retry:
//! recursive filtering has no notion of redoing a step once time advanced.

use crate::linalg::LinAlgError;
use crate::manifold::LieGroup;
use crate::models::{MeasurementModel, SystemModel};
use nalgebra::{DMatrix, DVector};

pub mod ekf;
pub mod iekf;
pub mod sekf;
pub mod ukfm;

pub use ekf::Ekf;
pub use iekf::Iekf;
pub use sekf::Sekf;
pub use ukfm::{Ukfm, UnscentedParams};

/// Errors raised by filter construction, propagation, or update.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    /// The initial covariance is not symmetric PSD of the state dimension.
    #[error("invalid initial covariance: {0}")]
    InvalidInitialCovariance(#[source] LinAlgError),
    /// A control or measurement vector had the wrong length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The innovation covariance could not be inverted.
    #[error("innovation covariance is numerically singular")]
    SingularInnovation,
    /// The on-manifold sigma-point mean did not converge.
    #[error("sigma-point mean did not converge within {iterations} iterations")]
    MeanNotConverged { iterations: usize },
    /// A covariance carrier lost positive semi-definiteness.
    #[error(transparent)]
    LinAlg(#[from] LinAlgError),
}

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Common contract of the four filters.
///
/// `propagate` advances the estimate by one control increment of duration
/// `dt` seconds; the model's continuous-time control-noise covariance is
/// discretized internally as `Q·dt`. `update` corrects the estimate with one
/// measurement. Both mutate the filter in place.
pub trait KalmanFilter<S: LieGroup> {
    /// Propagate the estimate through the motion model.
    fn propagate<M: SystemModel<State = S>>(
        &mut self,
        model: &M,
        control: &DVector<f64>,
        dt: f64,
    ) -> FilterResult<()>;

    /// Correct the estimate with a measurement.
    fn update<M: MeasurementModel<State = S>>(
        &mut self,
        model: &M,
        measurement: &DVector<f64>,
    ) -> FilterResult<()>;

    /// The current state estimate.
    fn state(&self) -> &S;

    /// The covariance expressed in the tangent space at the current mean,
    /// reconstructed from the internal carrier if necessary.
    fn covariance(&self) -> DMatrix<f64>;
}

/// Validate a control vector length against the model.
fn check_control<M: SystemModel>(model: &M, control: &DVector<f64>) -> FilterResult<()> {
    if control.len() != model.control_dim() {
        return Err(FilterError::DimensionMismatch {
            expected: model.control_dim(),
            actual: control.len(),
        });
    }
    Ok(())
}

/// Validate a measurement vector length against the model.
fn check_measurement<M: MeasurementModel>(
    model: &M,
    measurement: &DVector<f64>,
) -> FilterResult<()> {
    if measurement.len() != model.dim() {
        return Err(FilterError::DimensionMismatch {
            expected: model.dim(),
            actual: measurement.len(),
        });
    }
    Ok(())
}
