//! Measurement models over the SE(2) pose sub-state.
//!
//! Both models are Cartesian: a landmark is observed as its coordinates in
//! the robot frame via the rigid inverse action `pose⁻¹ · b`, and a GPS fix
//! observes the robot's own world-frame position. Measurement-to-landmark
//! association is assumed given.

use crate::manifold::{LieGroup, SE2};
use crate::models::MeasurementModel;
use nalgebra::{DMatrix, DVector, Vector2};

/// Landmark-in-robot-frame measurement model.
///
/// Predicts `y = pose⁻¹ · b` for a landmark `b` at a known, fixed world-frame
/// position. The Jacobian with respect to a right pose perturbation is
/// `[−I₂ | [1]ₓ·y]` evaluated at the prediction.
#[derive(Clone, Debug)]
pub struct LandmarkModel {
    landmark: Vector2<f64>,
    noise: DMatrix<f64>,
}

impl LandmarkModel {
    /// Create a model for one landmark with its 2×2 noise covariance.
    ///
    /// # Panics
    /// Panics if the covariance is not 2×2.
    pub fn new(landmark: Vector2<f64>, noise: DMatrix<f64>) -> Self {
        assert_eq!(
            (noise.nrows(), noise.ncols()),
            (2, 2),
            "landmark noise covariance must be 2x2"
        );
        LandmarkModel { landmark, noise }
    }

    /// The observed landmark's world-frame position.
    pub fn landmark(&self) -> Vector2<f64> {
        self.landmark
    }
}

impl MeasurementModel for LandmarkModel {
    type State = SE2;

    fn dim(&self) -> usize {
        2
    }

    fn observe(&self, state: &SE2, jacobian_state: Option<&mut DMatrix<f64>>) -> DVector<f64> {
        let y = state.inverse(None).act(&self.landmark, None, None);
        if let Some(jac) = jacobian_state {
            *jac = DMatrix::from_row_slice(2, 3, &[-1.0, 0.0, y.y, 0.0, -1.0, -y.x]);
        }
        DVector::from_column_slice(y.as_slice())
    }

    fn noise_covariance(&self) -> &DMatrix<f64> {
        &self.noise
    }
}

/// GPS position measurement model.
///
/// Predicts the pose's world-frame translation; the Jacobian with respect to
/// a right pose perturbation is `[R(θ) | 0]`.
#[derive(Clone, Debug)]
pub struct GpsModel {
    noise: DMatrix<f64>,
}

impl GpsModel {
    /// Create the model with its 2×2 noise covariance.
    ///
    /// # Panics
    /// Panics if the covariance is not 2×2.
    pub fn new(noise: DMatrix<f64>) -> Self {
        assert_eq!(
            (noise.nrows(), noise.ncols()),
            (2, 2),
            "gps noise covariance must be 2x2"
        );
        GpsModel { noise }
    }
}

impl MeasurementModel for GpsModel {
    type State = SE2;

    fn dim(&self) -> usize {
        2
    }

    fn observe(&self, state: &SE2, jacobian_state: Option<&mut DMatrix<f64>>) -> DVector<f64> {
        if let Some(jac) = jacobian_state {
            let rot = state.rotation_matrix();
            *jac = DMatrix::from_row_slice(
                2,
                3,
                &[rot[(0, 0)], rot[(0, 1)], 0.0, rot[(1, 0)], rot[(1, 1)], 0.0],
            );
        }
        DVector::from_column_slice(state.translation().as_slice())
    }

    fn noise_covariance(&self) -> &DMatrix<f64> {
        &self.noise
    }
}
