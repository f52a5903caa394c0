//! Adapter exposing a sub-state measurement model over a composite state.
//!
//! A model defined on the first element of a bundle (for example a landmark
//! model on the SE(2) pose) is evaluated on that element alone; its Jacobian
//! is embedded into the full composite tangent dimension by zero-padding the
//! columns of the second block, and the noise covariance passes through
//! unchanged.
//!
//! The zero columns do not make such corrections useless for the second
//! block: the motion model's coupling fills the joint covariance with
//! cross-terms, so a pose correction still pulls the calibration estimate.

use crate::manifold::{Bundle, LieGroup};
use crate::models::MeasurementModel;
use nalgebra::{DMatrix, DVector};
use std::marker::PhantomData;

/// Wraps a measurement model over `A` into one over `Bundle<A, B>`.
#[derive(Clone, Debug)]
pub struct BundleAdapter<M, B> {
    model: M,
    _second: PhantomData<B>,
}

impl<M, B> BundleAdapter<M, B> {
    /// Wrap a sub-state model.
    pub fn new(model: M) -> Self {
        BundleAdapter {
            model,
            _second: PhantomData,
        }
    }

    /// The wrapped model.
    pub fn inner(&self) -> &M {
        &self.model
    }
}

impl<M, B> MeasurementModel for BundleAdapter<M, B>
where
    M: MeasurementModel,
    B: LieGroup,
{
    type State = Bundle<M::State, B>;

    fn dim(&self) -> usize {
        self.model.dim()
    }

    fn observe(
        &self,
        state: &Self::State,
        jacobian_state: Option<&mut DMatrix<f64>>,
    ) -> DVector<f64> {
        match jacobian_state {
            Some(jac) => {
                let mut sub_jac = DMatrix::zeros(self.model.dim(), M::State::DOF);
                let y = self.model.observe(state.first(), Some(&mut sub_jac));
                let mut padded = DMatrix::zeros(self.model.dim(), M::State::DOF + B::DOF);
                padded
                    .view_mut((0, 0), (self.model.dim(), M::State::DOF))
                    .copy_from(&sub_jac);
                *jac = padded;
                y
            }
            None => self.model.observe(state.first(), None),
        }
    }

    fn noise_covariance(&self) -> &DMatrix<f64> {
        self.model.noise_covariance()
    }
}
