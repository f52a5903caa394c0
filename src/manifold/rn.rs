//! R^N: the Euclidean vector space as a trivial Lie group.
//!
//! Composition is vector addition, the exponential map is the identity map,
//! and every Jacobian is the identity matrix. Used for the calibration block
//! of the composite state.

use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DMatrix, DVector, SVector};
use std::fmt;

/// R^N group element.
#[derive(Clone, Debug, PartialEq)]
pub struct Rn<const N: usize> {
    data: SVector<f64, N>,
}

impl<const N: usize> fmt::Display for Rn<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}{:.4?}", N, self.data.as_slice())
    }
}

impl<const N: usize> Rn<N> {
    /// Create from a fixed-size vector.
    pub fn new(data: SVector<f64, N>) -> Self {
        Rn { data }
    }

    /// Create from a slice of length N.
    ///
    /// # Panics
    /// Panics if the slice length is not N.
    pub fn from_slice(data: &[f64]) -> Self {
        Rn {
            data: SVector::from_column_slice(data),
        }
    }

    /// The underlying vector.
    pub fn vector(&self) -> SVector<f64, N> {
        self.data
    }

    /// Coefficients as a dynamic vector.
    pub fn coeffs(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    /// Component access.
    pub fn get(&self, i: usize) -> f64 {
        self.data[i]
    }
}

impl<const N: usize> LieGroup for Rn<N> {
    type Tangent = RnTangent<N>;

    const DOF: usize = N;

    fn identity() -> Self {
        Rn {
            data: SVector::zeros(),
        }
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = -DMatrix::identity(N, N);
        }
        Rn { data: -self.data }
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = DMatrix::identity(N, N);
        }
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(N, N);
        }
        Rn {
            data: self.data + other.data,
        }
    }

    fn log(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Tangent {
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(N, N);
        }
        RnTangent { data: self.data }
    }

    fn adjoint(&self) -> DMatrix<f64> {
        DMatrix::identity(N, N)
    }

    fn random() -> Self {
        Rn {
            data: SVector::from_fn(|_, _| rand::random::<f64>() * 2.0 - 1.0),
        }
    }
}

/// R^N tangent space element; identical in content to the group element.
#[derive(Clone, Debug, PartialEq)]
pub struct RnTangent<const N: usize> {
    data: SVector<f64, N>,
}

impl<const N: usize> RnTangent<N> {
    /// Create from a fixed-size vector.
    pub fn new(data: SVector<f64, N>) -> Self {
        RnTangent { data }
    }
}

impl<const N: usize> Tangent for RnTangent<N> {
    type Group = Rn<N>;

    fn exp(&self, jacobian: Option<&mut DMatrix<f64>>) -> Rn<N> {
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(N, N);
        }
        Rn { data: self.data }
    }

    fn right_jacobian(&self) -> DMatrix<f64> {
        DMatrix::identity(N, N)
    }

    fn right_jacobian_inv(&self) -> DMatrix<f64> {
        DMatrix::identity(N, N)
    }

    fn coeffs(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn from_coeffs(coeffs: &DVector<f64>) -> Self {
        assert_eq!(coeffs.len(), N, "RnTangent expects an N-dimensional vector");
        RnTangent {
            data: SVector::from_column_slice(coeffs.as_slice()),
        }
    }

    fn zero() -> Self {
        RnTangent {
            data: SVector::zeros(),
        }
    }
}
