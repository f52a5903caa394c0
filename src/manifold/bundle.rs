//! Composite (bundle) state: an ordered pair of Lie group elements treated as
//! one joint state.
//!
//! Group operations apply element-wise and Jacobians are assembled
//! block-diagonally in declaration order, so the combined tangent dimension is
//! the sum of the element dimensions. The estimation state of the
//! differential-drive models is `Bundle<SE2, Rn<3>>` (a pose plus three
//! calibration factors), but nothing here is specific to that layout.

use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Composite of two Lie group elements.
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle<A: LieGroup, B: LieGroup> {
    first: A,
    second: B,
}

impl<A, B> fmt::Display for Bundle<A, B>
where
    A: LieGroup + fmt::Display,
    B: LieGroup + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Write two square blocks on the diagonal of a DOF×DOF matrix, zero elsewhere.
fn block_diagonal(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    let (na, nb) = (a.nrows(), b.nrows());
    let mut out = DMatrix::zeros(na + nb, na + nb);
    out.view_mut((0, 0), (na, na)).copy_from(a);
    out.view_mut((na, na), (nb, nb)).copy_from(b);
    out
}

impl<A: LieGroup, B: LieGroup> Bundle<A, B> {
    /// Create from the two elements, in declaration order.
    pub fn new(first: A, second: B) -> Self {
        Bundle { first, second }
    }

    /// The first element.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// The second element.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// Replace the second element, keeping the first.
    pub fn with_second(&self, second: B) -> Self {
        Bundle {
            first: self.first.clone(),
            second,
        }
    }
}

impl<A: LieGroup, B: LieGroup> LieGroup for Bundle<A, B> {
    type Tangent = BundleTangent<A, B>;

    const DOF: usize = A::DOF + B::DOF;

    fn identity() -> Self {
        Bundle {
            first: A::identity(),
            second: B::identity(),
        }
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        let mut ja = jacobian.as_ref().map(|_| DMatrix::zeros(A::DOF, A::DOF));
        let mut jb = jacobian.as_ref().map(|_| DMatrix::zeros(B::DOF, B::DOF));
        let inv = Bundle {
            first: self.first.inverse(ja.as_mut()),
            second: self.second.inverse(jb.as_mut()),
        };
        if let Some(jac) = jacobian {
            *jac = block_diagonal(&ja.unwrap(), &jb.unwrap());
        }
        inv
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        let mut ja_s = jacobian_self
            .as_ref()
            .map(|_| DMatrix::zeros(A::DOF, A::DOF));
        let mut jb_s = jacobian_self
            .as_ref()
            .map(|_| DMatrix::zeros(B::DOF, B::DOF));
        let mut ja_o = jacobian_other
            .as_ref()
            .map(|_| DMatrix::zeros(A::DOF, A::DOF));
        let mut jb_o = jacobian_other
            .as_ref()
            .map(|_| DMatrix::zeros(B::DOF, B::DOF));
        let composed = Bundle {
            first: self.first.compose(&other.first, ja_s.as_mut(), ja_o.as_mut()),
            second: self
                .second
                .compose(&other.second, jb_s.as_mut(), jb_o.as_mut()),
        };
        if let Some(jac) = jacobian_self {
            *jac = block_diagonal(&ja_s.unwrap(), &jb_s.unwrap());
        }
        if let Some(jac) = jacobian_other {
            *jac = block_diagonal(&ja_o.unwrap(), &jb_o.unwrap());
        }
        composed
    }

    fn log(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Tangent {
        let mut ja = jacobian.as_ref().map(|_| DMatrix::zeros(A::DOF, A::DOF));
        let mut jb = jacobian.as_ref().map(|_| DMatrix::zeros(B::DOF, B::DOF));
        let tangent = BundleTangent {
            first: self.first.log(ja.as_mut()),
            second: self.second.log(jb.as_mut()),
        };
        if let Some(jac) = jacobian {
            *jac = block_diagonal(&ja.unwrap(), &jb.unwrap());
        }
        tangent
    }

    fn adjoint(&self) -> DMatrix<f64> {
        block_diagonal(&self.first.adjoint(), &self.second.adjoint())
    }

    fn random() -> Self {
        Bundle {
            first: A::random(),
            second: B::random(),
        }
    }
}

/// Tangent vector of a two-element bundle; coefficients are stacked in
/// declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct BundleTangent<A: LieGroup, B: LieGroup> {
    first: A::Tangent,
    second: B::Tangent,
}

impl<A: LieGroup, B: LieGroup> BundleTangent<A, B> {
    /// Create from the two tangent parts.
    pub fn new(first: A::Tangent, second: B::Tangent) -> Self {
        BundleTangent { first, second }
    }

    /// The first tangent part.
    pub fn first(&self) -> &A::Tangent {
        &self.first
    }

    /// The second tangent part.
    pub fn second(&self) -> &B::Tangent {
        &self.second
    }
}

impl<A: LieGroup, B: LieGroup> Tangent for BundleTangent<A, B> {
    type Group = Bundle<A, B>;

    fn exp(&self, jacobian: Option<&mut DMatrix<f64>>) -> Bundle<A, B> {
        let mut ja = jacobian.as_ref().map(|_| DMatrix::zeros(A::DOF, A::DOF));
        let mut jb = jacobian.as_ref().map(|_| DMatrix::zeros(B::DOF, B::DOF));
        let element = Bundle {
            first: self.first.exp(ja.as_mut()),
            second: self.second.exp(jb.as_mut()),
        };
        if let Some(jac) = jacobian {
            *jac = block_diagonal(&ja.unwrap(), &jb.unwrap());
        }
        element
    }

    fn right_jacobian(&self) -> DMatrix<f64> {
        block_diagonal(&self.first.right_jacobian(), &self.second.right_jacobian())
    }

    fn right_jacobian_inv(&self) -> DMatrix<f64> {
        block_diagonal(
            &self.first.right_jacobian_inv(),
            &self.second.right_jacobian_inv(),
        )
    }

    fn coeffs(&self) -> DVector<f64> {
        let mut out = DVector::zeros(A::DOF + B::DOF);
        out.rows_mut(0, A::DOF).copy_from(&self.first.coeffs());
        out.rows_mut(A::DOF, B::DOF).copy_from(&self.second.coeffs());
        out
    }

    fn from_coeffs(coeffs: &DVector<f64>) -> Self {
        assert_eq!(
            coeffs.len(),
            A::DOF + B::DOF,
            "BundleTangent expects a {}-dimensional vector",
            A::DOF + B::DOF
        );
        BundleTangent {
            first: A::Tangent::from_coeffs(&coeffs.rows(0, A::DOF).into_owned()),
            second: B::Tangent::from_coeffs(&coeffs.rows(A::DOF, B::DOF).into_owned()),
        }
    }

    fn zero() -> Self {
        BundleTangent {
            first: A::Tangent::zero(),
            second: B::Tangent::zero(),
        }
    }
}
