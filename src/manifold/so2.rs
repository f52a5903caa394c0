//! SO(2): rotations in the plane.
//!
//! Elements are stored as an angle normalized to (−π, π]. The tangent space is
//! one-dimensional, so every Jacobian of a purely rotational operation is the
//! 1×1 identity.

use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use std::fmt;

/// Wrap an angle into (−π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut a = angle % two_pi;
    if a > std::f64::consts::PI {
        a -= two_pi;
    } else if a <= -std::f64::consts::PI {
        a += two_pi;
    }
    a
}

/// SO(2) group element.
#[derive(Clone, Debug, PartialEq)]
pub struct SO2 {
    angle: f64,
}

impl fmt::Display for SO2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO2({:.4})", self.angle)
    }
}

impl SO2 {
    /// Degrees of freedom.
    pub const DOF: usize = 1;

    /// Create a rotation from an angle in radians.
    pub fn from_angle(angle: f64) -> Self {
        SO2 {
            angle: normalize_angle(angle),
        }
    }

    /// The rotation angle in (−π, π].
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The 2×2 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        let (s, c) = self.angle.sin_cos();
        Matrix2::new(c, -s, s, c)
    }

    /// Rotate a 2-D point.
    pub fn act(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation_matrix() * point
    }
}

impl LieGroup for SO2 {
    type Tangent = SO2Tangent;

    const DOF: usize = 1;

    fn identity() -> Self {
        SO2 { angle: 0.0 }
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = DMatrix::from_element(1, 1, -1.0);
        }
        SO2::from_angle(-self.angle)
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = DMatrix::identity(1, 1);
        }
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(1, 1);
        }
        SO2::from_angle(self.angle + other.angle)
    }

    fn log(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Tangent {
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(1, 1);
        }
        SO2Tangent::new(self.angle)
    }

    fn adjoint(&self) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    fn random() -> Self {
        SO2::from_angle((rand::random::<f64>() - 0.5) * 2.0 * std::f64::consts::PI)
    }
}

/// SO(2) tangent space element, a single angle rate.
#[derive(Clone, Debug, PartialEq)]
pub struct SO2Tangent {
    angle: f64,
}

impl SO2Tangent {
    /// Create a tangent vector from an angle.
    pub fn new(angle: f64) -> Self {
        SO2Tangent { angle }
    }

    /// The angle component.
    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl Tangent for SO2Tangent {
    type Group = SO2;

    fn exp(&self, jacobian: Option<&mut DMatrix<f64>>) -> SO2 {
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(1, 1);
        }
        SO2::from_angle(self.angle)
    }

    fn right_jacobian(&self) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    fn right_jacobian_inv(&self) -> DMatrix<f64> {
        DMatrix::identity(1, 1)
    }

    fn coeffs(&self) -> DVector<f64> {
        DVector::from_element(1, self.angle)
    }

    fn from_coeffs(coeffs: &DVector<f64>) -> Self {
        assert_eq!(coeffs.len(), 1, "SO2Tangent expects a 1-dimensional vector");
        SO2Tangent::new(coeffs[0])
    }

    fn zero() -> Self {
        SO2Tangent::new(0.0)
    }
}
