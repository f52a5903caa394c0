//! SE(2): rigid body transformations in the plane.
//!
//! Elements combine a 2-D rotation (SO2) and a 2-D translation. Tangent
//! vectors are `[x, y, theta]`: translational part first, rotational part
//! last, following the [manif](https://github.com/artivis/manif) conventions.
//!
//! The exponential map is the closed-form screw motion: for a tangent with
//! angular component θ the translation moves along a circular arc of radius
//! ‖ρ‖/θ; the θ → 0 branch degenerates to a straight-line translation and is
//! handled explicitly with series expansions, so a zero-angle arc is a valid
//! input, never a division by zero.

use crate::manifold::so2::SO2;
use crate::manifold::{LieGroup, Tangent};
use nalgebra::{DMatrix, DVector, Matrix2, Vector2, Vector3};
use std::fmt;

/// Angle threshold below which series expansions replace the closed forms.
const SMALL_ANGLE: f64 = 1e-4;

/// The coefficients a = sin(θ)/θ and b = (1−cos(θ))/θ with their θ → 0 limits.
fn arc_coefficients(theta: f64) -> (f64, f64) {
    if theta.abs() < SMALL_ANGLE {
        let theta2 = theta * theta;
        (1.0 - theta2 / 6.0, theta / 2.0 * (1.0 - theta2 / 12.0))
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

/// The coefficients c = (θ−sin θ)/θ² and d = (1−cos θ)/θ² with their limits.
fn curvature_coefficients(theta: f64) -> (f64, f64) {
    if theta.abs() < SMALL_ANGLE {
        let theta2 = theta * theta;
        (theta / 6.0 * (1.0 - theta2 / 20.0), 0.5 - theta2 / 24.0)
    } else {
        let theta2 = theta * theta;
        ((theta - theta.sin()) / theta2, (1.0 - theta.cos()) / theta2)
    }
}

/// (θ/2)·cot(θ/2) with its θ → 0 limit.
fn half_cot_half(theta: f64) -> f64 {
    if theta.abs() < SMALL_ANGLE {
        1.0 - theta * theta / 12.0
    } else {
        let half = 0.5 * theta;
        half * half.cos() / half.sin()
    }
}

/// SE(2) group element.
#[derive(Clone, Debug, PartialEq)]
pub struct SE2 {
    translation: Vector2<f64>,
    rotation: SO2,
}

impl fmt::Display for SE2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.translation.x,
            self.translation.y,
            self.angle()
        )
    }
}

impl SE2 {
    /// Degrees of freedom, the dimension of the tangent space.
    pub const DOF: usize = 3;

    /// Create from translation and rotation parts.
    pub fn new(translation: Vector2<f64>, rotation: SO2) -> Self {
        SE2 {
            translation,
            rotation,
        }
    }

    /// Create from translation components and an angle.
    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        SE2::new(Vector2::new(x, y), SO2::from_angle(theta))
    }

    /// The translation part.
    pub fn translation(&self) -> Vector2<f64> {
        self.translation
    }

    /// The rotation part.
    pub fn rotation(&self) -> SO2 {
        self.rotation.clone()
    }

    /// The rotation angle in (−π, π].
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// The x component of translation.
    pub fn x(&self) -> f64 {
        self.translation.x
    }

    /// The y component of translation.
    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// The 2×2 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.rotation_matrix()
    }

    /// Group action on a 2-D point: g ⊙ p = R·p + t.
    ///
    /// # Arguments
    /// * `jacobian_self` - optional 2×3 Jacobian ∂(g⊙p)/∂g
    /// * `jacobian_point` - optional 2×2 Jacobian ∂(g⊙p)/∂p
    pub fn act(
        &self,
        point: &Vector2<f64>,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_point: Option<&mut DMatrix<f64>>,
    ) -> Vector2<f64> {
        let rot = self.rotation_matrix();
        if let Some(jac) = jacobian_self {
            // d/dδθ of R·R(δθ)·p is R·[1]ₓ·p
            let turned = rot * Vector2::new(-point.y, point.x);
            *jac = DMatrix::from_row_slice(
                2,
                3,
                &[
                    rot[(0, 0)],
                    rot[(0, 1)],
                    turned.x,
                    rot[(1, 0)],
                    rot[(1, 1)],
                    turned.y,
                ],
            );
        }
        if let Some(jac) = jacobian_point {
            *jac = DMatrix::from_row_slice(
                2,
                2,
                &[rot[(0, 0)], rot[(0, 1)], rot[(1, 0)], rot[(1, 1)]],
            );
        }
        rot * point + self.translation
    }
}

impl LieGroup for SE2 {
    type Tangent = SE2Tangent;

    const DOF: usize = 3;

    fn identity() -> Self {
        SE2::new(Vector2::zeros(), SO2::identity())
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        let inv_rotation = self.rotation.inverse(None);
        let inv_translation = -(inv_rotation.rotation_matrix() * self.translation);
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SE2::new(inv_translation, inv_rotation)
    }

    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = other.inverse(None).adjoint();
        }
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(3, 3);
        }
        let rotation = self.rotation.compose(&other.rotation, None, None);
        let translation = self.translation + self.rotation_matrix() * other.translation;
        SE2::new(translation, rotation)
    }

    fn log(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Tangent {
        let theta = self.angle();
        // rho = V(θ)⁻¹ · t
        let hcot = half_cot_half(theta);
        let half = 0.5 * theta;
        let rho = Vector2::new(
            hcot * self.translation.x + half * self.translation.y,
            -half * self.translation.x + hcot * self.translation.y,
        );
        let tangent = SE2Tangent::from_parts(rho, theta);
        if let Some(jac) = jacobian {
            *jac = tangent.right_jacobian_inv();
        }
        tangent
    }

    fn adjoint(&self) -> DMatrix<f64> {
        let rot = self.rotation_matrix();
        DMatrix::from_row_slice(
            3,
            3,
            &[
                rot[(0, 0)],
                rot[(0, 1)],
                self.translation.y,
                rot[(1, 0)],
                rot[(1, 1)],
                -self.translation.x,
                0.0,
                0.0,
                1.0,
            ],
        )
    }

    fn random() -> Self {
        SE2::new(
            Vector2::new(
                rand::random::<f64>() * 10.0 - 5.0,
                rand::random::<f64>() * 10.0 - 5.0,
            ),
            SO2::random(),
        )
    }
}

/// SE(2) tangent space element, stored as `[x, y, theta]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SE2Tangent {
    data: Vector3<f64>,
}

impl fmt::Display for SE2Tangent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "se2(x: {:.4}, y: {:.4}, theta: {:.4})",
            self.data.x, self.data.y, self.data.z
        )
    }
}

impl SE2Tangent {
    /// Create from components.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        SE2Tangent {
            data: Vector3::new(x, y, theta),
        }
    }

    /// Create from a translational part and an angle.
    pub fn from_parts(rho: Vector2<f64>, theta: f64) -> Self {
        SE2Tangent::new(rho.x, rho.y, theta)
    }

    /// The x component.
    pub fn x(&self) -> f64 {
        self.data.x
    }

    /// The y component.
    pub fn y(&self) -> f64 {
        self.data.y
    }

    /// The angular component.
    pub fn angle(&self) -> f64 {
        self.data.z
    }

    /// The translational part.
    pub fn rho(&self) -> Vector2<f64> {
        Vector2::new(self.data.x, self.data.y)
    }

    /// Third column of the right Jacobian, shared with its inverse.
    fn right_jacobian_third_column(&self) -> Vector2<f64> {
        let theta = self.data.z;
        let (c, d) = curvature_coefficients(theta);
        Vector2::new(
            self.data.x * c - self.data.y * d,
            self.data.x * d + self.data.y * c,
        )
    }
}

impl Tangent for SE2Tangent {
    type Group = SE2;

    fn exp(&self, jacobian: Option<&mut DMatrix<f64>>) -> SE2 {
        let theta = self.data.z;
        let (a, b) = arc_coefficients(theta);
        // t = V(θ)·ρ with V = [[a, −b], [b, a]]
        let translation = Vector2::new(
            a * self.data.x - b * self.data.y,
            b * self.data.x + a * self.data.y,
        );
        if let Some(jac) = jacobian {
            *jac = self.right_jacobian();
        }
        SE2::new(translation, SO2::from_angle(theta))
    }

    fn right_jacobian(&self) -> DMatrix<f64> {
        let theta = self.data.z;
        let (a, b) = arc_coefficients(theta);
        let col = self.right_jacobian_third_column();
        DMatrix::from_row_slice(
            3,
            3,
            &[a, b, col.x, -b, a, col.y, 0.0, 0.0, 1.0],
        )
    }

    fn right_jacobian_inv(&self) -> DMatrix<f64> {
        let theta = self.data.z;
        let hcot = half_cot_half(theta);
        let half = 0.5 * theta;
        // inverse of the 2×2 block of Jr
        let m_inv = Matrix2::new(hcot, -half, half, hcot);
        let col = -(m_inv * self.right_jacobian_third_column());
        DMatrix::from_row_slice(
            3,
            3,
            &[
                m_inv[(0, 0)],
                m_inv[(0, 1)],
                col.x,
                m_inv[(1, 0)],
                m_inv[(1, 1)],
                col.y,
                0.0,
                0.0,
                1.0,
            ],
        )
    }

    fn coeffs(&self) -> DVector<f64> {
        DVector::from_column_slice(self.data.as_slice())
    }

    fn from_coeffs(coeffs: &DVector<f64>) -> Self {
        assert_eq!(
            coeffs.len(),
            3,
            "SE2Tangent expects a 3-dimensional vector [x, y, theta]"
        );
        SE2Tangent::new(coeffs[0], coeffs[1], coeffs[2])
    }

    fn zero() -> Self {
        SE2Tangent::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::test_util::check_jacobian;
    use std::f64::consts::PI;

    const TOLERANCE: f64 = 1e-10;

    #[test]
    fn test_se2_identity() {
        let id = SE2::identity();
        assert!(id.x().abs() < TOLERANCE);
        assert!(id.y().abs() < TOLERANCE);
        assert!(id.angle().abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_compose_inverse_is_identity() {
        let g = SE2::from_xy_angle(1.0, 2.0, PI / 4.0);
        let id = g.compose(&g.inverse(None), None, None);
        assert!(id.is_approx(&SE2::identity(), TOLERANCE));
    }

    #[test]
    fn test_se2_exp_log_round_trip() {
        for tangent in [
            SE2Tangent::new(0.1, 0.2, 0.3),
            SE2Tangent::new(-1.5, 0.7, -2.8),
            SE2Tangent::new(0.4, -0.3, 1e-7),
            SE2Tangent::new(1.0, 0.0, 0.0),
        ] {
            let recovered = tangent.exp(None).log(None);
            assert!(
                (recovered.coeffs() - tangent.coeffs()).norm() < 1e-9,
                "round trip failed for {tangent}"
            );
        }
    }

    #[test]
    fn test_se2_plus_minus_round_trip() {
        let x = SE2::from_xy_angle(0.5, -1.0, 0.9);
        let v = SE2Tangent::new(0.2, -0.1, 0.4);
        let recovered = x.right_plus(&v, None, None).right_minus(&x);
        assert!((recovered.coeffs() - v.coeffs()).norm() < 1e-9);
    }

    #[test]
    fn test_se2_zero_angle_is_straight_line() {
        let tangent = SE2Tangent::new(0.7, 0.0, 0.0);
        let g = tangent.exp(None);
        assert!((g.x() - 0.7).abs() < TOLERANCE);
        assert!(g.y().abs() < TOLERANCE);
        assert!(g.angle().abs() < TOLERANCE);
    }

    #[test]
    fn test_se2_small_angle_branch_continuity() {
        // The series branch must agree with the closed form near the threshold.
        for theta in [9.9e-5, 1.01e-4] {
            let (a, b) = arc_coefficients(theta);
            assert!((a - theta.sin() / theta).abs() < 1e-12);
            assert!((b - (1.0 - theta.cos()) / theta).abs() < 1e-12);
        }
    }

    #[test]
    fn test_se2_exp_jacobian_finite_difference() {
        let v = SE2Tangent::new(0.3, -0.2, 0.8);
        let jr = v.right_jacobian();
        let eps = 1e-7;
        let base = v.exp(None);
        for i in 0..3 {
            let mut coeffs = v.coeffs();
            coeffs[i] += eps;
            let perturbed = SE2Tangent::from_coeffs(&coeffs).exp(None);
            let numeric = perturbed.right_minus(&base).coeffs() / eps;
            for r in 0..3 {
                assert!(
                    (numeric[r] - jr[(r, i)]).abs() < 1e-5,
                    "Jr mismatch at ({r}, {i})"
                );
            }
        }
    }

    #[test]
    fn test_se2_right_jacobian_inverse() {
        for v in [
            SE2Tangent::new(0.3, -0.2, 0.8),
            SE2Tangent::new(1.0, 2.0, 1e-9),
        ] {
            let product = v.right_jacobian() * v.right_jacobian_inv();
            assert!((product - DMatrix::identity(3, 3)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_se2_adjoint_definition() {
        // Ad(g)·τ == Log(g ∘ Exp(τ) ∘ g⁻¹)
        let g = SE2::from_xy_angle(1.0, -0.5, 0.6);
        let v = SE2Tangent::new(0.01, 0.02, -0.015);
        let lhs = g.adjoint() * v.coeffs();
        let rhs = g
            .compose(&v.exp(None), None, None)
            .compose(&g.inverse(None), None, None)
            .log(None)
            .coeffs();
        assert!((lhs - rhs).norm() < 1e-6);
    }

    #[test]
    fn test_se2_compose_jacobians_finite_difference() {
        let a = SE2::from_xy_angle(0.3, 0.1, -0.4);
        let b = SE2::from_xy_angle(-0.6, 0.9, 1.1);
        let mut ja = DMatrix::zeros(3, 3);
        let mut jb = DMatrix::zeros(3, 3);
        a.compose(&b, Some(&mut ja), Some(&mut jb));
        check_jacobian(&a, |x: &SE2| x.compose(&b, None, None), &ja, 1e-5);
        check_jacobian(&b, |x: &SE2| a.compose(x, None, None), &jb, 1e-5);
    }

    #[test]
    fn test_se2_act() {
        let g = SE2::from_xy_angle(1.0, 2.0, PI / 2.0);
        let p = g.act(&Vector2::new(1.0, 0.0), None, None);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_se2_act_jacobian_finite_difference() {
        let g = SE2::from_xy_angle(0.4, -0.7, 0.9);
        let point = Vector2::new(2.0, -1.0);
        let mut jac = DMatrix::zeros(2, 3);
        let base = g.act(&point, Some(&mut jac), None);
        let eps = 1e-7;
        for i in 0..3 {
            let mut v = DVector::zeros(3);
            v[i] = eps;
            let perturbed = g
                .right_plus(&SE2Tangent::from_coeffs(&v), None, None)
                .act(&point, None, None);
            let numeric = (perturbed - base) / eps;
            for r in 0..2 {
                assert!(
                    (numeric[r] - jac[(r, i)]).abs() < 1e-5,
                    "act jacobian mismatch at ({r}, {i})"
                );
            }
        }
    }
}
