//! Manifold representations for estimation on non-Euclidean state spaces.
//!
//! This module provides the Lie groups used by the filters:
//! - **SO(2)**: rotations in the plane
//! - **SE(2)**: rigid transformations in the plane
//! - **R^N**: Euclidean vectors as a trivial (vector-space) Lie group
//! - **Bundle**: an ordered composite of two group elements treated as one state
//!
//! Lie group M,° | dim | DOF | X ∈ M             | Exp(τ)        | Comp. | Action
//! ------------- | --- | --- | ----------------- | ------------- | ----- | ------
//! n-D vector    | n   | n   | v ∈ Rⁿ            | v             | v₁+v₂ | v + x
//! Rotation      | 2   | 1   | R, RᵀR = I        | R = exp([θ]x) | R₁R₂  | Rx
//! Rigid motion  | 2   | 3   | M = [R t; 0 1]    | Exp([τ]^)     | M₁M₂  | Rx+t
//!
//! The design follows the [manif](https://github.com/artivis/manif) C++ library
//! conventions: right-handed perturbations, analytic Jacobians for every
//! operation, and optional Jacobian out-parameters so callers only pay for the
//! derivatives they need.
//!
//! All Jacobians are expressed with respect to perturbations on the *local*
//! (right) tangent space, i.e. for an operation `Y = f(X)` the returned matrix
//! `J` satisfies `f(X ⊞ δ) ≈ Y ⊞ J·δ` for small `δ`.

use nalgebra::{DMatrix, DVector};
use std::fmt::Debug;

pub mod bundle;
pub mod rn;
pub mod se2;
pub mod so2;

pub use bundle::{Bundle, BundleTangent};
pub use rn::{Rn, RnTangent};
pub use se2::{SE2Tangent, SE2};
pub use so2::{SO2Tangent, SO2};

/// Core trait for Lie group elements.
///
/// Provides group operations (composition, inverse, identity), the
/// logarithmic map, right plus/minus, and the adjoint: everything the
/// filters need to linearize about the current estimate.
///
/// Jacobian out-parameters are resized and overwritten when present.
pub trait LieGroup: Clone + Debug {
    /// The tangent space vector type.
    type Tangent: Tangent<Group = Self>;

    /// Degrees of freedom, the dimension of the tangent space.
    const DOF: usize;

    /// The neutral element e such that e ∘ g = g ∘ e = g.
    fn identity() -> Self;

    /// Inverse g⁻¹ with optional Jacobian ∂(g⁻¹)/∂g = −Ad(g).
    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self;

    /// Group composition g₁ ∘ g₂.
    ///
    /// Optional Jacobians: ∂(g₁∘g₂)/∂g₁ = Ad(g₂⁻¹) and ∂(g₁∘g₂)/∂g₂ = I.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self;

    /// Logarithmic map log(g)∨ ∈ 𝔤 with optional Jacobian Jr⁻¹(log(g)∨).
    fn log(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Tangent;

    /// Right plus: g ⊞ τ = g ∘ Exp(τ).
    ///
    /// Optional Jacobians: ∂(g⊞τ)/∂g = Ad(Exp(τ))⁻¹ and ∂(g⊞τ)/∂τ = Jr(τ).
    fn right_plus(
        &self,
        tangent: &Self::Tangent,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_tangent: Option<&mut DMatrix<f64>>,
    ) -> Self {
        let exp = tangent.exp(jacobian_tangent);
        if let Some(jac) = jacobian_self {
            *jac = exp.inverse(None).adjoint();
        }
        self.compose(&exp, None, None)
    }

    /// Right minus: g₁ ⊟ g₂ = Log(g₂⁻¹ ∘ g₁), the tangent vector at g₂
    /// pointing towards g₁.
    fn right_minus(&self, other: &Self) -> Self::Tangent {
        other.inverse(None).compose(self, None, None).log(None)
    }

    /// Left plus: τ ⊞ g = Exp(τ) ∘ g.
    fn left_plus(&self, tangent: &Self::Tangent) -> Self {
        tangent.exp(None).compose(self, None, None)
    }

    /// Adjoint matrix Ad(g), mapping tangent vectors between reference frames:
    /// Ad(g)·τ = Log(g ∘ Exp(τ) ∘ g⁻¹).
    fn adjoint(&self) -> DMatrix<f64>;

    /// A random element, useful for tests.
    fn random() -> Self;

    /// Approximate equality via the norm of the right minus.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other).is_zero(tolerance)
    }
}

/// Trait for tangent space (Lie algebra) vectors.
///
/// Tangent vectors cross the filter API as plain `DVector<f64>` coefficient
/// vectors; `coeffs`/`from_coeffs` convert between the two views.
pub trait Tangent: Clone + Debug {
    /// The associated Lie group type.
    type Group: LieGroup<Tangent = Self>;

    /// Exponential map Exp(τ) with optional Jacobian Jr(τ).
    fn exp(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self::Group;

    /// Right Jacobian Jr(τ): Exp(τ + δ) ≈ Exp(τ) ∘ Exp(Jr(τ)·δ).
    fn right_jacobian(&self) -> DMatrix<f64>;

    /// Inverse of the right Jacobian.
    fn right_jacobian_inv(&self) -> DMatrix<f64>;

    /// Coefficients as a dynamic vector of length `Group::DOF`.
    fn coeffs(&self) -> DVector<f64>;

    /// Build from a coefficient vector.
    ///
    /// # Panics
    /// Panics if the vector length does not equal `Group::DOF`.
    fn from_coeffs(coeffs: &DVector<f64>) -> Self;

    /// The zero tangent vector.
    fn zero() -> Self;

    /// Whether all coefficients are below `tolerance` in norm.
    fn is_zero(&self, tolerance: f64) -> bool {
        self.coeffs().norm() < tolerance
    }
}
