//! Dense linear algebra helpers shared by the filters.
//!
//! Covariance matrices must stay symmetric positive semi-definite through
//! every propagate/update cycle; the helpers here centralize the checks and
//! the factorizations so each filter does not reimplement them.

use nalgebra::DMatrix;

/// Errors from matrix factorizations and validity checks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinAlgError {
    /// The matrix is not square or has the wrong dimension.
    #[error("dimension mismatch: expected {expected}x{expected}, got {rows}x{cols}")]
    DimensionMismatch {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    /// The matrix is not symmetric within tolerance.
    #[error("matrix is not symmetric (asymmetry {asymmetry:.3e})")]
    NotSymmetric { asymmetry: f64 },
    /// The matrix has a significantly negative eigenvalue.
    #[error("matrix is not positive semi-definite (eigenvalue {eigenvalue:.3e})")]
    NotPositiveSemiDefinite { eigenvalue: f64 },
    /// A matrix that must be invertible is numerically singular.
    #[error("matrix is numerically singular")]
    Singular,
}

/// Result type for linear algebra helpers.
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Relative tolerance for symmetry and eigenvalue checks.
const PSD_TOLERANCE: f64 = 1e-9;

/// Force exact symmetry: M ← (M + Mᵀ)/2.
pub fn symmetrize(matrix: &mut DMatrix<f64>) {
    let transposed = matrix.transpose();
    *matrix += transposed;
    *matrix *= 0.5;
}

/// Check that a matrix is square of the given dimension and symmetric.
pub fn check_symmetric(matrix: &DMatrix<f64>, dim: usize) -> LinAlgResult<()> {
    if matrix.nrows() != dim || matrix.ncols() != dim {
        return Err(LinAlgError::DimensionMismatch {
            expected: dim,
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    let scale = matrix.norm().max(1.0);
    let asymmetry = (matrix - matrix.transpose()).norm();
    if asymmetry > PSD_TOLERANCE * scale {
        return Err(LinAlgError::NotSymmetric { asymmetry });
    }
    Ok(())
}

/// Lower-triangular square root `L` of a symmetric PSD matrix, `L·Lᵀ = M`.
///
/// Tries a Cholesky factorization first; on the semi-definite boundary (for
/// instance a zero initial covariance) it falls back to a symmetric
/// eigendecomposition, clamping eigenvalues within `-tol..0` to zero. A
/// significantly negative eigenvalue is an error.
pub fn sqrt_psd(matrix: &DMatrix<f64>) -> LinAlgResult<DMatrix<f64>> {
    let mut sym = matrix.clone();
    symmetrize(&mut sym);
    if let Some(chol) = sym.clone().cholesky() {
        return Ok(chol.l());
    }
    let scale = sym.norm().max(1.0);
    let eigen = sym.symmetric_eigen();
    let mut root = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (i, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda < -PSD_TOLERANCE * scale {
            return Err(LinAlgError::NotPositiveSemiDefinite { eigenvalue: lambda });
        }
        let s = lambda.max(0.0).sqrt();
        root.column_mut(i).copy_from(&(eigen.eigenvectors.column(i) * s));
    }
    // Any S with S·Sᵀ = M serves as a square root; the eigen factor is not
    // triangular but the filters only require the reconstruction property.
    Ok(root)
}

/// Validate that a matrix is a symmetric PSD covariance of dimension `dim`.
pub fn check_covariance(matrix: &DMatrix<f64>, dim: usize) -> LinAlgResult<()> {
    check_symmetric(matrix, dim)?;
    sqrt_psd(matrix).map(|_| ())
}

/// Smallest eigenvalue of a symmetric matrix, for validity assertions.
pub fn min_eigenvalue(matrix: &DMatrix<f64>) -> f64 {
    let mut sym = matrix.clone();
    symmetrize(&mut sym);
    sym.symmetric_eigen()
        .eigenvalues
        .iter()
        .fold(f64::INFINITY, |acc, &x| acc.min(x))
}

/// Solve S·x = b for symmetric positive-definite S via Cholesky.
pub fn solve_spd(matrix: &DMatrix<f64>, rhs: &DMatrix<f64>) -> LinAlgResult<DMatrix<f64>> {
    let chol = matrix.clone().cholesky().ok_or(LinAlgError::Singular)?;
    Ok(chol.solve(rhs))
}
