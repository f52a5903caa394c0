//! Error types for the manifold-kalman library
//!
//! This module provides the main error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations; module-level errors convert into [`KalmanError`] so
//! applications can use a single result type end to end.

use crate::{filters::FilterError, linalg::LinAlgError};
use thiserror::Error;

/// Main result type used throughout the manifold-kalman library
pub type KalmanResult<T> = Result<T, KalmanError>;

/// Main error type for the manifold-kalman library
#[derive(Debug, Clone, Error)]
pub enum KalmanError {
    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Filter construction, propagation, or update errors
    #[error("Filter error: {0}")]
    Filter(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// General computation errors
    #[error("Computation error: {0}")]
    Computation(String),
}

// Convert module-specific errors to KalmanError

impl From<LinAlgError> for KalmanError {
    fn from(err: LinAlgError) -> Self {
        KalmanError::LinearAlgebra(err.to_string())
    }
}

impl From<FilterError> for KalmanError {
    fn from(err: FilterError) -> Self {
        KalmanError::Filter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kalman_error_display() {
        let error = KalmanError::LinearAlgebra("matrix is singular".to_string());
        assert_eq!(error.to_string(), "Linear algebra error: matrix is singular");
    }

    #[test]
    fn test_kalman_error_from_filter_error() {
        let error = KalmanError::from(FilterError::SingularInnovation);
        match error {
            KalmanError::Filter(msg) => assert!(msg.contains("singular")),
            _ => panic!("Expected filter error"),
        }
    }

    #[test]
    fn test_kalman_result_err() {
        let result: KalmanResult<i32> = Err(KalmanError::Computation("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_question_mark_converts_module_errors() {
        fn fails() -> KalmanResult<()> {
            Err(FilterError::SingularInnovation)?
        }
        assert!(matches!(fails(), Err(KalmanError::Filter(_))));
    }
}
