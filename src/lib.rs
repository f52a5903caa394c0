//! Kalman filtering on matrix Lie groups with odometry self-calibration.
//!
//! The state lives on a manifold, a pose composed with Euclidean calibration
//! factors, and four interchangeable filters (EKF, square-root EKF, invariant
//! EKF, unscented Kalman filter on manifolds) estimate it from wheel odometry,
//! landmark observations, and GPS fixes.

pub mod error;
pub mod filters;
pub mod linalg;
pub mod logger;
pub mod manifold;
pub mod models;
pub mod sim;

pub use error::{KalmanError, KalmanResult};
pub use logger::{init_logger, init_logger_with_level};
