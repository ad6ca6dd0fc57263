//! # mpfit-rs
//!
//! `mpfit-rs` is a Rust implementation of the MINPACK Levenberg-Marquardt
//! algorithm for constrained nonlinear least-squares fitting, in the form
//! popularized by MPFIT.
//!
//! The library provides:
//! - A trust-region Levenberg-Marquardt solver with careful norms and
//!   column-pivoted QR
//! - Per-parameter limits, fixed parameters, ties and step caps
//! - Analytic or finite-difference Jacobians with configurable sides
//! - Parameter covariance and one-sigma errors at the solution
//! - A model layer for fitting functions of a sample variable to data
//!
//! ## Basic Usage
//!
//! ```
//! use mpfit_rs::{Problem, SolverConfig};
//!
//! // Fit y = a + b·x to three points, with b held non-negative
//! let xs = [0.0, 1.0, 2.0];
//! let ys = [1.1, 2.9, 5.2];
//!
//! let mut problem = Problem::new(2);
//! problem.set_residual_fn(3, move |p, mut r| {
//!     for i in 0..3 {
//!         r[i] = ys[i] - (p[0] + p[1] * xs[i]);
//!     }
//!     Ok(())
//! });
//! problem.set_limits(1, 0.0, f64::INFINITY).unwrap();
//! problem.set_config(SolverConfig::default().with_max_iterations(50));
//!
//! let solution = problem.solve(Some(&[0.0, 1.0])).unwrap();
//! assert!(solution.converged());
//! assert!((solution.params[1] - 2.05).abs() < 1e-8);
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

// Numerical building blocks
pub mod linalg;
mod utils;

// Solver
pub mod lm;
pub mod problem;
pub mod solution;
pub mod uncertainty;

// Models
pub mod model;
pub mod models;

// Re-exports for convenience
pub use error::{MpFitError, Result};
pub use lm::{DiffMethod, LevenbergMarquardt, SolverConfig, TerminationReason};
pub use model::{Model, ModelResiduals};
pub use parameters::{DerivativeSide, ParameterStore};
pub use problem::{Problem, ResidualFunction};
pub use solution::Solution;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
