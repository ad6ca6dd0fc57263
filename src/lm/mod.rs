//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the MINPACK trust-region form of the
//! Levenberg-Marquardt algorithm, extended with parameter limits,
//! per-iteration step caps, fixed and tied parameters.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub(crate) mod evaluator;
pub mod step;
pub mod trust_region;

// Re-export key types
pub use algorithm::LevenbergMarquardt;
pub use config::{DiffMethod, SolverConfig};
pub use convergence::{
    ConvergenceCriteria, StepStatistics, TerminationReason, TerminationStatus,
};
pub use evaluator::JacobianMode;
pub use step::{lmpar, LmStep};
pub use trust_region::TrustRegion;
