//! Built-in model implementations for common fitting problems.
//!
//! Each model implements [`Model`](crate::model::Model) with analytic
//! derivatives and can build a ready-to-solve [`Problem`](crate::Problem)
//! with named parameters.

pub mod peak;
pub mod polynomial;

// Re-export the models
pub use peak::GaussianModel;
pub use polynomial::{PolynomialModel, PolynomialResiduals};
