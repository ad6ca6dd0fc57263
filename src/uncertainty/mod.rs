//! # Uncertainty Calculation
//!
//! This module provides the parameter uncertainties reported with a fit:
//!
//! - Covariance matrix recovery from the final QR factorization
//! - Standard errors for each parameter
//! - Correlation coefficients between parameters
//!
//! Fixed and tied parameters have zero rows and columns in the covariance
//! and zero standard errors.

mod covariance;

pub use covariance::{
    calculate_correlation, covariance_from_r, embed_covariance, standard_errors_from_covariance,
    FreeCovariance,
};
