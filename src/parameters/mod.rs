//! # Parameter System
//!
//! Per-parameter configuration for a fit: starting values, limits, fixed
//! flags, ties, and finite-difference step policy.
//!
//! ## Core Components
//!
//! - [`Parameter`]: one unknown with its value, bounds and derivative settings
//! - [`ParameterStore`]: the indexed collection, free-index derivation and tie application
//! - [`Bounds`]: closed interval limits, infinite on an open side
//!
//! ## Example Usage
//!
//! ```rust
//! use mpfit_rs::parameters::{DerivativeSide, ParameterStore};
//!
//! let mut params = ParameterStore::new(3);
//! params.get_mut(0).unwrap().set_value(1.0, false);
//! params.get_mut(0).unwrap().set_limits(0.0, 10.0).unwrap();
//! params.get_mut(1).unwrap().set_value(0.5, true);
//! params.get_mut(2).unwrap().set_tie(|p| 2.0 * p[0]);
//! params.get_mut(2).unwrap().set_side(DerivativeSide::Both);
//!
//! assert_eq!(params.free_indices(), vec![0]);
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;


// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use parameter::{DerivativeSide, Parameter, ParameterError, TieFn};
pub use parameters::ParameterStore;
