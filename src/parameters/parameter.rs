//! Parameter definition and implementation
//!
//! This module provides the [`Parameter`] struct, the per-unknown record of a
//! fit: its starting value, limits, whether it is fixed or tied to other
//! parameters, and how finite-difference derivatives are taken for it.

use std::fmt;
use std::sync::Arc;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parameters::bounds::{Bounds, BoundsError};

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    #[error("Parameter {index}: {source}")]
    InvalidBounds { index: usize, source: BoundsError },

    #[error("Parameter {index} has no finite value (got {value:?})")]
    NonFiniteValue { index: usize, value: Option<f64> },

    #[error("Invalid finite-difference step {step} (must be finite and >= 0)")]
    InvalidStep { step: f64 },

    #[error("Invalid maximum step {max_step} (must be > 0)")]
    InvalidMaxStep { max_step: f64 },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },
}

/// Which side finite-difference derivatives are taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DerivativeSide {
    /// One-sided forward difference, flipped automatically near an upper limit
    #[default]
    Auto,
    /// One-sided `(f(x+h) - f(x)) / h`
    Positive,
    /// One-sided `(f(x) - f(x-h)) / h`
    Negative,
    /// Two-sided `(f(x+h) - f(x-h)) / 2h`
    Both,
}

/// A tie: computes a parameter's value from the full parameter vector.
pub type TieFn = Arc<dyn Fn(ArrayView1<f64>) -> f64 + Send + Sync>;

/// A parameter for optimization problems
///
/// Parameters are created unset; a value must be supplied either through
/// [`Parameter::set_value`] or by passing an initial guess to the solver.
/// Ties are not serialized.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    /// Optional display name
    name: Option<String>,

    /// Current value, `None` until configured
    value: Option<f64>,

    /// Whether the value is held constant
    fixed: bool,

    /// Lower and upper limits
    #[serde(default)]
    bounds: Bounds,

    /// Function deriving this parameter from the others
    #[serde(skip)]
    tie: Option<TieFn>,

    /// Explicit finite-difference step, `None` selects it automatically
    step: Option<f64>,

    /// Largest change allowed in a single iteration
    max_step: Option<f64>,

    /// Whether `step` is relative to the parameter value
    relative_step: bool,

    /// Finite-difference sidedness
    #[serde(default)]
    side: DerivativeSide,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("fixed", &self.fixed)
            .field("bounds", &self.bounds)
            .field("tied", &self.tie.is_some())
            .field("step", &self.step)
            .field("max_step", &self.max_step)
            .field("relative_step", &self.relative_step)
            .field("side", &self.side)
            .finish()
    }
}

impl Parameter {
    /// Create a new, unset parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::parameters::Parameter;
    ///
    /// let param = Parameter::new();
    /// assert_eq!(param.value(), None);
    /// assert!(param.is_free());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parameter with a starting value.
    pub fn with_value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Get the current value of the parameter
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Set the value and whether it is held fixed.
    pub fn set_value(&mut self, value: f64, fixed: bool) {
        self.value = Some(value);
        self.fixed = fixed;
    }

    /// Get the bounds of the parameter
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Get the minimum bound
    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    /// Get the maximum bound
    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Set the limits. Equal limits make the parameter fixed.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::parameters::Parameter;
    ///
    /// let mut param = Parameter::with_value(2.0);
    /// param.set_limits(2.0, 2.0).unwrap();
    /// assert!(param.is_fixed());
    /// assert!(param.set_limits(3.0, 1.0).is_err());
    /// ```
    pub fn set_limits(&mut self, min: f64, max: f64) -> Result<(), BoundsError> {
        self.bounds = Bounds::new(min, max)?;
        Ok(())
    }

    /// Whether the parameter is held constant, either explicitly or by equal limits.
    pub fn is_fixed(&self) -> bool {
        self.fixed || self.bounds.is_degenerate()
    }

    /// Whether the parameter is computed by a tie.
    pub fn is_tied(&self) -> bool {
        self.tie.is_some()
    }

    /// Whether the solver varies this parameter.
    pub fn is_free(&self) -> bool {
        !self.is_fixed() && !self.is_tied()
    }

    /// Configure the finite-difference step.
    ///
    /// `step == 0` selects the step automatically and an infinite
    /// `max_step` leaves the per-iteration change unconstrained.
    pub fn set_step(
        &mut self,
        step: f64,
        max_step: f64,
        relative: bool,
    ) -> Result<(), ParameterError> {
        if !step.is_finite() || step < 0.0 {
            return Err(ParameterError::InvalidStep { step });
        }
        if max_step.is_nan() || max_step <= 0.0 {
            return Err(ParameterError::InvalidMaxStep { max_step });
        }

        self.step = if step > 0.0 { Some(step) } else { None };
        self.max_step = if max_step.is_finite() {
            Some(max_step)
        } else {
            None
        };
        self.relative_step = relative;
        Ok(())
    }

    /// The explicit finite-difference step, if any.
    pub fn step(&self) -> Option<f64> {
        self.step
    }

    /// The maximum change per iteration, if any.
    pub fn max_step(&self) -> Option<f64> {
        self.max_step
    }

    /// Whether the explicit step is relative to the parameter value.
    pub fn relative_step(&self) -> bool {
        self.relative_step
    }

    /// Get the derivative sidedness
    pub fn side(&self) -> DerivativeSide {
        self.side
    }

    /// Set the derivative sidedness
    pub fn set_side(&mut self, side: DerivativeSide) {
        self.side = side;
    }

    /// Tie this parameter to a function of the full parameter vector.
    pub fn set_tie<F>(&mut self, tie: F)
    where
        F: Fn(ArrayView1<f64>) -> f64 + Send + Sync + 'static,
    {
        self.tie = Some(Arc::new(tie));
    }

    /// Remove a tie.
    pub fn clear_tie(&mut self) {
        self.tie = None;
    }

    /// The tie function, if any.
    pub fn tie(&self) -> Option<&TieFn> {
        self.tie.as_ref()
    }

    /// Get the display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the display name
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }
}
