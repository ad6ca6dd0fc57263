use thiserror::Error;

use crate::parameters::{BoundsError, ParameterError};

/// Error types for the mpfit-rs library.
///
/// Variants fall into two groups. Configuration errors are detected before
/// any iteration happens; numerical errors stop a running solve. Running out
/// of iterations is *not* an error: it is reported through
/// [`Solution::status`](crate::Solution).
#[derive(Error, Debug)]
pub enum MpFitError {
    /// A parameter index was outside the configured parameter count.
    #[error("Parameter index {index} out of range for {count} parameters")]
    ParameterIndex { index: usize, count: usize },

    /// Error for invalid per-parameter configuration.
    #[error("Parameter error: {0}")]
    ParameterError(#[from] ParameterError),

    /// Every parameter is fixed or tied.
    #[error("No free parameters: every parameter is fixed or tied")]
    NoFreeParameters,

    /// Fewer residuals than free parameters.
    #[error("Not enough residuals: {residuals} residuals for {free} free parameters")]
    TooFewResiduals { residuals: usize, free: usize },

    /// `solve` was called before a residual function was set.
    #[error("No residual function has been set")]
    MissingResidualFunction,

    /// A solver option has an invalid value.
    #[error("Invalid solver option: {0}")]
    InvalidOption(String),

    /// Two solver options cannot be used together.
    #[error("Incompatible solver options: {0}")]
    IncompatibleOptions(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The Jacobian contained NaN or infinite entries.
    #[error("Non-finite entries in the Jacobian")]
    NonFiniteJacobian,

    /// A trial parameter vector overflowed.
    #[error("Non-finite parameter values: {0}")]
    NonFiniteParameters(String),

    /// The residual function returned NaN or infinite values.
    #[error("Residual function returned non-finite values")]
    NonFiniteResiduals,

    /// Error raised by a user-supplied residual or Jacobian function.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Not implemented functionality.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl MpFitError {
    /// Returns true for errors detected while validating the problem setup.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MpFitError::ParameterIndex { .. }
                | MpFitError::ParameterError(_)
                | MpFitError::NoFreeParameters
                | MpFitError::TooFewResiduals { .. }
                | MpFitError::MissingResidualFunction
                | MpFitError::InvalidOption(_)
                | MpFitError::IncompatibleOptions(_)
                | MpFitError::DimensionMismatch(_)
        )
    }

    /// Returns true for errors raised by the numerics during a solve.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            MpFitError::NonFiniteJacobian
                | MpFitError::NonFiniteParameters(_)
                | MpFitError::NonFiniteResiduals
        )
    }
}

impl From<BoundsError> for MpFitError {
    fn from(err: BoundsError) -> Self {
        MpFitError::ParameterError(ParameterError::from(err))
    }
}

/// Result type alias for mpfit-rs operations.
pub type Result<T> = std::result::Result<T, MpFitError>;
