//! Configuration options for the Levenberg-Marquardt solver.
//!
//! This module defines the tolerances, trust-region settings and
//! Jacobian options that control a solve. Defaults follow MPFIT.

use serde::{Deserialize, Serialize};

use crate::error::{MpFitError, Result};
use crate::linalg::enorm::NormMethod;

/// Method for calculating the Jacobian matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// Use the analytical Jacobian when the residual function provides one,
    /// finite differences otherwise
    #[default]
    Auto,

    /// Use finite differences to approximate the Jacobian
    FiniteDifference,

    /// Use the analytical Jacobian provided by the residual function
    Analytical,
}

/// Configuration options for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Tolerance on the relative reduction in the sum of squares. Default: 1e-10
    pub ftol: f64,

    /// Tolerance on the relative change in parameter values. Default: 1e-10
    pub xtol: f64,

    /// Tolerance on the orthogonality of residuals and Jacobian columns. Default: 1e-10
    pub gtol: f64,

    /// Residual damping scale; `r` is replaced by `tanh(r / damp)` when
    /// positive. Default: 0 (off)
    pub damp: f64,

    /// Initial trust-region radius factor. Default: 100
    pub factor: f64,

    /// Maximum number of outer iterations. Zero evaluates the covariance at
    /// the starting point without stepping. Default: 200
    pub max_iterations: usize,

    /// Maximum number of residual evaluations. Default: unlimited
    pub max_evaluations: Option<usize>,

    /// Relative error in the residual function, used to size finite
    /// difference steps. Default: machine precision
    pub epsfcn: Option<f64>,

    /// Relative tolerance for rank detection in the covariance. Default: 1e-14
    pub covtol: f64,

    /// Fixed scaling diagonal, one entry per parameter. Default: scale
    /// from the Jacobian column norms
    pub diag: Option<Vec<f64>>,

    /// Fail when the residual function returns NaN or infinity. Default: true
    pub finite_check: bool,

    /// Norm used for residual and step lengths. Default: Careful
    pub norm: NormMethod,

    /// Method to use for calculating the Jacobian. Default: Auto
    pub diff_method: DiffMethod,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-10,
            damp: 0.0,
            factor: 100.0,
            max_iterations: 200,
            max_evaluations: None,
            epsfcn: None,
            covtol: 1e-14,
            diag: None,
            finite_check: true,
            norm: NormMethod::default(),
            diff_method: DiffMethod::default(),
        }
    }
}

fn check_tolerance(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MpFitError::InvalidOption(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

impl SolverConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative sum-of-squares tolerance
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the relative parameter tolerance
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    /// Set the gradient orthogonality tolerance
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    /// Set the residual damping scale
    pub fn with_damp(mut self, damp: f64) -> Self {
        self.damp = damp;
        self
    }

    /// Set the initial trust-region factor
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Set the iteration limit
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the residual evaluation limit
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    /// Set the relative error of the residual function
    pub fn with_epsfcn(mut self, epsfcn: f64) -> Self {
        self.epsfcn = Some(epsfcn);
        self
    }

    /// Set the covariance rank tolerance
    pub fn with_covtol(mut self, covtol: f64) -> Self {
        self.covtol = covtol;
        self
    }

    /// Use a fixed scaling diagonal
    pub fn with_diag(mut self, diag: Vec<f64>) -> Self {
        self.diag = Some(diag);
        self
    }

    /// Enable or disable the finite check on residuals
    pub fn with_finite_check(mut self, finite_check: bool) -> Self {
        self.finite_check = finite_check;
        self
    }

    /// Set the norm method
    pub fn with_norm(mut self, norm: NormMethod) -> Self {
        self.norm = norm;
        self
    }

    /// Set the Jacobian method
    pub fn with_diff_method(mut self, diff_method: DiffMethod) -> Self {
        self.diff_method = diff_method;
        self
    }

    /// Check that every option is in range.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::SolverConfig;
    ///
    /// assert!(SolverConfig::default().validate().is_ok());
    /// assert!(SolverConfig::default().with_ftol(-1.0).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        check_tolerance("ftol", self.ftol)?;
        check_tolerance("xtol", self.xtol)?;
        check_tolerance("gtol", self.gtol)?;
        check_tolerance("damp", self.damp)?;
        check_tolerance("covtol", self.covtol)?;

        if !self.factor.is_finite() || self.factor <= 0.0 {
            return Err(MpFitError::InvalidOption(format!(
                "factor must be finite and positive, got {}",
                self.factor
            )));
        }
        if let Some(epsfcn) = self.epsfcn {
            if !epsfcn.is_finite() || epsfcn <= 0.0 {
                return Err(MpFitError::InvalidOption(format!(
                    "epsfcn must be finite and positive, got {}",
                    epsfcn
                )));
            }
        }
        if self.max_evaluations == Some(0) {
            return Err(MpFitError::InvalidOption(
                "max_evaluations must be at least 1".to_string(),
            ));
        }
        if let Some(diag) = &self.diag {
            if let Some(bad) = diag.iter().find(|d| !d.is_finite() || **d <= 0.0) {
                return Err(MpFitError::InvalidOption(format!(
                    "diag entries must be finite and positive, got {}",
                    bad
                )));
            }
        }

        Ok(())
    }

    /// Finite-difference step scale `sqrt(max(epsfcn, ε))`.
    pub fn fd_epsilon(&self) -> f64 {
        self.epsfcn.unwrap_or(f64::EPSILON).max(f64::EPSILON).sqrt()
    }
}
