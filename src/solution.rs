//! Results of a fit.
//!
//! A [`Solution`] carries the best-fit parameters together with everything
//! needed to judge the fit: termination reasons, counters, the final
//! residuals and Jacobian, and the parameter covariance.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::Result;
use crate::lm::convergence::TerminationStatus;
use crate::parameters::ParameterError;
use crate::uncertainty::calculate_correlation;

/// Outcome of a successful solve.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    /// Best-fit parameter values, tied parameters recomputed
    pub params: Array1<f64>,

    /// One-sigma errors, zero for fixed and tied parameters
    pub perror: Array1<f64>,

    /// `npar×npar` covariance, zero rows and columns for fixed and tied parameters
    pub covar: Array2<f64>,

    /// Reasons the iteration stopped
    pub status: TerminationStatus,

    /// Accepted iterations
    pub niter: usize,

    /// Residual evaluations, including those for finite differences
    pub nfev: usize,

    /// Jacobian evaluations
    pub njev: usize,

    /// Final chi-square `Σ r²`
    pub fnorm: f64,

    /// Chi-square at the starting point
    pub orig_fnorm: f64,

    /// Final residuals
    pub fvec: Array1<f64>,

    /// Last Jacobian, `m×npar`, zero columns for fixed and tied parameters
    pub fjac: Array2<f64>,

    /// Number of free parameters
    pub nfree: usize,

    /// Free parameters sitting on a limit at the last Jacobian
    pub npegged: usize,

    /// Parameter names, `None` where unset
    pub names: Vec<Option<String>>,
}

impl Solution {
    /// Whether a convergence test was satisfied.
    pub fn converged(&self) -> bool {
        self.status.converged()
    }

    /// Degrees of freedom `m − nfree`.
    pub fn dof(&self) -> usize {
        self.fvec.len().saturating_sub(self.nfree)
    }

    /// Reduced chi-square `fnorm / dof`, `NaN` with no degrees of freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        match self.dof() {
            0 => f64::NAN,
            dof => self.fnorm / dof as f64,
        }
    }

    /// Correlation matrix of the parameters.
    pub fn correlation(&self) -> Array2<f64> {
        calculate_correlation(&self.covar)
    }

    /// Covariance scaled by the reduced chi-square.
    ///
    /// Appropriate when the residuals were not weighted by their true
    /// uncertainties.
    pub fn scaled_covariance(&self) -> Array2<f64> {
        &self.covar * self.reduced_chi_square()
    }

    /// Errors scaled by the square root of the reduced chi-square.
    pub fn scaled_perror(&self) -> Array1<f64> {
        &self.perror * self.reduced_chi_square().sqrt()
    }

    /// Look up a fitted value and its error by parameter name.
    pub fn get(&self, name: &str) -> Result<(f64, f64)> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .ok_or_else(|| ParameterError::ParameterNotFound {
                name: name.to_string(),
            })?;
        Ok((self.params[index], self.perror[index]))
    }

    /// Serialize the solution to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Status: {}", self.status)?;
        writeln!(
            f,
            "  Chi-square: {:.6e} (start {:.6e}), dof {}",
            self.fnorm,
            self.orig_fnorm,
            self.dof()
        )?;
        writeln!(
            f,
            "  Iterations: {}, function evaluations: {}, Jacobian evaluations: {}",
            self.niter, self.nfev, self.njev
        )?;
        writeln!(f, "  Free parameters: {} ({} pegged)", self.nfree, self.npegged)?;
        for (i, (value, err)) in self.params.iter().zip(self.perror.iter()).enumerate() {
            match &self.names[i] {
                Some(name) => writeln!(f, "  {:>12} = {:.8e} +/- {:.3e}", name, value, err)?,
                None => writeln!(f, "  {:>12} = {:.8e} +/- {:.3e}", format!("p[{}]", i), value, err)?,
            }
        }
        Ok(())
    }
}
