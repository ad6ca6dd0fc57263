//! Finite difference methods for numerical differentiation.
//!
//! This module computes the Jacobian of a residual function by finite
//! differences, one free parameter at a time, with a step chosen per
//! parameter from its [`StepPolicy`].

use ndarray::{Array1, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::parameters::{DerivativeSide, Parameter};

/// How the finite-difference step is chosen for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPolicy {
    /// Explicit step, `None` to scale with the parameter
    pub step: Option<f64>,
    /// Whether `step` is relative to the parameter value
    pub relative: bool,
    /// Upper limit on the step magnitude
    pub max_step: Option<f64>,
    /// Difference side
    pub side: DerivativeSide,
    /// Upper limit of the parameter, `+inf` when unbounded
    pub upper: f64,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            step: None,
            relative: false,
            max_step: None,
            side: DerivativeSide::Auto,
            upper: f64::INFINITY,
        }
    }
}

impl From<&Parameter> for StepPolicy {
    fn from(param: &Parameter) -> Self {
        Self {
            step: param.step(),
            relative: param.relative_step(),
            max_step: param.max_step(),
            side: param.side(),
            upper: param.max(),
        }
    }
}

impl StepPolicy {
    /// Signed step for a parameter currently at `x`.
    ///
    /// `eps` is the relative step scale, `sqrt(max(epsfcn, ε))`. The step
    /// is negative for [`DerivativeSide::Negative`] and whenever a forward
    /// step would pass the upper limit.
    pub fn step_size(&self, x: f64, eps: f64) -> f64 {
        let mut h = match self.step {
            Some(step) if self.relative => (step * x).abs(),
            Some(step) => step,
            None => eps * x.abs(),
        };
        if h == 0.0 {
            h = eps;
        }
        if let Some(max_step) = self.max_step {
            h = h.min(max_step);
        }
        if self.side == DerivativeSide::Negative || x > self.upper - h {
            h = -h;
        }
        h
    }
}

/// Compute the Jacobian columns of the free parameters by finite differences.
///
/// # Arguments
///
/// * `eval` - Residual function of the full parameter vector
/// * `x` - Full parameter vector at which to differentiate
/// * `free` - Indices of the columns to compute
/// * `fvec` - Residuals at `x`
/// * `policies` - Step policy for each free parameter
/// * `eps` - Relative step scale
/// * `jac` - Output, `m × free.len()`
///
/// Errors from `eval` are returned unchanged.
pub fn jacobian<F>(
    mut eval: F,
    x: &Array1<f64>,
    free: &[usize],
    fvec: ArrayView1<f64>,
    policies: &[StepPolicy],
    eps: f64,
    mut jac: ArrayViewMut2<f64>,
) -> Result<()>
where
    F: FnMut(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
{
    let m = fvec.len();
    if jac.dim() != (m, free.len()) || policies.len() != free.len() {
        return Err(MpFitError::DimensionMismatch(format!(
            "Jacobian buffer is {:?}, expected ({}, {}) with {} step policies",
            jac.dim(),
            m,
            free.len(),
            policies.len()
        )));
    }

    let mut xp = x.clone();
    let mut forward = Array1::zeros(m);
    let mut backward = Array1::zeros(m);

    for (col, (&j, policy)) in free.iter().zip(policies).enumerate() {
        let xj = x[j];
        let h = policy.step_size(xj, eps);

        xp[j] = xj + h;
        eval(xp.view(), forward.view_mut())?;

        if policy.side == DerivativeSide::Both {
            xp[j] = xj - h;
            eval(xp.view(), backward.view_mut())?;
            for i in 0..m {
                jac[[i, col]] = (forward[i] - backward[i]) / (2.0 * h);
            }
        } else {
            for i in 0..m {
                jac[[i, col]] = (forward[i] - fvec[i]) / h;
            }
        }

        xp[j] = xj;
    }

    Ok(())
}
