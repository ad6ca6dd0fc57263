//! Residual and Jacobian evaluation for the solver.
//!
//! Every evaluation recomputes tied parameters on a private copy of the
//! parameter vector, applies residual damping and enforces the finite
//! check, so the solver loop only ever sees the free parameters.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::lm::config::{DiffMethod, SolverConfig};
use crate::parameters::ParameterStore;
use crate::problem::ResidualFunction;
use crate::utils::finite_difference::{self, StepPolicy};

/// How the Jacobian is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianMode {
    /// Supplied by the residual function
    Analytic,
    /// Forward, backward or central differences
    FiniteDifference,
}

impl JacobianMode {
    /// Resolve a [`DiffMethod`] against what the residual function provides.
    pub fn select(method: DiffMethod, has_jacobian: bool) -> Result<Self> {
        match method {
            DiffMethod::Auto if has_jacobian => Ok(JacobianMode::Analytic),
            DiffMethod::Auto | DiffMethod::FiniteDifference => Ok(JacobianMode::FiniteDifference),
            DiffMethod::Analytical if has_jacobian => Ok(JacobianMode::Analytic),
            DiffMethod::Analytical => Err(MpFitError::IncompatibleOptions(
                "an analytic Jacobian was requested but the residual function provides none"
                    .to_string(),
            )),
        }
    }
}

/// Residual evaluation with ties, damping and the finite check.
struct ResidualEval<'a> {
    func: &'a dyn ResidualFunction,
    params: &'a ParameterStore,
    work: Array1<f64>,
    damp: f64,
    finite_check: bool,
    nfev: usize,
}

impl ResidualEval<'_> {
    fn eval(&mut self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) -> Result<()> {
        self.work.assign(&x);
        self.params.apply_ties(&mut self.work);
        self.func.eval(self.work.view(), out.view_mut())?;
        self.nfev += 1;

        if self.damp > 0.0 {
            let damp = self.damp;
            out.mapv_inplace(|r| (r / damp).tanh());
        }
        if self.finite_check && out.iter().any(|r| !r.is_finite()) {
            return Err(MpFitError::NonFiniteResiduals);
        }
        Ok(())
    }
}

/// Evaluates residuals and free-parameter Jacobians, counting calls.
pub struct Evaluator<'a> {
    residuals: ResidualEval<'a>,
    free: Vec<usize>,
    policies: Vec<StepPolicy>,
    eps: f64,
    mode: JacobianMode,
    full_jac: Array2<f64>,
    njev: usize,
}

impl<'a> Evaluator<'a> {
    /// Prepare an evaluator for `func` under `params` and `config`.
    ///
    /// Residual damping cannot be combined with an analytic Jacobian.
    pub fn new(
        func: &'a dyn ResidualFunction,
        params: &'a ParameterStore,
        config: &SolverConfig,
        mode: JacobianMode,
    ) -> Result<Self> {
        if mode == JacobianMode::Analytic && config.damp > 0.0 {
            return Err(MpFitError::IncompatibleOptions(
                "residual damping requires finite-difference derivatives".to_string(),
            ));
        }

        let npar = params.len();
        let m = func.residual_count();
        let free = params.free_indices();
        let policies = free
            .iter()
            .map(|&i| params.get(i).map(StepPolicy::from))
            .collect::<Result<Vec<_>>>()?;
        let full_jac = match mode {
            JacobianMode::Analytic => Array2::zeros((m, npar)),
            JacobianMode::FiniteDifference => Array2::zeros((0, 0)),
        };

        Ok(Self {
            residuals: ResidualEval {
                func,
                params,
                work: Array1::zeros(npar),
                damp: config.damp,
                finite_check: config.finite_check,
                nfev: 0,
            },
            free,
            policies,
            eps: config.fd_epsilon(),
            mode,
            full_jac,
            njev: 0,
        })
    }

    /// Residual evaluations so far, including those for finite differences
    pub fn nfev(&self) -> usize {
        self.residuals.nfev
    }

    /// Jacobian evaluations so far
    pub fn njev(&self) -> usize {
        self.njev
    }

    /// Evaluate the residuals at the full parameter vector `x`.
    pub fn residuals(&mut self, x: ArrayView1<f64>, out: ArrayViewMut1<f64>) -> Result<()> {
        self.residuals.eval(x, out)
    }

    /// Evaluate the `m × nfree` Jacobian at `x`, where `fvec` holds the
    /// residuals at `x`.
    pub fn jacobian(
        &mut self,
        x: &Array1<f64>,
        fvec: ArrayView1<f64>,
        mut out: ArrayViewMut2<f64>,
    ) -> Result<()> {
        self.njev += 1;
        match self.mode {
            JacobianMode::Analytic => {
                let ResidualEval {
                    func, params, work, ..
                } = &mut self.residuals;
                work.assign(x);
                params.apply_ties(work);
                self.full_jac.fill(0.0);
                func.jacobian(work.view(), self.full_jac.view_mut())?;
                for (col, &j) in self.free.iter().enumerate() {
                    out.column_mut(col).assign(&self.full_jac.column(j));
                }
            }
            JacobianMode::FiniteDifference => {
                let residuals = &mut self.residuals;
                finite_difference::jacobian(
                    |p, o| residuals.eval(p, o),
                    x,
                    &self.free,
                    fvec,
                    &self.policies,
                    self.eps,
                    out.view_mut(),
                )?;
            }
        }

        if out.iter().any(|v| !v.is_finite()) {
            return Err(MpFitError::NonFiniteJacobian);
        }
        Ok(())
    }
}
