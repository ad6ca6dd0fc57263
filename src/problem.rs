//! Problem definition: residual functions and the fitting front end.
//!
//! A [`ResidualFunction`] maps a full parameter vector to `m` residuals and
//! may also supply the analytic Jacobian. A [`Problem`] pairs one with a
//! [`ParameterStore`] and a [`SolverConfig`] and is the entry point for
//! solving.

use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::lm::algorithm::LevenbergMarquardt;
use crate::lm::config::SolverConfig;
use crate::lm::evaluator::{Evaluator, JacobianMode};
use crate::parameters::{DerivativeSide, ParameterStore};
use crate::solution::Solution;

/// A residual function `r(p)` of the full parameter vector.
///
/// Fixed and tied parameters are passed at their current values; tied
/// values are already recomputed when `eval` is called.
pub trait ResidualFunction {
    /// Number of residuals `m`.
    fn residual_count(&self) -> usize;

    /// Write the `m` residuals at `params` into `residuals`.
    fn eval(&self, params: ArrayView1<f64>, residuals: ArrayViewMut1<f64>) -> Result<()>;

    /// Write the `m × npar` Jacobian `∂r_i/∂p_j` at `params` into `jacobian`.
    ///
    /// Columns of fixed and tied parameters are ignored. The buffer is
    /// zeroed before every call.
    fn jacobian(&self, _params: ArrayView1<f64>, _jacobian: ArrayViewMut2<f64>) -> Result<()> {
        Err(MpFitError::NotImplemented(
            "analytic Jacobian is not provided by this residual function".to_string(),
        ))
    }

    /// Whether [`ResidualFunction::jacobian`] is implemented.
    fn has_custom_jacobian(&self) -> bool {
        false
    }
}

/// Residual function backed by a closure.
pub struct FnResidual<F> {
    count: usize,
    func: F,
}

impl<F> FnResidual<F>
where
    F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
{
    /// Wrap a closure producing `count` residuals.
    pub fn new(count: usize, func: F) -> Self {
        Self { count, func }
    }
}

impl<F> ResidualFunction for FnResidual<F>
where
    F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
{
    fn residual_count(&self) -> usize {
        self.count
    }

    fn eval(&self, params: ArrayView1<f64>, residuals: ArrayViewMut1<f64>) -> Result<()> {
        (self.func)(params, residuals)
    }
}

/// Residual function with an analytic Jacobian, backed by two closures.
pub struct FnResidualWithJacobian<F, J> {
    count: usize,
    func: F,
    jac: J,
}

impl<F, J> FnResidualWithJacobian<F, J>
where
    F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
    J: Fn(ArrayView1<f64>, ArrayViewMut2<f64>) -> Result<()>,
{
    /// Wrap a residual closure and its Jacobian.
    pub fn new(count: usize, func: F, jac: J) -> Self {
        Self { count, func, jac }
    }
}

impl<F, J> ResidualFunction for FnResidualWithJacobian<F, J>
where
    F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
    J: Fn(ArrayView1<f64>, ArrayViewMut2<f64>) -> Result<()>,
{
    fn residual_count(&self) -> usize {
        self.count
    }

    fn eval(&self, params: ArrayView1<f64>, residuals: ArrayViewMut1<f64>) -> Result<()> {
        (self.func)(params, residuals)
    }

    fn jacobian(&self, params: ArrayView1<f64>, jacobian: ArrayViewMut2<f64>) -> Result<()> {
        (self.jac)(params, jacobian)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

/// Analytic and finite-difference Jacobians of the free parameters at one point.
#[derive(Debug, Clone)]
pub struct JacobianCheck {
    /// Free parameter indices, one per column
    pub free: Vec<usize>,
    /// Jacobian from the residual function
    pub analytic: Array2<f64>,
    /// Jacobian from finite differences
    pub numeric: Array2<f64>,
}

impl JacobianCheck {
    /// Largest `|analytic − numeric|` over all entries.
    pub fn max_abs_difference(&self) -> f64 {
        self.analytic
            .iter()
            .zip(self.numeric.iter())
            .map(|(a, n)| (a - n).abs())
            .fold(0.0, f64::max)
    }

    /// Largest difference relative to `max(|analytic|, |numeric|, 1)`.
    pub fn max_relative_difference(&self) -> f64 {
        self.analytic
            .iter()
            .zip(self.numeric.iter())
            .map(|(a, n)| (a - n).abs() / a.abs().max(n.abs()).max(1.0))
            .fold(0.0, f64::max)
    }
}

/// A constrained nonlinear least-squares problem.
///
/// # Examples
///
/// ```
/// use mpfit_rs::Problem;
///
/// // Minimize (p0 - 3)² + (p1 + 1)²
/// let mut problem = Problem::new(2);
/// problem.set_residual_fn(2, |p, mut r| {
///     r[0] = p[0] - 3.0;
///     r[1] = p[1] + 1.0;
///     Ok(())
/// });
/// problem.set_limits(0, 0.0, 2.0).unwrap();
///
/// let solution = problem.solve(Some(&[1.0, 0.0])).unwrap();
/// assert_eq!(solution.params[0], 2.0);
/// assert!((solution.params[1] + 1.0).abs() < 1e-8);
/// ```
pub struct Problem<'a> {
    params: ParameterStore,
    residuals: Option<Box<dyn ResidualFunction + 'a>>,
    config: SolverConfig,
}

impl fmt::Debug for Problem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Problem")
            .field("params", &self.params)
            .field(
                "residual_count",
                &self.residuals.as_ref().map(|r| r.residual_count()),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl<'a> Problem<'a> {
    /// Create a problem with `npar` unset parameters and default options.
    pub fn new(npar: usize) -> Self {
        Self {
            params: ParameterStore::new(npar),
            residuals: None,
            config: SolverConfig::default(),
        }
    }

    /// Reset the parameter configuration to `npar` unset parameters.
    pub fn set_parameter_count(&mut self, npar: usize) -> &mut Self {
        self.params = ParameterStore::new(npar);
        self
    }

    /// Number of parameters
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// Number of residuals, if a residual function is set
    pub fn residual_count(&self) -> Option<usize> {
        self.residuals.as_ref().map(|r| r.residual_count())
    }

    /// Use a closure producing `count` residuals; derivatives are taken by
    /// finite differences.
    pub fn set_residual_fn<F>(&mut self, count: usize, func: F) -> &mut Self
    where
        F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()> + 'a,
    {
        self.set_residuals(FnResidual::new(count, func))
    }

    /// Use a closure producing `count` residuals together with its analytic Jacobian.
    pub fn set_residual_fn_with_jacobian<F, J>(
        &mut self,
        count: usize,
        func: F,
        jac: J,
    ) -> &mut Self
    where
        F: Fn(ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()> + 'a,
        J: Fn(ArrayView1<f64>, ArrayViewMut2<f64>) -> Result<()> + 'a,
    {
        self.set_residuals(FnResidualWithJacobian::new(count, func, jac))
    }

    /// Use any [`ResidualFunction`].
    pub fn set_residuals<R>(&mut self, residuals: R) -> &mut Self
    where
        R: ResidualFunction + 'a,
    {
        self.residuals = Some(Box::new(residuals));
        self
    }

    /// Set the starting value of a parameter and whether it is held fixed.
    pub fn set_value(&mut self, index: usize, value: f64, fixed: bool) -> Result<&mut Self> {
        self.params.get_mut(index)?.set_value(value, fixed);
        Ok(self)
    }

    /// Set the limits of a parameter; equal limits fix it.
    pub fn set_limits(&mut self, index: usize, lower: f64, upper: f64) -> Result<&mut Self> {
        self.params.get_mut(index)?.set_limits(lower, upper)?;
        Ok(self)
    }

    /// Configure the finite-difference step of a parameter.
    pub fn set_step(
        &mut self,
        index: usize,
        step: f64,
        max_step: f64,
        relative: bool,
    ) -> Result<&mut Self> {
        self.params
            .get_mut(index)?
            .set_step(step, max_step, relative)?;
        Ok(self)
    }

    /// Set the derivative side of a parameter.
    pub fn set_side(&mut self, index: usize, side: DerivativeSide) -> Result<&mut Self> {
        self.params.get_mut(index)?.set_side(side);
        Ok(self)
    }

    /// Tie a parameter to a function of the full parameter vector.
    ///
    /// Ties are applied in index order before every evaluation, so a tie may
    /// read tied parameters with lower indices. Circular ties are not detected.
    pub fn set_tie<T>(&mut self, index: usize, tie: T) -> Result<&mut Self>
    where
        T: Fn(ArrayView1<f64>) -> f64 + Send + Sync + 'static,
    {
        self.params.get_mut(index)?.set_tie(tie);
        Ok(self)
    }

    /// Set the display name of a parameter.
    pub fn set_name(&mut self, index: usize, name: &str) -> Result<&mut Self> {
        self.params.get_mut(index)?.set_name(name);
        Ok(self)
    }

    /// The parameter configuration
    pub fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    /// Mutable access to the parameter configuration
    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    /// Replace the parameter configuration.
    pub fn set_parameters(&mut self, params: ParameterStore) -> &mut Self {
        self.params = params;
        self
    }

    /// The solver options
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Mutable access to the solver options
    pub fn config_mut(&mut self) -> &mut SolverConfig {
        &mut self.config
    }

    /// Replace the solver options.
    pub fn set_config(&mut self, config: SolverConfig) -> &mut Self {
        self.config = config;
        self
    }

    fn residual_function(&self) -> Result<&(dyn ResidualFunction + 'a)> {
        self.residuals
            .as_deref()
            .ok_or(MpFitError::MissingResidualFunction)
    }

    /// Solve the problem.
    ///
    /// `initial` replaces every configured value, including those of fixed
    /// parameters; without it the values set through [`Problem::set_value`]
    /// are used. Non-convergence is reported in [`Solution::status`], not as
    /// an error.
    pub fn solve(&self, initial: Option<&[f64]>) -> Result<Solution> {
        let residuals = self.residual_function()?;
        LevenbergMarquardt::with_config(self.config.clone()).minimize(
            &self.params,
            residuals,
            initial,
        )
    }

    /// Compare the analytic Jacobian with finite differences at `at`.
    ///
    /// Only free-parameter columns are compared. The finite differences use
    /// each parameter's configured step and side.
    pub fn check_jacobian(&self, at: &[f64]) -> Result<JacobianCheck> {
        let func = self.residual_function()?;
        if !func.has_custom_jacobian() {
            return Err(MpFitError::IncompatibleOptions(
                "check_jacobian needs a residual function with an analytic Jacobian".to_string(),
            ));
        }
        if at.len() != self.params.len() {
            return Err(MpFitError::DimensionMismatch(format!(
                "Expected {} parameter values, got {}",
                self.params.len(),
                at.len()
            )));
        }

        let mut x = Array1::from(at.to_vec());
        self.params.apply_ties(&mut x);
        let free = self.params.free_indices();
        let m = func.residual_count();

        let config = SolverConfig {
            damp: 0.0,
            ..self.config.clone()
        };
        let mut fvec = Array1::zeros(m);
        let mut analytic = Array2::zeros((m, free.len()));
        let mut numeric = Array2::zeros((m, free.len()));

        let mut exact = Evaluator::new(func, &self.params, &config, JacobianMode::Analytic)?;
        exact.residuals(x.view(), fvec.view_mut())?;
        exact.jacobian(&x, fvec.view(), analytic.view_mut())?;

        let mut approx =
            Evaluator::new(func, &self.params, &config, JacobianMode::FiniteDifference)?;
        approx.jacobian(&x, fvec.view(), numeric.view_mut())?;

        Ok(JacobianCheck {
            free,
            analytic,
            numeric,
        })
    }

    /// How the Jacobian would be computed for the current configuration.
    pub fn jacobian_mode(&self) -> Result<JacobianMode> {
        let func = self.residual_function()?;
        JacobianMode::select(self.config.diff_method, func.has_custom_jacobian())
    }
}
