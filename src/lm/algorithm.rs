//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! This module contains the outer iteration of the solver: Jacobian
//! evaluation, pegging of parameters that sit on a limit, the pivoted QR
//! factorization, and the inner trust-region loop that proposes, shortens
//! and accepts or rejects steps. Convergence and uncertainty estimates are
//! delegated to [`convergence`](super::convergence) and
//! [`uncertainty`](crate::uncertainty).

use log::{debug, info, trace};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{MpFitError, Result};
use crate::linalg::enorm::{Enorm, NormMethod};
use crate::linalg::qr::PackedQr;
use crate::parameters::ParameterStore;
use crate::problem::ResidualFunction;
use crate::solution::Solution;
use crate::uncertainty::{covariance_from_r, embed_covariance, standard_errors_from_covariance};

use super::config::SolverConfig;
use super::convergence::{ConvergenceCriteria, StepStatistics, TerminationReason};
use super::evaluator::{Evaluator, JacobianMode};
use super::step::lmpar;
use super::trust_region::TrustRegion;

/// Smallest gain ratio at which a trial step is accepted.
const ACCEPT_RATIO: f64 = 1e-4;

/// Limits and per-iteration step caps of the free parameters.
struct FreeLimits {
    lower: Array1<f64>,
    upper: Array1<f64>,
    max_step: Array1<f64>,
}

impl FreeLimits {
    fn new(params: &ParameterStore, free: &[usize]) -> Result<Self> {
        let mut lower = Array1::zeros(free.len());
        let mut upper = Array1::zeros(free.len());
        let mut max_step = Array1::zeros(free.len());
        for (col, &j) in free.iter().enumerate() {
            let param = params.get(j)?;
            lower[col] = param.min();
            upper[col] = param.max();
            max_step[col] = param.max_step().unwrap_or(f64::INFINITY);
        }
        Ok(Self {
            lower,
            upper,
            max_step,
        })
    }

    fn at_lower(&self, col: usize, x: f64) -> bool {
        self.lower[col].is_finite() && x <= self.lower[col]
    }

    fn at_upper(&self, col: usize, x: f64) -> bool {
        self.upper[col].is_finite() && x >= self.upper[col]
    }

    /// Shorten `step` so that `x + step` respects the limits and step caps.
    ///
    /// Components pushing further into a limit the parameter already sits
    /// on are dropped; the rest of the step is scaled by a single factor,
    /// which is returned.
    fn restrict(&self, x: ArrayView1<f64>, step: &mut Array1<f64>) -> f64 {
        let eps = f64::EPSILON;
        let mut alpha: f64 = 1.0;

        for col in 0..step.len() {
            let significant = step[col].abs() > eps;
            if self.at_lower(col, x[col]) && step[col] < 0.0 {
                step[col] = 0.0;
            }
            if self.at_upper(col, x[col]) && step[col] > 0.0 {
                step[col] = 0.0;
            }
            if significant && self.lower[col].is_finite() && x[col] + step[col] < self.lower[col] {
                alpha = alpha.min((self.lower[col] - x[col]) / step[col]);
            }
            if significant && self.upper[col].is_finite() && x[col] + step[col] > self.upper[col] {
                alpha = alpha.min((self.upper[col] - x[col]) / step[col]);
            }
        }

        let mut mrat: f64 = 1.0;
        for col in 0..step.len() {
            if step[col] != 0.0 && self.max_step[col].is_finite() {
                mrat = mrat.max((alpha * step[col] / self.max_step[col]).abs());
            }
        }
        if mrat > 1.0 {
            alpha /= mrat;
        }

        step.mapv_inplace(|s| s * alpha);
        alpha
    }

    /// Snap trial values that landed within rounding of a limit onto it.
    fn snap(&self, trial: &mut Array1<f64>) {
        let eps = f64::EPSILON;
        for col in 0..trial.len() {
            let upper = self.upper[col];
            if upper.is_finite() {
                let sign = if upper >= 0.0 { 1.0 } else { -1.0 };
                let shrunk = upper * (1.0 - sign * eps) - if upper == 0.0 { eps } else { 0.0 };
                if trial[col] >= shrunk {
                    trial[col] = upper;
                }
            }
            let lower = self.lower[col];
            if lower.is_finite() {
                let sign = if lower >= 0.0 { 1.0 } else { -1.0 };
                let grown = lower * (1.0 + sign * eps) + if lower == 0.0 { eps } else { 0.0 };
                if trial[col] <= grown {
                    trial[col] = lower;
                }
            }
        }
    }
}

/// Largest cosine between the residual vector and a scaled Jacobian column.
fn gradient_norm(
    r: ArrayView2<f64>,
    pivot: &[usize],
    qtf: ArrayView1<f64>,
    acnorm: ArrayView1<f64>,
    fnorm: f64,
) -> f64 {
    if fnorm == 0.0 {
        return 0.0;
    }
    let mut gnorm: f64 = 0.0;
    for (j, &l) in pivot.iter().enumerate() {
        if acnorm[l] != 0.0 {
            let sum: f64 = (0..=j).map(|i| r[[i, j]] * (qtf[i] / fnorm)).sum();
            gnorm = gnorm.max((sum / acnorm[l]).abs());
        }
    }
    gnorm
}

/// `R·Pᵗ·p`, whose norm equals `‖J·p‖`.
fn r_times_step(r: ArrayView2<f64>, pivot: &[usize], step: &Array1<f64>) -> Array1<f64> {
    let n = step.len();
    let mut out = Array1::zeros(n);
    for (j, &l) in pivot.iter().enumerate() {
        let temp = step[l];
        for i in 0..=j {
            out[i] += r[[i, j]] * temp;
        }
    }
    out
}

fn scaled_norm(diag: &Array1<f64>, v: &Array1<f64>, method: NormMethod) -> f64 {
    (diag * v).norm_with(method)
}

/// The Levenberg-Marquardt optimizer.
///
/// # Examples
///
/// ```
/// use mpfit_rs::lm::LevenbergMarquardt;
/// use mpfit_rs::parameters::ParameterStore;
/// use mpfit_rs::problem::FnResidual;
///
/// // r = (p0 - 1, 10·(p1 - p0²))
/// let func = FnResidual::new(2, |p, mut r| {
///     r[0] = p[0] - 1.0;
///     r[1] = 10.0 * (p[1] - p[0] * p[0]);
///     Ok(())
/// });
/// let params = ParameterStore::new(2);
///
/// let lm = LevenbergMarquardt::new();
/// let solution = lm.minimize(&params, &func, Some(&[-1.2, 1.0])).unwrap();
/// assert!(solution.converged());
/// assert!((solution.params[0] - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: SolverConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    /// The solver options
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Minimize `Σ r_i(p)²` over the free parameters of `params`.
    ///
    /// `initial` replaces every configured parameter value when given.
    /// Returns an error for invalid configuration or when the residual
    /// function, its Jacobian or a trial point stops being finite; running
    /// out of iterations or evaluations is reported in the solution status.
    pub fn minimize(
        &self,
        params: &ParameterStore,
        func: &dyn ResidualFunction,
        initial: Option<&[f64]>,
    ) -> Result<Solution> {
        let config = &self.config;
        config.validate()?;

        let npar = params.len();
        let mut x = match initial {
            Some(values) if values.len() != npar => {
                return Err(MpFitError::DimensionMismatch(format!(
                    "Expected {} initial values, got {}",
                    npar,
                    values.len()
                )));
            }
            Some(values) => Array1::from(values.to_vec()),
            None => params.values()?,
        };
        params.validate(x.view())?;

        let free = params.free_indices();
        let nfree = free.len();
        if nfree == 0 {
            return Err(MpFitError::NoFreeParameters);
        }
        let m = func.residual_count();
        if m < nfree {
            return Err(MpFitError::TooFewResiduals {
                residuals: m,
                free: nfree,
            });
        }
        if let Some(diag) = &config.diag {
            if diag.len() != npar {
                return Err(MpFitError::DimensionMismatch(format!(
                    "Expected {} diag entries, got {}",
                    npar,
                    diag.len()
                )));
            }
        }

        let mode = JacobianMode::select(config.diff_method, func.has_custom_jacobian())?;
        let mut evaluator = Evaluator::new(func, params, config, mode)?;
        let limits = FreeLimits::new(params, &free)?;
        let criteria = ConvergenceCriteria::from(config);
        let norm = config.norm;

        debug!(
            "Starting fit: {} parameters ({} free), {} residuals, {:?} Jacobian",
            npar, nfree, m, mode
        );

        params.apply_ties(&mut x);
        let mut xfree: Array1<f64> = free.iter().map(|&j| x[j]).collect();
        let mut fvec = Array1::zeros(m);
        evaluator.residuals(x.view(), fvec.view_mut())?;
        let mut fnorm = fvec.norm_with(norm);
        let orig_fnorm = fnorm;

        let mut jac = Array2::zeros((m, nfree));
        let mut buffer = Array2::zeros((m, nfree));
        let mut trial = Array1::zeros(m);
        let mut diag = Array1::zeros(nfree);
        let mut tr = TrustRegion::initial(config.factor, 0.0);
        let mut xnorm = 0.0;
        let mut niter = 0;
        let mut npegged;

        let (tri, status) = 'outer: loop {
            evaluator.jacobian(&x, fvec.view(), jac.view_mut())?;

            // Parameters on a limit whose gradient points outward do not move.
            buffer.assign(&jac);
            npegged = 0;
            for col in 0..nfree {
                let lpegged = limits.at_lower(col, xfree[col]);
                let upegged = limits.at_upper(col, xfree[col]);
                if !(lpegged || upegged) {
                    continue;
                }
                npegged += 1;
                let sum = fvec.dot(&buffer.column(col));
                if (lpegged && sum > 0.0) || (upegged && sum < 0.0) {
                    buffer.column_mut(col).fill(0.0);
                }
            }

            let qr = PackedQr::factor(std::mem::take(&mut buffer))?;
            let acnorm = qr.acnorm().to_owned();

            if niter == 0 {
                match &config.diag {
                    Some(user) => {
                        for (col, &j) in free.iter().enumerate() {
                            diag[col] = user[j];
                        }
                    }
                    None => diag = acnorm.mapv(|a| if a == 0.0 { 1.0 } else { a }),
                }
                xnorm = scaled_norm(&diag, &xfree, norm);
                tr = TrustRegion::initial(config.factor, xnorm);
            }

            let (mut tri, qtf) = qr.into_triangular(fvec.view())?;
            let gnorm = gradient_norm(tri.r(), tri.pivot(), qtf.view(), acnorm.view(), fnorm);

            let status = criteria.check_gradient(gnorm);
            if !status.is_empty() {
                break 'outer (tri, status);
            }
            if config.max_iterations == 0 {
                break 'outer (tri, TerminationReason::MaxIterations.into());
            }

            if config.diag.is_none() {
                diag.zip_mut_with(&acnorm, |d, &a| *d = d.max(a));
            }

            let pivot = tri.pivot().to_vec();
            loop {
                let lm_step = lmpar(
                    tri.r_mut(),
                    &pivot,
                    diag.view(),
                    qtf.view(),
                    tr.delta,
                    tr.par,
                );
                tr.par = lm_step.par;

                let mut step = lm_step.x.mapv(|v| -v);
                let alpha = limits.restrict(xfree.view(), &mut step);
                let mut xtrial = &xfree + &step;
                limits.snap(&mut xtrial);
                if xtrial.iter().any(|v| !v.is_finite()) {
                    return Err(MpFitError::NonFiniteParameters(format!(
                        "trial step from {} produced {}",
                        xfree, xtrial
                    )));
                }

                let pnorm = scaled_norm(&diag, &step, norm);
                if niter == 0 {
                    tr.limit_to(pnorm);
                }

                let mut xnew = x.clone();
                for (col, &j) in free.iter().enumerate() {
                    xnew[j] = xtrial[col];
                }
                evaluator.residuals(xnew.view(), trial.view_mut())?;
                let fnorm1 = trial.norm_with(norm);

                // Predicted reduction of the linear model for the step
                // actually taken, which is `alpha` times the damped step.
                let actred = TrustRegion::actual_reduction(fnorm, fnorm1);
                let alpha = alpha.max(f64::MIN_POSITIVE);
                let temp1 = r_times_step(tri.r(), &pivot, &step).norm_with(norm) / fnorm;
                let temp2 = tr.par.sqrt() * pnorm / fnorm;
                let prered = temp1 * temp1 * (2.0 / alpha - 1.0) + 2.0 * temp2 * temp2 / alpha;
                let dirder = -(temp1 * temp1 + temp2 * temp2) / alpha;
                let ratio = TrustRegion::gain_ratio(actred, prered);

                tr.update(ratio, actred, dirder, fnorm, fnorm1, pnorm);
                trace!(
                    "Trial step: fnorm1 = {:.6e}, ratio = {:.4}, alpha = {:.4}, delta = {:.4e}, par = {:.4e}",
                    fnorm1,
                    ratio,
                    alpha,
                    tr.delta,
                    tr.par
                );

                let accepted = ratio >= ACCEPT_RATIO;
                if accepted {
                    params.apply_ties(&mut xnew);
                    x = xnew;
                    xfree = xtrial;
                    fvec.assign(&trial);
                    xnorm = scaled_norm(&diag, &xfree, norm);
                    fnorm = fnorm1;
                    niter += 1;
                    debug!(
                        "Iteration {}: chi-square = {:.6e}, |grad| = {:.3e}, nfev = {}",
                        niter,
                        fnorm * fnorm,
                        gnorm,
                        evaluator.nfev()
                    );
                }

                let stats = StepStatistics {
                    actred,
                    prered,
                    ratio,
                    delta: tr.delta,
                    xnorm,
                    gnorm,
                };
                let status = criteria.check_step(&stats, niter, evaluator.nfev());
                if !status.is_empty() {
                    break 'outer (tri, status);
                }
                if accepted {
                    break;
                }
            }
            buffer = tri.into_buffer();
        };

        let free_cov = covariance_from_r(tri.r(), tri.pivot(), config.covtol);
        let covar = embed_covariance(&free_cov.covar, &free, npar);
        let perror = standard_errors_from_covariance(&covar);

        let mut fjac = Array2::zeros((m, npar));
        for (col, &j) in free.iter().enumerate() {
            fjac.column_mut(j).assign(&jac.column(col));
        }

        info!(
            "Fit finished after {} iterations ({} evaluations): {}; chi-square {:.6e} -> {:.6e}",
            niter,
            evaluator.nfev(),
            status,
            orig_fnorm * orig_fnorm,
            fnorm * fnorm
        );

        Ok(Solution {
            params: x,
            perror,
            covar,
            status,
            niter,
            nfev: evaluator.nfev(),
            njev: evaluator.njev(),
            fnorm: fvec.iter().map(|r| r * r).sum(),
            orig_fnorm: orig_fnorm * orig_fnorm,
            fvec,
            fjac,
            nfree,
            npegged,
            names: params.names(),
        })
    }
}
