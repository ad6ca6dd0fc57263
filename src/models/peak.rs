//! Peak models for fitting data.
//!
//! A Gaussian peak on an optional constant baseline:
//!
//! f(x) = amplitude * exp(-(x - center)² / (2 * sigma²)) + baseline
//!
//! The Full Width at Half Maximum (FWHM) is related to sigma by:
//! FWHM = 2 * sqrt(2 * ln(2)) * sigma ≈ 2.3548 * sigma

use ndarray::{Array1, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::model::Model;
use crate::problem::Problem;

/// Ratio of the FWHM to sigma
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// A Gaussian peak model.
///
/// Parameters are `[amplitude, center, sigma]`, followed by `baseline`
/// when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GaussianModel {
    with_baseline: bool,
}

impl GaussianModel {
    /// Create a Gaussian model, optionally with a constant baseline.
    pub fn new(with_baseline: bool) -> Self {
        Self { with_baseline }
    }

    /// Number of parameters
    pub fn parameter_count(&self) -> usize {
        if self.with_baseline {
            4
        } else {
            3
        }
    }

    /// Parameter names in order
    pub fn parameter_names(&self) -> &'static [&'static str] {
        if self.with_baseline {
            &["amplitude", "center", "sigma", "baseline"]
        } else {
            &["amplitude", "center", "sigma"]
        }
    }

    /// Starting values estimated from the data.
    ///
    /// The baseline is the smallest sample, the peak is the largest sample
    /// above it, and sigma follows from the width at half maximum.
    pub fn guess(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<Array1<f64>> {
        if x.len() != y.len() || x.is_empty() {
            return Err(MpFitError::DimensionMismatch(format!(
                "guess needs equal, non-empty x and y, got {} and {}",
                x.len(),
                y.len()
            )));
        }

        let baseline = if self.with_baseline {
            y.iter().cloned().fold(f64::INFINITY, f64::min)
        } else {
            0.0
        };
        let (imax, ymax) = y
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                if v > best.1 {
                    (i, v)
                } else {
                    best
                }
            });
        let amplitude = ymax - baseline;
        let center = x[imax];

        let half = baseline + 0.5 * amplitude;
        let above: Vec<f64> = x
            .iter()
            .zip(y.iter())
            .filter(|(_, &v)| v >= half)
            .map(|(&xi, _)| xi)
            .collect();
        let lo = above.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = above.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let fwhm = hi - lo;
        let sigma = if fwhm > 0.0 {
            fwhm / FWHM_PER_SIGMA
        } else {
            // Single sample above half maximum: use the sample spacing
            let span = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                - x.iter().cloned().fold(f64::INFINITY, f64::min);
            (span / x.len() as f64).max(f64::EPSILON)
        };

        let mut p = vec![amplitude, center, sigma];
        if self.with_baseline {
            p.push(baseline);
        }
        Ok(Array1::from(p))
    }

    /// A problem fitting this peak to `(x, y)`, with named parameters
    /// started from [`GaussianModel::guess`] and `sigma` kept positive.
    pub fn into_problem<'a>(
        self,
        x: Array1<f64>,
        y: Array1<f64>,
        inv_sigma: Array1<f64>,
    ) -> Result<Problem<'a>> {
        let start = self.guess(x.view(), y.view())?;
        let mut problem = Problem::from_model(self.parameter_count(), self, x, y, inv_sigma)?;
        for (k, name) in self.parameter_names().iter().enumerate() {
            problem.set_value(k, start[k], false)?.set_name(k, name)?;
        }
        problem.set_limits(2, f64::MIN_POSITIVE, f64::INFINITY)?;
        Ok(problem)
    }

    fn check_params(&self, params: &ArrayView1<f64>) -> Result<()> {
        if params.len() != self.parameter_count() {
            return Err(MpFitError::DimensionMismatch(format!(
                "Gaussian model expects {} parameters, got {}",
                self.parameter_count(),
                params.len()
            )));
        }
        Ok(())
    }
}

impl Model for GaussianModel {
    fn eval(
        &self,
        params: ArrayView1<f64>,
        x: ArrayView1<f64>,
        mut out: ArrayViewMut1<f64>,
    ) -> Result<()> {
        self.check_params(&params)?;
        let (amplitude, center, sigma) = (params[0], params[1], params[2]);
        let baseline = if self.with_baseline { params[3] } else { 0.0 };

        for (o, &xi) in out.iter_mut().zip(x.iter()) {
            let z = (xi - center) / sigma;
            *o = amplitude * (-0.5 * z * z).exp() + baseline;
        }
        Ok(())
    }

    fn jacobian(
        &self,
        params: ArrayView1<f64>,
        x: ArrayView1<f64>,
        mut out: ArrayViewMut2<f64>,
    ) -> Result<()> {
        self.check_params(&params)?;
        let (amplitude, center, sigma) = (params[0], params[1], params[2]);

        for (mut row, &xi) in out.rows_mut().into_iter().zip(x.iter()) {
            let z = (xi - center) / sigma;
            let g = (-0.5 * z * z).exp();
            row[0] = g;
            row[1] = amplitude * g * z / sigma;
            row[2] = amplitude * g * z * z / sigma;
            if self.with_baseline {
                row[3] = 1.0;
            }
        }
        Ok(())
    }

    fn has_jacobian(&self) -> bool {
        true
    }
}
