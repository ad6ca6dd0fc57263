//! Polynomial models for fitting data.
//!
//! The polynomial function is defined as:
//!
//! f(x) = c[0] + c[1]*x + c[2]*x^2 + ... + c[n]*x^n
//!
//! The model is linear in its coefficients, so a fit converges in a single
//! accepted step from any starting point.

use ndarray::{Array1, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::model::{Model, ModelResiduals};
use crate::problem::Problem;

/// A polynomial model of arbitrary degree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolynomialModel {
    degree: usize,
}

/// Weighted residuals of a polynomial against data.
pub type PolynomialResiduals = ModelResiduals<PolynomialModel>;

impl PolynomialModel {
    /// Create a polynomial model of the given degree.
    pub fn new(degree: usize) -> Self {
        Self { degree }
    }

    /// Degree of the polynomial
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of coefficients, `degree + 1`
    pub fn coefficient_count(&self) -> usize {
        self.degree + 1
    }

    /// Weighted residuals of this polynomial against `(x, y)`.
    pub fn residuals(
        self,
        x: Array1<f64>,
        y: Array1<f64>,
        inv_sigma: Array1<f64>,
    ) -> Result<PolynomialResiduals> {
        ModelResiduals::new(self, x, y, inv_sigma)
    }

    /// A problem fitting this polynomial to `(x, y)`, with coefficients
    /// named `c0`, `c1`, ... and started at zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::models::PolynomialModel;
    /// use ndarray::{array, Array1};
    ///
    /// let x = array![0.0, 1.0, 2.0, 3.0];
    /// let y = x.mapv(|x: f64| 1.0 - 2.0 * x + 0.5 * x * x);
    /// let problem = PolynomialModel::new(2)
    ///     .into_problem(x, y, Array1::ones(4))
    ///     .unwrap();
    ///
    /// let solution = problem.solve(None).unwrap();
    /// let (c2, _) = solution.get("c2").unwrap();
    /// assert!((c2 - 0.5).abs() < 1e-10);
    /// ```
    pub fn into_problem<'a>(
        self,
        x: Array1<f64>,
        y: Array1<f64>,
        inv_sigma: Array1<f64>,
    ) -> Result<Problem<'a>> {
        let npar = self.coefficient_count();
        let mut problem = Problem::from_model(npar, self, x, y, inv_sigma)?;
        for k in 0..npar {
            problem
                .set_value(k, 0.0, false)?
                .set_name(k, &format!("c{}", k))?;
        }
        Ok(problem)
    }

    fn check_params(&self, params: &ArrayView1<f64>) -> Result<()> {
        if params.len() != self.coefficient_count() {
            return Err(MpFitError::DimensionMismatch(format!(
                "A degree {} polynomial has {} coefficients, got {}",
                self.degree,
                self.coefficient_count(),
                params.len()
            )));
        }
        Ok(())
    }
}

impl Model for PolynomialModel {
    fn eval(
        &self,
        params: ArrayView1<f64>,
        x: ArrayView1<f64>,
        mut out: ArrayViewMut1<f64>,
    ) -> Result<()> {
        self.check_params(&params)?;
        for (o, &xi) in out.iter_mut().zip(x.iter()) {
            *o = params.iter().rev().fold(0.0, |acc, &c| acc * xi + c);
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
        for (mut row, &xi) in out.rows_mut().into_iter().zip(x.iter()) {
            let mut power = 1.0;
            for d in row.iter_mut() {
                *d = power;
                power *= xi;
            }
        }
        Ok(())
    }

    fn has_jacobian(&self) -> bool {
        true
    }
}
