//! Model trait and weighted data residuals.
//!
//! A [`Model`] predicts `y` at sample points `x` from a parameter vector.
//! [`ModelResiduals`] turns a model and a data set into the weighted
//! residuals `(y_i − model_i)·invσ_i` the solver minimizes, and passes an
//! analytic model Jacobian through when the model has one.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::problem::{Problem, ResidualFunction};

/// A model function `y = f(x; p)` that can be fit to data.
pub trait Model {
    /// Evaluate the model at every point of `x` into `out`.
    fn eval(
        &self,
        params: ArrayView1<f64>,
        x: ArrayView1<f64>,
        out: ArrayViewMut1<f64>,
    ) -> Result<()>;

    /// Derivatives `∂f(x_i)/∂p_j` into the `len(x) × npar` buffer `out`.
    fn jacobian(
        &self,
        _params: ArrayView1<f64>,
        _x: ArrayView1<f64>,
        _out: ArrayViewMut2<f64>,
    ) -> Result<()> {
        Err(MpFitError::NotImplemented(
            "analytic derivatives are not provided by this model".to_string(),
        ))
    }

    /// Whether [`Model::jacobian`] is implemented.
    fn has_jacobian(&self) -> bool {
        false
    }
}

impl<F> Model for F
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>, ArrayViewMut1<f64>) -> Result<()>,
{
    fn eval(
        &self,
        params: ArrayView1<f64>,
        x: ArrayView1<f64>,
        out: ArrayViewMut1<f64>,
    ) -> Result<()> {
        self(params, x, out)
    }
}

/// Weighted residuals of a model against data.
#[derive(Debug, Clone)]
pub struct ModelResiduals<M> {
    model: M,
    x: Array1<f64>,
    y: Array1<f64>,
    inv_sigma: Array1<f64>,
}

impl<M: Model> ModelResiduals<M> {
    /// Pair `model` with samples `(x, y)` and inverse uncertainties `inv_sigma`.
    ///
    /// All three arrays must have the same length.
    pub fn new(model: M, x: Array1<f64>, y: Array1<f64>, inv_sigma: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() || x.len() != inv_sigma.len() {
            return Err(MpFitError::DimensionMismatch(format!(
                "x, y and inv_sigma must have equal lengths, got {}, {} and {}",
                x.len(),
                y.len(),
                inv_sigma.len()
            )));
        }
        Ok(Self {
            model,
            x,
            y,
            inv_sigma,
        })
    }

    /// Pair `model` with unweighted samples.
    pub fn unweighted(model: M, x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        let ones = Array1::ones(y.len());
        Self::new(model, x, y, ones)
    }

    /// The wrapped model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Sample points
    pub fn x(&self) -> ArrayView1<'_, f64> {
        self.x.view()
    }

    /// Observed values
    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }

    /// Model prediction at the sample points.
    pub fn predict(&self, params: ArrayView1<f64>) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(self.x.len());
        self.model.eval(params, self.x.view(), out.view_mut())?;
        Ok(out)
    }
}

impl<M: Model> ResidualFunction for ModelResiduals<M> {
    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn eval(&self, params: ArrayView1<f64>, mut residuals: ArrayViewMut1<f64>) -> Result<()> {
        self.model
            .eval(params, self.x.view(), residuals.view_mut())?;
        for ((r, &y), &w) in residuals
            .iter_mut()
            .zip(self.y.iter())
            .zip(self.inv_sigma.iter())
        {
            *r = (y - *r) * w;
        }
        Ok(())
    }

    fn jacobian(&self, params: ArrayView1<f64>, mut jacobian: ArrayViewMut2<f64>) -> Result<()> {
        self.model
            .jacobian(params, self.x.view(), jacobian.view_mut())?;
        for (mut row, &w) in jacobian.rows_mut().into_iter().zip(self.inv_sigma.iter()) {
            row.mapv_inplace(|d| -d * w);
        }
        Ok(())
    }

    fn has_custom_jacobian(&self) -> bool {
        self.model.has_jacobian()
    }
}

impl<'a> Problem<'a> {
    /// Build a problem fitting `model` to data, with residuals
    /// `(y_i − model(params, x)_i)·invσ_i`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::Problem;
    /// use ndarray::{array, ArrayView1, ArrayViewMut1};
    ///
    /// // y = a·exp(−x/τ)
    /// let model = |p: ArrayView1<f64>, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>| -> mpfit_rs::Result<()> {
    ///     out.assign(&x.mapv(|x| p[0] * (-x / p[1]).exp()));
    ///     Ok(())
    /// };
    /// let x = array![0.0, 1.0, 2.0, 3.0, 4.0];
    /// let y = x.mapv(|x: f64| 3.0 * (-x / 2.0).exp());
    /// let inv_sigma = array![1.0, 1.0, 1.0, 1.0, 1.0];
    ///
    /// let problem = Problem::from_model(2, model, x, y, inv_sigma).unwrap();
    /// let solution = problem.solve(Some(&[1.0, 1.0])).unwrap();
    /// assert!((solution.params[0] - 3.0).abs() < 1e-6);
    /// assert!((solution.params[1] - 2.0).abs() < 1e-6);
    /// ```
    pub fn from_model<M>(
        npar: usize,
        model: M,
        x: Array1<f64>,
        y: Array1<f64>,
        inv_sigma: Array1<f64>,
    ) -> Result<Self>
    where
        M: Model + 'a,
    {
        let residuals = ModelResiduals::new(model, x, y, inv_sigma)?;
        let mut problem = Problem::new(npar);
        problem.set_residuals(residuals);
        Ok(problem)
    }
}

/// Evaluate a model's analytic Jacobian into a new `len(x) × npar` matrix.
pub fn model_jacobian<M: Model>(
    model: &M,
    params: ArrayView1<f64>,
    x: ArrayView1<f64>,
) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((x.len(), params.len()));
    model.jacobian(params, x, out.view_mut())?;
    Ok(out)
}
