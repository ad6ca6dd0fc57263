//! Column-pivoted Householder QR factorization in packed form.
//!
//! [`PackedQr::factor`] takes ownership of an `m×n` matrix (`m ≥ n`) and
//! overwrites it: the lower trapezoid holds the Householder vectors, the
//! strict upper triangle holds the strict upper triangle of `R`, and the
//! diagonal of `R` is kept separately in `rdiag`. Columns are permuted so
//! that `A·P = Q·R` with `|R[0,0]| ≥ |R[1,1]| ≥ …`.
//!
//! The solver hands in its scratch buffer every iteration and gets it
//! back through [`TriangularR::into_buffer`], so no matrix is ever shared
//! between the caller and the factorization.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2};

use crate::error::{MpFitError, Result};
use crate::linalg::enorm::Enorm;

/// Pivoted QR factorization of a matrix, stored in the overwritten matrix.
#[derive(Debug, Clone)]
pub struct PackedQr {
    a: Array2<f64>,
    pivot: Vec<usize>,
    rdiag: Array1<f64>,
    acnorm: Array1<f64>,
}

impl PackedQr {
    /// Factor `a` in place.
    ///
    /// # Errors
    ///
    /// Returns [`MpFitError::DimensionMismatch`] when `a` has fewer rows
    /// than columns.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpfit_rs::linalg::PackedQr;
    /// use ndarray::array;
    ///
    /// let a = array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]];
    /// let qr = PackedQr::factor(a).unwrap();
    /// // The larger column is pivoted to the front.
    /// assert_eq!(qr.pivot(), &[1, 0]);
    /// ```
    pub fn factor(mut a: Array2<f64>) -> Result<Self> {
        let (m, n) = a.dim();
        if m < n {
            return Err(MpFitError::DimensionMismatch(format!(
                "QR factorization needs at least as many rows as columns, got {}x{}",
                m, n
            )));
        }

        let acnorm: Array1<f64> = (0..n).map(|j| a.column(j).enorm()).collect();
        let mut rdiag = acnorm.clone();
        let mut wa = acnorm.clone();
        let mut pivot: Vec<usize> = (0..n).collect();

        for j in 0..n {
            // First occurrence wins ties.
            let mut kmax = j;
            for k in (j + 1)..n {
                if rdiag[k] > rdiag[kmax] {
                    kmax = k;
                }
            }
            if kmax != j {
                for i in 0..m {
                    a.swap([i, j], [i, kmax]);
                }
                rdiag[kmax] = rdiag[j];
                wa[kmax] = wa[j];
                pivot.swap(j, kmax);
            }

            let mut ajnorm = a.slice(s![j.., j]).enorm();
            if ajnorm != 0.0 {
                if a[[j, j]] < 0.0 {
                    ajnorm = -ajnorm;
                }
                for i in j..m {
                    a[[i, j]] /= ajnorm;
                }
                a[[j, j]] += 1.0;

                for k in (j + 1)..n {
                    let mut sum = 0.0;
                    for i in j..m {
                        sum += a[[i, j]] * a[[i, k]];
                    }
                    let temp = sum / a[[j, j]];
                    for i in j..m {
                        a[[i, k]] -= temp * a[[i, j]];
                    }

                    if rdiag[k] != 0.0 {
                        let temp = a[[j, k]] / rdiag[k];
                        rdiag[k] *= (1.0 - temp * temp).max(0.0).sqrt();
                        let ratio = rdiag[k] / wa[k];
                        if 0.05 * ratio * ratio <= f64::EPSILON {
                            // Downdating lost too much precision; recompute.
                            rdiag[k] = a.slice(s![(j + 1).., k]).enorm();
                            wa[k] = rdiag[k];
                        }
                    }
                }
            }
            rdiag[j] = -ajnorm;
        }

        Ok(Self {
            a,
            pivot,
            rdiag,
            acnorm,
        })
    }

    /// Number of rows of the factored matrix
    pub fn nrows(&self) -> usize {
        self.a.nrows()
    }

    /// Number of columns of the factored matrix
    pub fn ncols(&self) -> usize {
        self.a.ncols()
    }

    /// Column permutation: column `j` of `A·P` is column `pivot[j]` of `A`.
    pub fn pivot(&self) -> &[usize] {
        &self.pivot
    }

    /// Diagonal of `R`
    pub fn rdiag(&self) -> ArrayView1<'_, f64> {
        self.rdiag.view()
    }

    /// Euclidean norms of the columns of the unpermuted input
    pub fn acnorm(&self) -> ArrayView1<'_, f64> {
        self.acnorm.view()
    }

    /// The `n×n` upper-triangular factor.
    pub fn r(&self) -> Array2<f64> {
        let n = self.ncols();
        let mut r = Array2::zeros((n, n));
        for j in 0..n {
            r[[j, j]] = self.rdiag[j];
            for i in 0..j {
                r[[i, j]] = self.a[[i, j]];
            }
        }
        r
    }

    /// Apply the reflector stored in column `j` to `b`.
    fn reflect(&self, j: usize, b: &mut Array1<f64>) {
        let ajj = self.a[[j, j]];
        if ajj == 0.0 {
            return;
        }
        let m = self.nrows();
        let mut sum = 0.0;
        for i in j..m {
            sum += self.a[[i, j]] * b[i];
        }
        let temp = -sum / ajj;
        for i in j..m {
            b[i] += temp * self.a[[i, j]];
        }
    }

    /// Compute `Qᵗ·b` for a vector of length `m`.
    pub fn qt_mul(&self, b: ArrayView1<f64>) -> Result<Array1<f64>> {
        if b.len() != self.nrows() {
            return Err(MpFitError::DimensionMismatch(format!(
                "Expected a vector of length {}, got {}",
                self.nrows(),
                b.len()
            )));
        }
        let mut out = b.to_owned();
        for j in 0..self.ncols() {
            self.reflect(j, &mut out);
        }
        Ok(out)
    }

    /// The thin `m×n` orthogonal factor, so that `Q·R` equals `A·P`.
    pub fn q(&self) -> Array2<f64> {
        let (m, n) = self.a.dim();
        let mut q = Array2::zeros((m, n));
        for k in 0..n {
            let mut e = Array1::zeros(m);
            e[k] = 1.0;
            for j in (0..n).rev() {
                self.reflect(j, &mut e);
            }
            q.column_mut(k).assign(&e);
        }
        q
    }

    /// Finish the factorization for the trust-region step.
    ///
    /// Computes the first `n` components of `Qᵗ·b` and loads the diagonal of
    /// `R` into the buffer, after which the Householder vectors are gone.
    pub fn into_triangular(self, b: ArrayView1<f64>) -> Result<(TriangularR, Array1<f64>)> {
        let n = self.ncols();
        let qtb = self.qt_mul(b)?.slice(s![..n]).to_owned();

        let PackedQr {
            mut a,
            pivot,
            rdiag,
            acnorm,
        } = self;
        for j in 0..n {
            a[[j, j]] = rdiag[j];
        }

        Ok((TriangularR { a, pivot, acnorm }, qtb))
    }
}

/// The triangular factor `R` held in the top `n×n` block of the buffer.
///
/// The upper triangle (with the diagonal) is `R`; the strict lower triangle
/// is workspace for [`qrd_solve`](crate::linalg::qrd_solve).
#[derive(Debug, Clone)]
pub struct TriangularR {
    a: Array2<f64>,
    pivot: Vec<usize>,
    acnorm: Array1<f64>,
}

impl TriangularR {
    /// Order of `R`
    pub fn n(&self) -> usize {
        self.a.ncols()
    }

    /// The `n×n` block holding `R`
    pub fn r(&self) -> ArrayView2<'_, f64> {
        let n = self.n();
        self.a.slice(s![..n, ..n])
    }

    /// Mutable access to the `n×n` block.
    pub fn r_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        let n = self.n();
        self.a.slice_mut(s![..n, ..n])
    }

    /// Column permutation of the factorization
    pub fn pivot(&self) -> &[usize] {
        &self.pivot
    }

    /// Column norms of the matrix that was factored
    pub fn acnorm(&self) -> ArrayView1<'_, f64> {
        self.acnorm.view()
    }

    /// Hand the scratch buffer back for the next factorization.
    pub fn into_buffer(self) -> Array2<f64> {
        self.a
    }
}
