//! # Covariance Matrix Calculations
//!
//! Recovers the parameter covariance `(JᵗJ)⁻¹` from the triangular factor
//! of the final pivoted QR factorization, without forming `JᵗJ`.

use log::warn;
use ndarray::{Array1, Array2, ArrayView2};

/// Covariance of the free parameters and the numerical rank it was computed with.
#[derive(Debug, Clone)]
pub struct FreeCovariance {
    /// `n×n` covariance in unpermuted free-parameter order
    pub covar: Array2<f64>,
    /// Number of leading diagonal entries of `R` above the tolerance
    pub rank: usize,
}

/// Calculate `(JᵗJ)⁻¹` from `R` and the pivot of `J·P = Q·R`.
///
/// Only the upper triangle of `r` is read. `R` is inverted until the first
/// diagonal entry with `|R[k,k]| ≤ tol·|R[0,0]|`; rows and columns from that
/// point on are zero in the result.
pub fn covariance_from_r(r: ArrayView2<f64>, pivot: &[usize], tol: f64) -> FreeCovariance {
    let n = r.ncols();
    let mut a = Array2::zeros((n, n));
    for j in 0..n {
        for i in 0..=j {
            a[[i, j]] = r[[i, j]];
        }
    }
    if n == 0 {
        return FreeCovariance { covar: a, rank: 0 };
    }

    // Invert R in place.
    let tolr = tol * a[[0, 0]].abs();
    let mut rank = 0;
    for k in 0..n {
        if a[[k, k]].abs() <= tolr {
            break;
        }
        a[[k, k]] = 1.0 / a[[k, k]];
        for j in 0..k {
            let temp = a[[k, k]] * a[[j, k]];
            a[[j, k]] = 0.0;
            for i in 0..=j {
                a[[i, k]] -= temp * a[[i, j]];
            }
        }
        rank = k + 1;
    }

    // Upper triangle of R⁻¹·R⁻ᵗ.
    for k in 0..rank {
        for j in 0..k {
            let temp = a[[j, k]];
            for i in 0..=j {
                a[[i, j]] += temp * a[[i, k]];
            }
        }
        let temp = a[[k, k]];
        for i in 0..=k {
            a[[i, k]] *= temp;
        }
    }

    // Undo the permutation into the lower triangle, then symmetrize.
    let mut wa = Array1::zeros(n);
    for j in 0..n {
        let jj = pivot[j];
        let singular = j >= rank;
        for i in 0..=j {
            if singular {
                a[[i, j]] = 0.0;
            }
            let ii = pivot[i];
            if ii > jj {
                a[[ii, jj]] = a[[i, j]];
            } else if ii < jj {
                a[[jj, ii]] = a[[i, j]];
            }
        }
        wa[jj] = a[[j, j]];
    }
    for j in 0..n {
        for i in 0..j {
            a[[i, j]] = a[[j, i]];
        }
        a[[j, j]] = wa[j];
    }

    if rank < n {
        warn!(
            "Covariance is rank deficient: rank {} of {}; trailing rows set to zero",
            rank, n
        );
    }

    FreeCovariance { covar: a, rank }
}

/// Embed a free-parameter covariance into the full `npar×npar` matrix.
///
/// Rows and columns of fixed and tied parameters are zero.
pub fn embed_covariance(covar: &Array2<f64>, free: &[usize], npar: usize) -> Array2<f64> {
    let mut full = Array2::zeros((npar, npar));
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            full[[i, j]] = covar[[a, b]];
        }
    }
    full
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// Rows and columns with zero variance (fixed parameters) are zero.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
            if covar[[i, i]] > 0.0 && covar[[j, j]] > 0.0 && denom > 0.0 {
                correl[[i, j]] = if i == j { 1.0 } else { covar[[i, j]] / denom };
            }
        }
    }

    correl
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements
/// of the covariance matrix; negative round-off is reported as zero.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| v.max(0.0).sqrt())
}
