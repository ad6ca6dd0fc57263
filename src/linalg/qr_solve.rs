//! Regularized least-squares solve from a pivoted QR factorization.
//!
//! Given `A·P = Q·R`, a diagonal `D` and `Qᵗb`, [`qrd_solve`] finds `x`
//! minimizing `‖A·x − b‖² + ‖D·x‖²`. `D` is eliminated against `R` with
//! Givens rotations, producing an upper-triangular `S` with
//! `Pᵗ(AᵗA + D²)P = SᵗS`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2};

/// Solution of the regularized system.
#[derive(Debug, Clone)]
pub struct QrdSolution {
    /// The minimizing `x`, in unpermuted order
    pub x: Array1<f64>,
    /// Diagonal of `S`
    pub sdiag: Array1<f64>,
}

/// Solve `R·(Pᵗx) = Qᵗb`, `D·x = 0` in the least-squares sense.
///
/// `r` is the `n×n` block with `R` in its upper triangle. On return the
/// upper triangle and diagonal are unchanged and the strict lower triangle
/// holds the strict upper triangle of `S`, transposed. If `S` is singular
/// the trailing components of the permuted solution are set to zero.
pub fn qrd_solve(
    mut r: ArrayViewMut2<f64>,
    pivot: &[usize],
    ddiag: ArrayView1<f64>,
    qtb: ArrayView1<f64>,
) -> QrdSolution {
    let n = r.ncols();
    let mut x = Array1::zeros(n);
    let mut wa = Array1::zeros(n);
    let mut sdiag = Array1::zeros(n);

    // Mirror R below the diagonal; keep its diagonal in x.
    for j in 0..n {
        for i in j..n {
            r[[i, j]] = r[[j, i]];
        }
        x[j] = r[[j, j]];
        wa[j] = qtb[j];
    }

    for j in 0..n {
        let l = pivot[j];
        if ddiag[l] != 0.0 {
            for k in j..n {
                sdiag[k] = 0.0;
            }
            sdiag[j] = ddiag[l];

            // Eliminate row j of D, which touches only columns j.. of S.
            let mut qtbpj = 0.0;
            for k in j..n {
                if sdiag[k] == 0.0 {
                    continue;
                }
                let (sin, cos) = if r[[k, k]].abs() < sdiag[k].abs() {
                    let cotan = r[[k, k]] / sdiag[k];
                    let sin = 0.5 / (0.25 + 0.25 * cotan * cotan).sqrt();
                    (sin, sin * cotan)
                } else {
                    let tan = sdiag[k] / r[[k, k]];
                    let cos = 0.5 / (0.25 + 0.25 * tan * tan).sqrt();
                    (cos * tan, cos)
                };

                r[[k, k]] = cos * r[[k, k]] + sin * sdiag[k];
                let temp = cos * wa[k] + sin * qtbpj;
                qtbpj = -sin * wa[k] + cos * qtbpj;
                wa[k] = temp;

                for i in (k + 1)..n {
                    let temp = cos * r[[i, k]] + sin * sdiag[i];
                    sdiag[i] = -sin * r[[i, k]] + cos * sdiag[i];
                    r[[i, k]] = temp;
                }
            }
        }

        sdiag[j] = r[[j, j]];
        r[[j, j]] = x[j];
    }

    // Back-substitute; a singular S gets a least-squares solution.
    let nsing = sdiag.iter().position(|&v| v == 0.0).unwrap_or(n);
    for j in nsing..n {
        wa[j] = 0.0;
    }
    for j in (0..nsing).rev() {
        let mut sum = 0.0;
        for i in (j + 1)..nsing {
            sum += r[[i, j]] * wa[i];
        }
        wa[j] = (wa[j] - sum) / sdiag[j];
    }

    for (j, &p) in pivot.iter().enumerate() {
        x[p] = wa[j];
    }

    QrdSolution { x, sdiag }
}

/// Rebuild the upper-triangular `S` left behind by [`qrd_solve`].
pub fn s_matrix(r: ArrayView2<f64>, sdiag: ArrayView1<f64>) -> Array2<f64> {
    let n = sdiag.len();
    let mut s = Array2::zeros((n, n));
    for j in 0..n {
        s[[j, j]] = sdiag[j];
        for i in 0..j {
            s[[i, j]] = r[[j, i]];
        }
    }
    s
}
