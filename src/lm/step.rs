//! Step calculation for the Levenberg-Marquardt algorithm.
//!
//! Given the QR factorization of the Jacobian, [`lmpar`] finds the damping
//! parameter `par` whose step `x` solves
//!
//! ```text
//! min ‖J·x + f‖² + par·‖D·x‖²
//! ```
//!
//! with `‖D·x‖` within 10% of the trust-region radius `delta`, or returns
//! the undamped Gauss-Newton step when that already lies inside the region.

use ndarray::{Array1, ArrayView1, ArrayViewMut2};

use crate::linalg::enorm::Enorm;
use crate::linalg::qr_solve::qrd_solve;

/// Newton iterations allowed on `par`.
const MAX_PAR_ITERATIONS: usize = 10;

/// A Levenberg-Marquardt step and the damping that produced it.
#[derive(Debug, Clone)]
pub struct LmStep {
    /// Damping parameter, zero for a Gauss-Newton step
    pub par: f64,
    /// Step, in unpermuted parameter order; the solver moves by `-x`
    pub x: Array1<f64>,
}

fn scaled_direction(
    pivot: &[usize],
    diag: ArrayView1<f64>,
    wa2: &Array1<f64>,
    dxnorm: f64,
) -> Array1<f64> {
    let dxnorm = dxnorm.max(f64::MIN_POSITIVE);
    pivot
        .iter()
        .map(|&l| diag[l] * (wa2[l] / dxnorm))
        .collect()
}

/// Determine the Levenberg-Marquardt parameter and step.
///
/// # Arguments
///
/// * `r` - The `n×n` block from [`TriangularR`](crate::linalg::TriangularR);
///   its upper triangle is preserved, the strict lower triangle is overwritten
/// * `pivot` - Column permutation of the factorization
/// * `diag` - Positive scaling diagonal `D`
/// * `qtb` - First `n` components of `Qᵗ·f`
/// * `delta` - Trust-region radius, `> 0`
/// * `par` - Initial estimate of the damping parameter
pub fn lmpar(
    mut r: ArrayViewMut2<f64>,
    pivot: &[usize],
    diag: ArrayView1<f64>,
    qtb: ArrayView1<f64>,
    delta: f64,
    par: f64,
) -> LmStep {
    let dwarf = f64::MIN_POSITIVE;
    let n = r.ncols();

    // Gauss-Newton direction; a singular R gets a least-squares solution.
    let mut wa1 = qtb.to_owned();
    let nsing = (0..n).position(|j| r[[j, j]] == 0.0).unwrap_or(n);
    for j in nsing..n {
        wa1[j] = 0.0;
    }
    for j in (0..nsing).rev() {
        wa1[j] /= r[[j, j]];
        let temp = wa1[j];
        for i in 0..j {
            wa1[i] -= r[[i, j]] * temp;
        }
    }
    let mut x = Array1::zeros(n);
    for (j, &p) in pivot.iter().enumerate() {
        x[p] = wa1[j];
    }

    let mut wa2 = &diag * &x;
    let mut dxnorm = wa2.enorm();
    let mut fp = dxnorm - delta;
    if fp <= 0.1 * delta {
        return LmStep { par: 0.0, x };
    }

    // Lower bound from the Newton step; only available at full rank.
    let mut parl = 0.0;
    if nsing == n {
        let mut wa1 = scaled_direction(pivot, diag, &wa2, dxnorm);
        for j in 0..n {
            let mut sum = 0.0;
            for i in 0..j {
                sum += r[[i, j]] * wa1[i];
            }
            wa1[j] = (wa1[j] - sum) / r[[j, j]];
        }
        let temp = wa1.enorm();
        parl = ((fp / delta) / temp) / temp;
    }

    // Upper bound from the scaled gradient.
    let gradient: Array1<f64> = (0..n)
        .map(|j| {
            let sum: f64 = (0..=j).map(|i| r[[i, j]] * qtb[i]).sum();
            sum / diag[pivot[j]]
        })
        .collect();
    let gnorm = gradient.enorm();
    let mut paru = gnorm / delta;
    if paru == 0.0 {
        paru = dwarf / delta.min(0.1);
    }

    let mut par = par.max(parl).min(paru);
    if par == 0.0 {
        par = gnorm / dxnorm;
    }

    let mut iter = 0;
    loop {
        iter += 1;

        if par == 0.0 {
            par = dwarf.max(0.001 * paru);
        }
        let ddiag = par.sqrt() * &diag;
        let sol = qrd_solve(r.view_mut(), pivot, ddiag.view(), qtb);
        x = sol.x;
        let sdiag = sol.sdiag;

        wa2 = &diag * &x;
        dxnorm = wa2.enorm();
        let previous = fp;
        fp = dxnorm - delta;

        // Accept when close enough, when par has hit its lower limit of
        // zero, or after the iteration budget.
        if fp.abs() <= 0.1 * delta
            || (parl == 0.0 && fp <= previous && previous < 0.0)
            || iter == MAX_PAR_ITERATIONS
        {
            break;
        }

        // Newton correction
        let mut wa1 = scaled_direction(pivot, diag, &wa2, dxnorm);
        for j in 0..n {
            let s = if sdiag[j] == 0.0 { dwarf } else { sdiag[j] };
            wa1[j] /= s;
            let temp = wa1[j];
            for i in (j + 1)..n {
                wa1[i] -= r[[i, j]] * temp;
            }
        }
        let temp = wa1.enorm();
        let parc = ((fp / delta) / temp) / temp;

        if fp > 0.0 {
            parl = parl.max(par);
        }
        if fp < 0.0 {
            paru = paru.min(par);
        }
        par = parl.max(par + parc);
    }

    LmStep { par, x }
}
