//! Problems from the MINPACK-1 test collection with published solutions.

mod nonlinear;

use mpfit_rs::{Problem, Solution};

use crate::test_helpers::init_logging;

/// Solve from `start` and fail loudly on setup errors.
pub fn solve_from(problem: &Problem, start: &[f64]) -> Solution {
    init_logging();
    let solution = problem.solve(Some(start)).unwrap();
    log::debug!(
        "{} iterations, {} evaluations, chi-square {:e}",
        solution.niter,
        solution.nfev,
        solution.fnorm
    );
    solution
}
