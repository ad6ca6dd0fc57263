use std::cell::RefCell;

use approx::assert_relative_eq;
use mpfit_rs::{DerivativeSide, Problem};
use ndarray::Array1;

use crate::test_helpers::init_logging;

/// Quadratic `a + b·x + c·x²` sampled at `x = 0..8`, generated with
/// `a = 1, b = 2, c = 1`.
fn quadratic_problem<'a>() -> Problem<'a> {
    let mut problem = Problem::new(3);
    problem.set_residual_fn(8, |p, mut r| {
        for i in 0..8 {
            let x = i as f64;
            let model = p[0] + p[1] * x + p[2] * x * x;
            r[i] = model - (1.0 + 2.0 * x + x * x);
        }
        Ok(())
    });
    problem
}

#[test]
fn test_fixed_parameter_is_untouched() {
    let mut problem = quadratic_problem();
    problem
        .set_value(0, 1.0, true)
        .unwrap()
        .set_value(1, 0.0, false)
        .unwrap()
        .set_value(2, 0.0, false)
        .unwrap();

    let solution = problem.solve(None).unwrap();
    assert!(solution.converged(), "{}", solution.status);
    assert_eq!(solution.params[0], 1.0);
    assert_eq!(solution.perror[0], 0.0);
    assert!(solution.covar.row(0).iter().all(|&c| c == 0.0));
    assert_eq!(solution.nfree, 2);
    assert_relative_eq!(solution.params[1], 2.0, epsilon = 1e-8);
    assert_relative_eq!(solution.params[2], 1.0, epsilon = 1e-8);

    // An explicit start replaces the configured value of a fixed parameter
    let shifted = problem.solve(Some(&[1.5, 0.0, 0.0])).unwrap();
    assert_eq!(shifted.params[0], 1.5);
}

#[test]
fn test_equal_limits_fix_a_parameter() {
    let mut problem = quadratic_problem();
    problem
        .set_value(2, 1.0, false)
        .unwrap()
        .set_limits(2, 1.0, 1.0)
        .unwrap();

    let solution = problem.solve(Some(&[0.0, 0.0, 1.0])).unwrap();
    assert_eq!(solution.params[2], 1.0);
    assert_eq!(solution.nfree, 2);
    assert_relative_eq!(solution.params[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.params[1], 2.0, epsilon = 1e-8);
}

#[test]
fn test_tied_parameter_follows_its_expression() {
    let mut problem = quadratic_problem();
    problem.set_tie(2, |p| 0.5 * p[1]).unwrap();

    let solution = problem.solve(Some(&[0.0, 0.0, 0.0])).unwrap();
    assert!(solution.converged(), "{}", solution.status);
    assert_eq!(solution.params[2], 0.5 * solution.params[1]);
    assert_eq!(solution.perror[2], 0.0);
    assert_eq!(solution.nfree, 2);
    assert_relative_eq!(solution.params[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.params[1], 2.0, epsilon = 1e-8);
    assert!(solution.fnorm < 1e-16);
}

#[test]
fn test_chained_ties_apply_in_index_order() {
    // p1 = 2·p0 and p2 = p1 - 1, so the model is p0 + 2·p0·x + (2·p0 - 1)·x²
    let mut problem = quadratic_problem();
    problem
        .set_tie(1, |p| 2.0 * p[0])
        .unwrap()
        .set_tie(2, |p| p[1] - 1.0)
        .unwrap();

    let solution = problem.solve(Some(&[0.3, 0.0, 0.0])).unwrap();
    assert_relative_eq!(solution.params[0], 1.0, epsilon = 1e-8);
    assert_eq!(solution.params[1], 2.0 * solution.params[0]);
    assert_eq!(solution.params[2], solution.params[1] - 1.0);
    assert_eq!(solution.nfree, 1);
}

#[test]
fn test_fixed_and_tied_values_hold_at_every_evaluation() {
    init_logging();
    let seen: RefCell<Vec<Array1<f64>>> = RefCell::new(Vec::new());

    // Cubic generated with (1, 2, 1, 0.5); p3 is tied to p1 / 4
    let mut problem = Problem::new(4);
    problem.set_residual_fn(10, |p, mut r| {
        seen.borrow_mut().push(p.to_owned());
        for i in 0..10 {
            let x = i as f64 * 0.5;
            let model = p[0] + p[1] * x + p[2] * x * x + p[3] * x * x * x;
            r[i] = model - (1.0 + 2.0 * x + x * x + 0.5 * x * x * x);
        }
        Ok(())
    });
    problem
        .set_value(0, 1.0, true)
        .unwrap()
        .set_side(1, DerivativeSide::Both)
        .unwrap()
        .set_limits(2, 0.0, 0.8)
        .unwrap()
        .set_tie(3, |p| 0.25 * p[1])
        .unwrap();

    let solution = problem.solve(Some(&[1.0, 0.0, 0.4, 0.0])).unwrap();
    assert_eq!(solution.nfree, 2);
    assert_eq!(solution.params[2], 0.8);

    let seen = seen.borrow();
    assert_eq!(seen.len(), solution.nfev);
    for p in seen.iter() {
        assert_eq!(p[0], 1.0);
        assert_eq!(p[3], 0.25 * p[1], "tie broken at {}", p);
        assert!((0.0..=0.8).contains(&p[2]), "p2 = {}", p[2]);
    }
}
