use mpfit_rs::{DiffMethod, MpFitError, Problem, TerminationReason};

fn rosenbrock<'a>() -> Problem<'a> {
    let mut problem = Problem::new(2);
    problem.set_residual_fn(2, |x, mut f| {
        f[0] = 10.0 * (x[1] - x[0] * x[0]);
        f[1] = 1.0 - x[0];
        Ok(())
    });
    problem
}

#[test]
fn test_missing_residual_function() {
    let err = Problem::new(2).solve(Some(&[0.0, 0.0])).unwrap_err();
    assert!(matches!(err, MpFitError::MissingResidualFunction));
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_options_are_configuration_errors() {
    let mut problem = rosenbrock();
    problem.config_mut().ftol = -1.0;
    let err = problem.solve(Some(&[0.0, 0.0])).unwrap_err();
    assert!(matches!(err, MpFitError::InvalidOption(_)), "{}", err);
    assert!(err.is_configuration());

    // No analytic Jacobian to use
    let mut problem = rosenbrock();
    problem.config_mut().diff_method = DiffMethod::Analytical;
    let err = problem.solve(Some(&[0.0, 0.0])).unwrap_err();
    assert!(matches!(err, MpFitError::IncompatibleOptions(_)), "{}", err);
}

#[test]
fn test_bad_starting_values() {
    let mut problem = rosenbrock();
    problem.set_limits(0, 0.0, 1.0).unwrap();
    assert!(problem.solve(Some(&[2.0, 0.0])).unwrap_err().is_configuration());
    assert!(problem.solve(Some(&[0.5])).unwrap_err().is_configuration());
    assert!(problem
        .solve(Some(&[0.5, f64::NAN]))
        .unwrap_err()
        .is_configuration());

    // Unset values with no explicit start
    assert!(problem.solve(None).unwrap_err().is_configuration());
}

#[test]
fn test_all_parameters_fixed() {
    let mut problem = rosenbrock();
    problem
        .set_value(0, 1.0, true)
        .unwrap()
        .set_value(1, 1.0, true)
        .unwrap();
    let err = problem.solve(None).unwrap_err();
    assert!(matches!(err, MpFitError::NoFreeParameters), "{}", err);
}

#[test]
fn test_fewer_residuals_than_free_parameters() {
    let mut problem = Problem::new(3);
    problem.set_residual_fn(2, |x, mut f| {
        f[0] = x[0] + x[1];
        f[1] = x[2];
        Ok(())
    });
    let err = problem.solve(Some(&[0.0; 3])).unwrap_err();
    assert!(
        matches!(err, MpFitError::TooFewResiduals { residuals: 2, free: 3 }),
        "{}",
        err
    );
}

#[test]
fn test_non_finite_residuals_abort() {
    // The model is undefined beyond 1, where the minimum lies
    let mut problem = Problem::new(1);
    problem.set_residual_fn(1, |x, mut f| {
        f[0] = if x[0] > 1.0 { f64::NAN } else { x[0] - 5.0 };
        Ok(())
    });

    let err = problem.solve(Some(&[0.0])).unwrap_err();
    assert!(matches!(err, MpFitError::NonFiniteResiduals), "{}", err);
    assert!(err.is_numerical());
    assert!(!err.is_configuration());
}

#[test]
fn test_user_error_is_propagated() {
    let mut problem = Problem::new(1);
    problem.set_residual_fn(1, |x, mut f| {
        if x[0] > 1.0 {
            return Err(MpFitError::FunctionEvaluation("outside model domain".to_string()));
        }
        f[0] = x[0] - 5.0;
        Ok(())
    });

    let err = problem.solve(Some(&[0.0])).unwrap_err();
    assert!(matches!(err, MpFitError::FunctionEvaluation(_)), "{}", err);
}

#[test]
fn test_iteration_limit_is_reported() {
    let mut problem = rosenbrock();
    problem.config_mut().max_iterations = 3;

    let solution = problem.solve(Some(&[-1.2, 1.0])).unwrap();
    assert!(solution.status.contains(TerminationReason::MaxIterations));
    assert!(!solution.converged());
    assert_eq!(solution.niter, 3);
    assert!(solution.fnorm < solution.orig_fnorm);
}

#[test]
fn test_evaluation_limit_is_reported() {
    let mut problem = rosenbrock();
    problem.config_mut().max_evaluations = Some(10);

    let solution = problem.solve(Some(&[-1.2, 1.0])).unwrap();
    assert!(solution.status.contains(TerminationReason::MaxEvaluations));
    // The limit is checked after each trial point
    assert!(solution.nfev >= 10 && solution.nfev <= 12, "nfev = {}", solution.nfev);
}
