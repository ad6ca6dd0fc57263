use approx::assert_relative_eq;
use mpfit_rs::model::Model;
use mpfit_rs::models::{GaussianModel, PolynomialModel};
use mpfit_rs::parameters::DerivativeSide;
use ndarray::{array, Array1, Array2};
use rand_distr::{Distribution, Normal};

use crate::test_helpers::{init_logging, normal_equations_solve, rng};

#[test]
fn test_noisy_gaussian_recovers_truth() {
    init_logging();
    let sigma = 0.05;
    let truth = array![3.0, 0.5, 1.2, 1.0];
    let model = GaussianModel::new(true);

    let x = Array1::linspace(-5.0, 5.0, 201);
    let mut y = Array1::zeros(201);
    model.eval(truth.view(), x.view(), y.view_mut()).unwrap();
    let noise = Normal::new(0.0, sigma).unwrap();
    let mut rng = rng(42);
    y.mapv_inplace(|v| v + noise.sample(&mut rng));

    let problem = model
        .into_problem(x, y, Array1::from_elem(201, 1.0 / sigma))
        .unwrap();
    let solution = problem.solve(None).unwrap();
    assert!(solution.converged(), "{}", solution.status);
    log::info!("{}", solution);

    for (k, name) in model.parameter_names().iter().enumerate() {
        let (value, error) = solution.get(name).unwrap();
        assert!(error > 0.0);
        assert!(
            (value - truth[k]).abs() < 5.0 * error,
            "{}: {} ± {} vs {}",
            name,
            value,
            error,
            truth[k]
        );
    }

    let reduced = solution.reduced_chi_square();
    assert!(reduced > 0.5 && reduced < 1.5, "reduced chi-square {}", reduced);
    assert_eq!(solution.dof(), 197);
}

#[test]
fn test_polynomial_matches_normal_equations() {
    let mut rng = rng(9);
    let noise = Normal::new(0.0, 0.2).unwrap();
    let x = Array1::linspace(-1.0, 2.0, 40);
    let noise = Array1::from_shape_fn(40, |_| noise.sample(&mut rng));
    let y = x.mapv(|x: f64| 2.0 - x + 0.5 * x.powi(2) - 0.3 * x.powi(3)) + noise;

    let solution = PolynomialModel::new(3)
        .into_problem(x.clone(), y.clone(), Array1::ones(40))
        .unwrap()
        .solve(None)
        .unwrap();

    let design = Array2::from_shape_fn((40, 4), |(i, k)| x[i].powi(k as i32));
    let expected = normal_equations_solve(&design, &y);
    for k in 0..4 {
        assert_relative_eq!(solution.params[k], expected[k], epsilon = 1e-9);
    }
}

#[test]
fn test_gaussian_jacobian_agrees_with_finite_differences() {
    let model = GaussianModel::new(true);
    let x = Array1::linspace(-3.0, 3.0, 31);
    let y = Array1::zeros(31);
    let mut problem = model.into_problem(x, y, Array1::ones(31)).unwrap();
    for k in 0..4 {
        problem.set_side(k, DerivativeSide::Both).unwrap();
    }

    let check = problem.check_jacobian(&[2.0, 0.3, 0.8, 0.1]).unwrap();
    assert_eq!(check.free, vec![0, 1, 2, 3]);
    assert!(
        check.max_relative_difference() < 1e-5,
        "difference {}",
        check.max_relative_difference()
    );
}

#[test]
fn test_fixed_center_fit() {
    let model = GaussianModel::new(false);
    let truth = array![4.0, -0.5, 0.7];
    let x = Array1::linspace(-3.0, 2.0, 60);
    let mut y = Array1::zeros(60);
    model.eval(truth.view(), x.view(), y.view_mut()).unwrap();

    let mut problem = model.into_problem(x, y, Array1::ones(60)).unwrap();
    problem.set_value(1, -0.5, true).unwrap();
    let solution = problem.solve(None).unwrap();
    assert_eq!(solution.params[1], -0.5);
    assert_eq!(solution.nfree, 2);
    assert_relative_eq!(solution.params[0], 4.0, epsilon = 1e-8);
    assert_relative_eq!(solution.params[2], 0.7, epsilon = 1e-8);
}
