use approx::assert_relative_eq;
use mpfit_rs::models::PolynomialModel;
use mpfit_rs::Problem;
use ndarray::{Array1, Array2};
use rand::Rng;

use crate::test_helpers::{normal_matrix_inverse, rng};

fn noisy_quadratic(n: usize, seed: u64) -> (Array1<f64>, Array1<f64>) {
    let mut rng = rng(seed);
    let x = Array1::linspace(-2.0, 3.0, n);
    let noise = Array1::from_shape_fn(n, |_| rng.gen_range(-0.1..0.1));
    let y = x.mapv(|x| 0.5 - 1.5 * x + 0.25 * x * x) + noise;
    (x, y)
}

fn design(x: &Array1<f64>, inv_sigma: f64) -> Array2<f64> {
    Array2::from_shape_fn((x.len(), 3), |(i, k)| x[i].powi(k as i32) * inv_sigma)
}

#[test]
fn test_linear_covariance_is_inverse_normal_matrix() {
    let (x, y) = noisy_quadratic(25, 3);
    let problem = PolynomialModel::new(2)
        .into_problem(x.clone(), y, Array1::ones(25))
        .unwrap();
    let solution = problem.solve(None).unwrap();
    assert!(solution.converged(), "{}", solution.status);

    let expected = normal_matrix_inverse(&design(&x, 1.0));
    for i in 0..3 {
        for j in 0..3 {
            assert_relative_eq!(
                solution.covar[[i, j]],
                expected[[i, j]],
                max_relative = 1e-8,
                epsilon = 1e-14
            );
        }
        assert_relative_eq!(
            solution.perror[i],
            expected[[i, i]].sqrt(),
            max_relative = 1e-8
        );
    }
}

#[test]
fn test_weights_scale_covariance() {
    let (x, y) = noisy_quadratic(20, 5);
    let unit = PolynomialModel::new(2)
        .into_problem(x.clone(), y.clone(), Array1::ones(20))
        .unwrap()
        .solve(None)
        .unwrap();
    // σ = 2 everywhere
    let halved = PolynomialModel::new(2)
        .into_problem(x.clone(), y, Array1::from_elem(20, 0.5))
        .unwrap()
        .solve(None)
        .unwrap();

    for i in 0..3 {
        assert_relative_eq!(halved.params[i], unit.params[i], epsilon = 1e-10);
        assert_relative_eq!(halved.perror[i], 2.0 * unit.perror[i], max_relative = 1e-8);
    }
    assert_relative_eq!(halved.fnorm, 0.25 * unit.fnorm, max_relative = 1e-8);

    // Scaling by the reduced chi-square removes the weight
    let a = unit.scaled_perror();
    let b = halved.scaled_perror();
    for i in 0..3 {
        assert_relative_eq!(a[i], b[i], max_relative = 1e-8);
    }

    let expected = normal_matrix_inverse(&design(&x, 0.5));
    assert_relative_eq!(halved.covar[[0, 0]], expected[[0, 0]], max_relative = 1e-8);
}

#[test]
fn test_covariance_is_symmetric_with_unit_correlation_diagonal() {
    let (x, y) = noisy_quadratic(30, 7);
    let solution = PolynomialModel::new(2)
        .into_problem(x, y, Array1::ones(30))
        .unwrap()
        .solve(None)
        .unwrap();

    let covar = &solution.covar;
    for i in 0..3 {
        assert!(covar[[i, i]] > 0.0);
        for j in 0..3 {
            assert_relative_eq!(covar[[i, j]], covar[[j, i]], epsilon = 1e-15);
        }
    }

    let corr = solution.correlation();
    for i in 0..3 {
        assert_relative_eq!(corr[[i, i]], 1.0, epsilon = 1e-12);
        for j in 0..3 {
            assert!(corr[[i, j]].abs() <= 1.0 + 1e-12);
        }
    }
}

#[test]
fn test_insensitive_parameter_has_zero_error() {
    // p1 never enters the residuals, so its Jacobian column is zero
    let mut problem = Problem::new(2);
    problem.set_residual_fn(6, |p, mut r| {
        for i in 0..6 {
            r[i] = p[0] - i as f64;
        }
        Ok(())
    });

    let solution = problem.solve(Some(&[0.0, 4.0])).unwrap();
    assert_relative_eq!(solution.params[0], 2.5, epsilon = 1e-10);
    assert_eq!(solution.params[1], 4.0);
    assert_relative_eq!(solution.perror[0], (1.0f64 / 6.0).sqrt(), max_relative = 1e-10);
    assert_eq!(solution.perror[1], 0.0);
    assert!(solution.covar.row(1).iter().all(|&c| c == 0.0));
}
