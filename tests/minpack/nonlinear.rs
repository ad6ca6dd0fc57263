use std::f64::consts::PI;

use approx::assert_relative_eq;
use mpfit_rs::{DiffMethod, Problem};

use super::solve_from;

#[test]
fn test_rosenbrock() {
    let mut problem = Problem::new(2);
    problem.set_residual_fn_with_jacobian(
        2,
        |x, mut f| {
            f[0] = 10.0 * (x[1] - x[0] * x[0]);
            f[1] = 1.0 - x[0];
            Ok(())
        },
        |x, mut j| {
            j[[0, 0]] = -20.0 * x[0];
            j[[0, 1]] = 10.0;
            j[[1, 0]] = -1.0;
            Ok(())
        },
    );

    let solution = solve_from(&problem, &[-1.2, 1.0]);
    assert!(solution.converged(), "{}", solution.status);
    assert_relative_eq!(solution.params[0], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.params[1], 1.0, epsilon = 1e-8);
    assert_relative_eq!(solution.orig_fnorm, 24.2, max_relative = 1e-12);
    assert!(solution.fnorm < 1e-16);
    assert!(solution.njev <= solution.niter + 1);
}

#[test]
fn test_helical_valley_with_finite_differences() {
    let mut problem = Problem::new(3);
    problem.set_residual_fn(3, |x, mut f| {
        let theta = if x[0] > 0.0 {
            (x[1] / x[0]).atan() / (2.0 * PI)
        } else if x[0] < 0.0 {
            (x[1] / x[0]).atan() / (2.0 * PI) + 0.5
        } else if x[1] >= 0.0 {
            0.25
        } else {
            -0.25
        };
        f[0] = 10.0 * (x[2] - 10.0 * theta);
        f[1] = 10.0 * ((x[0] * x[0] + x[1] * x[1]).sqrt() - 1.0);
        f[2] = x[2];
        Ok(())
    });
    problem.config_mut().diff_method = DiffMethod::FiniteDifference;

    let solution = solve_from(&problem, &[-1.0, 0.0, 0.0]);
    assert!(solution.converged(), "{}", solution.status);
    assert_relative_eq!(solution.params[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(solution.params[1], 0.0, epsilon = 1e-6);
    assert_relative_eq!(solution.params[2], 0.0, epsilon = 1e-6);
    assert!(solution.fnorm < 1e-10);
    // One-sided differences cost one evaluation per free parameter
    assert!(solution.nfev >= 3 * solution.njev);
}

#[test]
fn test_freudenstein_roth_local_minimum() {
    let mut problem = Problem::new(2);
    problem.set_residual_fn_with_jacobian(
        2,
        |x, mut f| {
            f[0] = -13.0 + x[0] + ((5.0 - x[1]) * x[1] - 2.0) * x[1];
            f[1] = -29.0 + x[0] + ((x[1] + 1.0) * x[1] - 14.0) * x[1];
            Ok(())
        },
        |x, mut j| {
            j[[0, 0]] = 1.0;
            j[[0, 1]] = x[1] * (10.0 - 3.0 * x[1]) - 2.0;
            j[[1, 0]] = 1.0;
            j[[1, 1]] = x[1] * (3.0 * x[1] + 2.0) - 14.0;
            Ok(())
        },
    );

    let solution = solve_from(&problem, &[0.5, -2.0]);
    let norm = 6.998_875_175_845_75_f64;
    assert_relative_eq!(solution.fnorm, norm * norm, max_relative = 1e-9);
    assert_relative_eq!(solution.params[0], 11.412_779_619_6, epsilon = 1e-5);
    assert_relative_eq!(solution.params[1], -0.896_805_107_492, epsilon = 1e-6);
}

const BARD_Y: [f64; 15] = [
    0.14, 0.18, 0.22, 0.25, 0.29, 0.32, 0.35, 0.39, 0.37, 0.58, 0.73, 0.96, 1.34, 2.10, 4.39,
];

#[test]
fn test_bard() {
    let terms = |i: usize| {
        let u = (i + 1) as f64;
        let v = (15 - i) as f64;
        (u, v, u.min(v))
    };

    let mut problem = Problem::new(3);
    problem.set_residual_fn_with_jacobian(
        15,
        move |x, mut f| {
            for i in 0..15 {
                let (u, v, w) = terms(i);
                f[i] = BARD_Y[i] - (x[0] + u / (x[1] * v + x[2] * w));
            }
            Ok(())
        },
        move |x, mut j| {
            for i in 0..15 {
                let (u, v, w) = terms(i);
                let den = x[1] * v + x[2] * w;
                j[[i, 0]] = -1.0;
                j[[i, 1]] = u * v / (den * den);
                j[[i, 2]] = u * w / (den * den);
            }
            Ok(())
        },
    );

    let solution = solve_from(&problem, &[1.0, 1.0, 1.0]);
    assert!(solution.converged(), "{}", solution.status);
    let norm = 0.090_635_960_339_70_f64;
    assert_relative_eq!(solution.fnorm, norm * norm, max_relative = 1e-9);
    assert_relative_eq!(solution.params[0], 0.082_410_576_57, epsilon = 1e-7);
    assert_relative_eq!(solution.params[1], 1.133_036_653, epsilon = 1e-6);
    assert_relative_eq!(solution.params[2], 2.343_694_638, epsilon = 1e-6);
}

const KOWALIK_Y: [f64; 11] = [
    0.1957, 0.1947, 0.1735, 0.1600, 0.0844, 0.0627, 0.0456, 0.0342, 0.0323, 0.0235, 0.0246,
];
const KOWALIK_U: [f64; 11] = [
    4.0, 2.0, 1.0, 0.5, 0.25, 0.167, 0.125, 0.1, 0.0833, 0.0714, 0.0625,
];

#[test]
fn test_kowalik_osborne() {
    let mut problem = Problem::new(4);
    problem.set_residual_fn_with_jacobian(
        11,
        |x, mut f| {
            for (i, &u) in KOWALIK_U.iter().enumerate() {
                let num = u * (u + x[1]);
                let den = u * (u + x[2]) + x[3];
                f[i] = KOWALIK_Y[i] - x[0] * num / den;
            }
            Ok(())
        },
        |x, mut j| {
            for (i, &u) in KOWALIK_U.iter().enumerate() {
                let num = u * (u + x[1]);
                let den = u * (u + x[2]) + x[3];
                let ratio = x[0] * num / (den * den);
                j[[i, 0]] = -num / den;
                j[[i, 1]] = -x[0] * u / den;
                j[[i, 2]] = ratio * u;
                j[[i, 3]] = ratio;
            }
            Ok(())
        },
    );

    let solution = solve_from(&problem, &[0.25, 0.39, 0.415, 0.39]);
    assert!(solution.converged(), "{}", solution.status);
    let norm = 0.017_535_837_721_12_f64;
    assert_relative_eq!(solution.fnorm, norm * norm, max_relative = 1e-8);
    let expected = [
        0.192_806_934_572_3,
        0.191_282_329_034_4,
        0.123_056_507_069_0,
        0.136_062_330_806_5,
    ];
    for (got, want) in solution.params.iter().zip(expected) {
        assert_relative_eq!(*got, want, epsilon = 1e-4);
    }

    // Every free parameter gets a positive error estimate
    assert!(solution.perror.iter().all(|&e| e > 0.0));
}
