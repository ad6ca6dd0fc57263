use approx::assert_relative_eq;
use mpfit_rs::linalg::{qrd_solve, s_matrix, Enorm, PackedQr};
use ndarray::{Array1, Array2};

use crate::test_helpers::{
    normal_equations_solve, random_matrix, random_vector, rng, to_nalgebra,
};

// ======== Factorization properties ========

#[test]
fn property_qr_reconstructs_permuted_matrix() {
    let mut rng = rng(7);
    for (m, n) in [(8, 5), (5, 5), (12, 3), (3, 1)] {
        let a = random_matrix(&mut rng, m, n);
        let qr = PackedQr::factor(a.clone()).unwrap();
        let product = qr.q().dot(&qr.r());
        for (k, &p) in qr.pivot().iter().enumerate() {
            for i in 0..m {
                assert_relative_eq!(product[[i, k]], a[[i, p]], epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn property_q_is_orthonormal() {
    let mut rng = rng(11);
    let a = random_matrix(&mut rng, 9, 4);
    let q = PackedQr::factor(a).unwrap().q();
    let qtq = q.t().dot(&q);
    for i in 0..4 {
        for j in 0..4 {
            let want = if i == j { 1.0 } else { 0.0 };
            assert_relative_eq!(qtq[[i, j]], want, epsilon = 1e-12);
        }
    }
}

#[test]
fn property_pivoting_orders_diagonal() {
    let mut rng = rng(13);
    for _ in 0..5 {
        let a = random_matrix(&mut rng, 10, 6);
        let qr = PackedQr::factor(a).unwrap();
        let rdiag = qr.rdiag();
        for j in 1..6 {
            assert!(rdiag[j].abs() <= rdiag[j - 1].abs() * (1.0 + 1e-8));
        }
    }
}

#[test]
fn property_r_diagonal_matches_nalgebra_up_to_sign() {
    let mut rng = rng(17);
    let a = random_matrix(&mut rng, 7, 4);
    let qr = PackedQr::factor(a.clone()).unwrap();

    // Factor the same column permutation without pivoting
    let permuted = Array2::from_shape_fn((7, 4), |(i, k)| a[[i, qr.pivot()[k]]]);
    let reference = to_nalgebra(&permuted).qr().r();
    for k in 0..4 {
        assert_relative_eq!(
            qr.rdiag()[k].abs(),
            reference[(k, k)].abs(),
            epsilon = 1e-12
        );
    }
}

// ======== Least-squares solves ========

#[test]
fn property_qrd_solve_without_damping_is_least_squares() {
    let mut rng = rng(19);
    let a = random_matrix(&mut rng, 10, 4);
    let b = random_vector(&mut rng, 10);

    let qr = PackedQr::factor(a.clone()).unwrap();
    let (mut tri, qtb) = qr.into_triangular(b.view()).unwrap();
    let pivot = tri.pivot().to_vec();
    let solution = qrd_solve(tri.r_mut(), &pivot, Array1::<f64>::zeros(4).view(), qtb.view());

    let expected = normal_equations_solve(&a, &b);
    for j in 0..4 {
        assert_relative_eq!(solution.x[j], expected[j], epsilon = 1e-10);
    }
}

#[test]
fn property_qrd_solve_matches_damped_normal_equations() {
    let mut rng = rng(23);
    let a = random_matrix(&mut rng, 8, 3);
    let b = random_vector(&mut rng, 8);
    let d = Array1::from(vec![0.5, 2.0, 1.0]);

    let qr = PackedQr::factor(a.clone()).unwrap();
    let (mut tri, qtb) = qr.into_triangular(b.view()).unwrap();
    let pivot = tri.pivot().to_vec();
    let solution = qrd_solve(tri.r_mut(), &pivot, d.view(), qtb.view());

    // [A; D]·x ≈ [b; 0]
    let mut stacked = Array2::zeros((11, 3));
    let mut rhs = Array1::zeros(11);
    for i in 0..8 {
        for j in 0..3 {
            stacked[[i, j]] = a[[i, j]];
        }
        rhs[i] = b[i];
    }
    for j in 0..3 {
        stacked[[8 + j, j]] = d[j];
    }
    let expected = normal_equations_solve(&stacked, &rhs);
    for j in 0..3 {
        assert_relative_eq!(solution.x[j], expected[j], epsilon = 1e-10);
    }

    // SᵗS = Pᵗ(AᵗA + D²)P
    let s = s_matrix(tri.r(), solution.sdiag.view());
    let sts = s.t().dot(&s);
    let normal = a.t().dot(&a);
    for (k, &pk) in pivot.iter().enumerate() {
        for (l, &pl) in pivot.iter().enumerate() {
            let mut want = normal[[pk, pl]];
            if pk == pl {
                want += d[pk] * d[pk];
            }
            assert_relative_eq!(sts[[k, l]], want, epsilon = 1e-10);
        }
    }
}

#[test]
fn property_enorm_agrees_with_naive_norm() {
    let mut rng = rng(29);
    for len in [1, 5, 100] {
        let v = random_vector(&mut rng, len);
        assert_relative_eq!(v.enorm(), v.enorm_fast(), max_relative = 1e-14);
    }

    let huge = Array1::from_elem(4, 1e200);
    assert_relative_eq!(huge.enorm(), 2e200, max_relative = 1e-14);
    assert!(huge.enorm_fast().is_infinite());
}
