use mpfit_rs::models::PolynomialModel;
use mpfit_rs::parameters::{DerivativeSide, ParameterStore};
use mpfit_rs::Problem;
use ndarray::Array1;

#[test]
fn test_parameter_configuration_round_trips_through_json() {
    let mut problem = Problem::new(3);
    problem
        .set_value(0, 1.5, false)
        .unwrap()
        .set_limits(0, 0.0, f64::INFINITY)
        .unwrap()
        .set_name(0, "amplitude")
        .unwrap();
    problem
        .set_value(1, -2.0, true)
        .unwrap()
        .set_step(1, 1e-3, 0.5, true)
        .unwrap()
        .set_side(1, DerivativeSide::Both)
        .unwrap();

    let json = problem.parameters().to_json().unwrap();
    let restored = ParameterStore::from_json(&json).unwrap();
    assert_eq!(restored.len(), 3);
    assert_eq!(restored.index_of("amplitude").unwrap(), 0);

    let p0 = restored.get(0).unwrap();
    assert_eq!(p0.value(), Some(1.5));
    assert_eq!(p0.min(), 0.0);
    assert_eq!(p0.max(), f64::INFINITY);

    let p1 = restored.get(1).unwrap();
    assert!(p1.is_fixed());
    assert_eq!(p1.step(), Some(1e-3));
    assert_eq!(p1.max_step(), Some(0.5));
    assert!(p1.relative_step());
    assert_eq!(p1.side(), DerivativeSide::Both);

    assert_eq!(restored.get(2).unwrap().value(), None);
    assert_eq!(restored.free_indices(), vec![0, 2]);
}

#[test]
fn test_solution_serializes_with_names() {
    let x = Array1::linspace(0.0, 3.0, 10);
    let y = x.mapv(|x| 1.0 + 0.5 * x);
    let solution = PolynomialModel::new(1)
        .into_problem(x, y, Array1::ones(10))
        .unwrap()
        .solve(None)
        .unwrap();

    let json = solution.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["names"][1], "c1");
    assert_eq!(value["nfree"], 2);
    let c1 = value["params"]["data"][1].as_f64().unwrap();
    assert!((c1 - 0.5).abs() < 1e-10);
}
