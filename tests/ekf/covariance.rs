extern crate ekf_derivation;

use approx::assert_relative_eq;
use ekf_derivation::algebra::SymMatrix;
use ekf_derivation::ekf::covariance::{is_symmetric, is_upper_triangular};
use ekf_derivation::ekf::{TransitionModel, STATE_SIZE};
use ekf_derivation::io::DerivationConfig;
use ekf_derivation::linalg::DMatrix;
use ekf_derivation::process::COVARIANCE_ARTIFACT;
use ekf_derivation::DerivationProcess;
use rstest::*;
use std::fs;

use crate::{eval_set, init_logger, random_point};

#[fixture]
fn process() -> DerivationProcess {
    let output_dir = std::env::temp_dir().join("ekf_derivation_covariance");
    fs::create_dir_all(&output_dir).unwrap();
    DerivationProcess::new(DerivationConfig::builder().output_dir(output_dir).build()).unwrap()
}

#[rstest]
fn covariance_prediction(process: DerivationProcess) {
    init_logger();

    let nav = process.navigation();
    assert!(is_symmetric(&nav.covariance));

    let (set, shape) = process.derive_covariance().unwrap();
    assert_eq!(shape, (STATE_SIZE, STATE_SIZE));
    assert_eq!(set.reduced.len(), STATE_SIZE * STATE_SIZE);
    assert!(set
        .replacements
        .iter()
        .all(|(temp, _)| temp.name().starts_with("PS")));

    // Only the upper triangle is propagated
    let next_p = SymMatrix::from_vec(STATE_SIZE, STATE_SIZE, set.reduced.clone());
    assert!(is_upper_triangular(&next_p));

    // Compare with A P A' + G Qu G' computed numerically
    let point = random_point(process.context(), 7);
    let numeric = |mat: &SymMatrix| -> DMatrix<f64> {
        DMatrix::from_fn(mat.nrows(), mat.ncols(), |i, j| {
            mat[(i, j)].eval(&point).unwrap()
        })
    };
    let model = TransitionModel::new(nav).unwrap();
    let a = numeric(&model.state_jacobian(&nav.state));
    let g = numeric(&model.input_jacobian(&nav.inputs));
    let p = numeric(&nav.covariance);
    let qu = numeric(&nav.input_noise.matrix());
    let expected = &a * &p * a.transpose() + &g * &qu * g.transpose();

    let values = eval_set(&set, &point);
    let generated = DMatrix::from_vec(STATE_SIZE, STATE_SIZE, values);
    for j in 0..STATE_SIZE {
        for i in 0..=j {
            assert_relative_eq!(
                generated[(i, j)],
                expected[(i, j)],
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
        for i in (j + 1)..STATE_SIZE {
            assert_eq!(generated[(i, j)], 0.0);
        }
    }

    // The artifact carries the upper triangle only
    let path = process.write_covariance(&set, shape).unwrap();
    assert!(path.ends_with(COVARIANCE_ARTIFACT));
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(
        "// Equations for covariance matrix prediction, without process noise!\nconst float PS0 = "
    ));
    assert_eq!(
        text.matches("const float PS").count(),
        set.replacements.len()
    );
    assert_eq!(
        text.matches("nextP(").count(),
        STATE_SIZE * (STATE_SIZE + 1) / 2
    );
    assert!(text.contains("\nnextP(0,0) = "));
    assert!(text.contains("\nnextP(23,23) = "));
    assert!(!text.contains("nextP(1,0)"));
}

#[rstest]
fn static_prediction(process: DerivationProcess) {
    let nav = process.navigation();
    let model = TransitionModel::new(nav).unwrap();
    let ctx = process.context();

    // Unbiased inputs which exactly cancel the biases: only gravity acts
    let mut point = random_point(ctx, 3);
    for (input, bias) in [
        ("dax", "dax_b"),
        ("day", "day_b"),
        ("daz", "daz_b"),
        ("dvx", "dvx_b"),
        ("dvy", "dvy_b"),
        ("dvz", "dvz_b"),
    ] {
        let value = point[&ctx.lookup(bias).unwrap()];
        point.insert(ctx.lookup(input).unwrap(), value);
    }
    let value = |name: &str| point[&ctx.lookup(name).unwrap()];

    let predicted: Vec<f64> = model
        .predicted()
        .iter()
        .map(|expr| expr.eval(&point).unwrap())
        .collect();

    for (i, q) in ["q0", "q1", "q2", "q3"].iter().enumerate() {
        assert_relative_eq!(predicted[i], value(q), epsilon = 1e-12);
    }
    assert_relative_eq!(predicted[4], value("vn"), epsilon = 1e-12);
    assert_relative_eq!(predicted[5], value("ve"), epsilon = 1e-12);
    assert_relative_eq!(
        predicted[6],
        value("vd") + value("g") * value("dt"),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        predicted[7],
        value("pn") + value("vn") * value("dt"),
        epsilon = 1e-12
    );
}
