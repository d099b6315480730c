extern crate ekf_derivation;

use approx::assert_relative_eq;
use ekf_derivation::algebra::Expr;
use ekf_derivation::ekf::{StateBlock, STATE_SIZE};
use ekf_derivation::io::codegen::{ccode, BlockNames};
use ekf_derivation::io::{DerivationConfig, PoolConfig};
use ekf_derivation::linalg::{DMatrix, DVector};
use ekf_derivation::observation::{
    FusionProblem, FusionStrategy, FusionTarget, PoolKind, Section, Sensor,
};
use ekf_derivation::{DerivationError, DerivationProcess};
use rstest::*;

use crate::{eval_all, eval_set, init_logger, random_point};

#[fixture]
fn process() -> DerivationProcess {
    DerivationProcess::new(DerivationConfig::default()).unwrap()
}

#[rstest]
fn magnetometer_batched_matches_sequential(mut process: DerivationProcess) {
    init_logger();
    let derived = process.derive_sensor(Sensor::Magnetometer).unwrap();
    assert_eq!(derived.len(), 2);

    let (sequential, seq_sections) = &derived[0];
    let (batched, batch_sections) = &derived[1];
    assert_eq!(sequential.artifact, "3Dmag_generated.cpp");
    assert_eq!(sequential.strategy, FusionStrategy::Sequential);
    assert_eq!(batched.artifact, "3Dmag_generated_alt.cpp");
    assert_eq!(seq_sections.len(), 3);
    assert_eq!(batch_sections.len(), 1);
    assert_eq!(batch_sections[0].n_obs, 3);
    assert_eq!(batch_sections[0].set.len(), 3 * 2 * STATE_SIZE);

    // Identical once the temporaries are substituted back
    let batch_expanded = batch_sections[0].set.expand();
    for (axis, section) in seq_sections.iter().enumerate() {
        assert_eq!(
            section.set.expand(),
            &batch_expanded[axis * 2 * STATE_SIZE..(axis + 1) * 2 * STATE_SIZE]
        );
    }

    let point = random_point(process.context(), 42);
    let batch_values = eval_set(&batch_sections[0].set, &point);
    for (axis, section) in seq_sections.iter().enumerate() {
        assert_eq!(
            section.heading.as_deref(),
            Some(format!("Axis {axis} equations").as_str())
        );
        assert_eq!(section.n_obs, 1);
        assert_eq!(section.set.len(), 2 * STATE_SIZE);

        let values = eval_set(&section.set, &point);
        let slice = &batch_values[axis * 2 * STATE_SIZE..(axis + 1) * 2 * STATE_SIZE];
        for (seq, batch) in values.iter().zip(slice) {
            assert_relative_eq!(*seq, *batch, epsilon = 1e-12, max_relative = 1e-10);
        }

        // The same expressions once the temporaries are substituted back
        let expanded = eval_all(&section.set.expand(), &point);
        for (value, expected) in expanded.iter().zip(values.iter()) {
            assert_relative_eq!(*value, *expected, epsilon = 1e-12, max_relative = 1e-10);
        }
    }

    // The magnetometer only observes the attitude, the field and its bias
    let expanded = seq_sections[0].set.expand();
    let h_axis0 = &expanded[..STATE_SIZE];
    for block in [StateBlock::Velocity, StateBlock::Position, StateBlock::Wind] {
        for idx in block.offset()..block.offset() + block.len() {
            assert!(h_axis0[idx].is_zero(), "{block}");
        }
    }
    assert_eq!(
        h_axis0[StateBlock::MagBias.offset()],
        Expr::one(),
        "unit sensitivity to the X bias"
    );
}

#[rstest]
fn body_drag_fuses_two_axes(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::BodyDrag).unwrap();
    let (alt, sections) = &derived[1];
    assert_eq!(alt.artifact, "acc_bf_generated_alt.cpp");
    assert_eq!(sections[0].n_obs, 2);
    assert_eq!(sections[0].set.len(), 2 * 2 * STATE_SIZE);
    assert!(process.context().lookup("Kaccx").is_some());
}

#[rstest]
fn yaw_formulations(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::Yaw).unwrap();
    assert_eq!(derived.len(), 1);
    let (target, sections) = &derived[0];
    assert_eq!(target.artifact, "yaw_generated.cpp");
    assert_eq!(target.strategy, FusionStrategy::JacobianOnly);
    assert_eq!(sections.len(), 4);

    let point = random_point(process.context(), 5);
    let values: Vec<Vec<f64>> = sections
        .iter()
        .map(|section| {
            assert_eq!(section.n_obs, 0);
            assert_eq!(section.set.len(), STATE_SIZE);
            // Yaw only depends on the attitude
            assert!(section.set.reduced[4..].iter().all(|h| h.is_zero()));
            eval_set(&section.set, &point)
        })
        .collect();

    for (section, prefix) in sections.iter().zip(["SA", "SB", "SA", "SB"]) {
        assert!(section
            .set
            .replacements
            .iter()
            .all(|(temp, _)| temp.name().starts_with(prefix)));
    }

    // Both formulations describe the same angle, hence have the same Jacobian
    for (a, b) in [(0, 1), (2, 3)] {
        for (ha, hb) in values[a].iter().zip(values[b].iter()) {
            assert_relative_eq!(*ha, *hb, epsilon = 1e-10, max_relative = 1e-8);
        }
    }
}

#[rstest]
fn optical_flow_depends_on_range(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::OpticalFlow).unwrap();
    let (target, sections) = &derived[0];
    assert_eq!(target.artifact, "flow_generated.cpp");
    assert_eq!(sections[0].heading.as_deref(), Some("X Axis Equations"));
    assert_eq!(sections[1].heading.as_deref(), Some("Y Axis Equations"));

    let range = process.context().lookup("range").unwrap();
    let expanded = sections[0].set.expand();
    let h_x = &expanded[..STATE_SIZE];
    let vn = StateBlock::Velocity.offset();
    assert!(h_x[vn].depends_on(&range));
    assert!(ccode(&h_x[vn]).contains("/range"));
    for h in h_x.iter().filter(|h| !h.is_zero()) {
        assert!(h.depends_on(&range), "{h}");
    }
    // No sensitivity to the wind, the flow is relative to the ground
    assert!(h_x[StateBlock::Wind.offset()].is_zero());
}

#[rstest]
fn airspeed_kalman_gain(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::Airspeed).unwrap();
    let (target, sections) = &derived[0];
    assert_eq!(target.artifact, "tas_generated.cpp");
    assert_eq!(sections.len(), 1);
    assert!(sections[0].heading.is_none());

    let ctx = process.context();
    let point = random_point(ctx, 1234);
    let values = eval_set(&sections[0].set, &point);
    let h = DVector::from_column_slice(&values[..STATE_SIZE]);
    let k = DVector::from_column_slice(&values[STATE_SIZE..]);

    let cov = &process.navigation().covariance;
    let p = DMatrix::from_fn(STATE_SIZE, STATE_SIZE, |i, j| {
        cov[(i, j)].eval(&point).unwrap()
    });
    let r_tas = point[&ctx.lookup("R_TAS").unwrap()];
    let pht = &p * &h;
    let innov_var = h.dot(&pht) + r_tas;
    let expected = pht / innov_var;
    for i in 0..STATE_SIZE {
        assert_relative_eq!(k[i], expected[i], epsilon = 1e-12, max_relative = 1e-9);
    }
}

#[rstest]
fn body_velocity_names(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::BodyVelocity).unwrap();
    assert_eq!(derived[0].0.names, BlockNames::compact("H_VEL", "Kfusion"));
    assert_eq!(derived[1].0.names, BlockNames::FUSION);
    assert_eq!(derived[1].1[0].n_obs, 3);
    let headings: Vec<_> = derived[0]
        .1
        .iter()
        .map(|s| s.heading.clone().unwrap())
        .collect();
    assert_eq!(headings, vec!["axis 0", "axis 1", "axis 2"]);
}

#[rstest]
fn fusion_errors(process: DerivationProcess) {
    let nav = process.navigation();
    let state = nav.state.symbols();
    assert_eq!(
        FusionProblem::new("short.cpp", &nav.covariance, &state[..23]).unwrap_err(),
        DerivationError::StateSize {
            expected: STATE_SIZE,
            got: 23
        }
    );

    let problem = FusionProblem::new("test.cpp", &nav.covariance, state).unwrap();
    let [vn, _, _] = nav.state.velocity();
    let pools = PoolConfig::default();

    let no_variance = FusionTarget {
        artifact: "test.cpp",
        strategy: FusionStrategy::Sequential,
        variance: None,
        sections: vec![Section {
            heading: None,
            axes: vec![vn.clone()],
            pool: PoolKind::Gain,
        }],
        names: BlockNames::FUSION,
    };
    assert!(matches!(
        no_variance.derive(&problem, &pools),
        Err(DerivationError::MissingVariance { .. })
    ));

    let no_axes = FusionTarget {
        variance: Some(Expr::one()),
        sections: vec![Section {
            heading: None,
            axes: vec![],
            pool: PoolKind::Gain,
        }],
        ..no_variance.clone()
    };
    assert!(matches!(
        no_axes.derive(&problem, &pools),
        Err(DerivationError::EmptyObservation { .. })
    ));

    // A direct velocity observation, H selects vn
    let direct = FusionTarget {
        variance: Some(Expr::one()),
        ..no_variance.clone()
    };
    let sections = direct.derive(&problem, &pools).unwrap();
    let expanded = sections[0].set.expand();
    let h = &expanded[..STATE_SIZE];
    for (i, hi) in h.iter().enumerate() {
        if i == StateBlock::Velocity.offset() {
            assert!(hi.is_one());
        } else {
            assert!(hi.is_zero());
        }
    }
}

#[rstest]
fn pool_exhaustion(mut process: DerivationProcess) {
    let derived = process.derive_sensor(Sensor::Magnetometer).unwrap();
    let (target, _) = &derived[0];

    // One temporary is not enough
    let mut tiny = PoolConfig::default();
    tiny.gain.capacity = 1;
    let nav = process.navigation();
    let problem =
        FusionProblem::new(target.artifact, &nav.covariance, nav.state.symbols()).unwrap();
    assert!(matches!(
        target.derive(&problem, &tiny),
        Err(DerivationError::Algebra { .. })
    ));
}
