extern crate ekf_derivation;

use approx::assert_relative_eq;
use ekf_derivation::algebra::Symbol;
use ekf_derivation::ekf::STATE_SIZE;
use ekf_derivation::io::DerivationConfig;
use ekf_derivation::linalg::U2;
use ekf_derivation::observation::Sensor;
use ekf_derivation::DerivationProcess;
use hyperdual::{Float, OHyperdual};
use rstest::*;
use std::collections::HashMap;

use crate::{eval_set, random_point};

/// Value and first derivative with respect to the seeded state.
type Dual = OHyperdual<f64, U2>;

#[fixture]
fn process() -> DerivationProcess {
    DerivationProcess::new(DerivationConfig::default()).unwrap()
}

/// Returns the seeded dual of `name` if it is the state being differentiated, a constant otherwise.
struct DualPoint<'a> {
    process: &'a DerivationProcess,
    point: &'a HashMap<Symbol, f64>,
    seeded: &'a str,
}

impl DualPoint<'_> {
    fn var(&self, name: &str) -> Dual {
        let value = self.point[&self.process.context().lookup(name).unwrap()];
        let partial = if name == self.seeded { 1.0 } else { 0.0 };
        Dual::from_slice(&[value, partial])
    }

    fn rotation_to_earth(&self) -> [[Dual; 3]; 3] {
        let [q0, q1, q2, q3] = ["q0", "q1", "q2", "q3"].map(|q| self.var(q));
        let two = Dual::from_slice(&[2.0, 0.0]);
        [
            [
                q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
                two * (q1 * q2 - q0 * q3),
                two * (q1 * q3 + q0 * q2),
            ],
            [
                two * (q1 * q2 + q0 * q3),
                q0 * q0 - q1 * q1 + q2 * q2 - q3 * q3,
                two * (q2 * q3 - q0 * q1),
            ],
            [
                two * (q1 * q3 - q0 * q2),
                two * (q2 * q3 + q0 * q1),
                q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3,
            ],
        ]
    }

    fn air_relative_velocity(&self) -> [Dual; 3] {
        [
            self.var("vn") - self.var("vwn"),
            self.var("ve") - self.var("vwe"),
            self.var("vd"),
        ]
    }
}

/// Symbolic observation Jacobian of a single axis sensor, evaluated at `point`.
fn symbolic_jacobian(
    process: &mut DerivationProcess,
    sensor: Sensor,
    seed: u64,
) -> (Vec<f64>, HashMap<Symbol, f64>) {
    let derived = process.derive_sensor(sensor).unwrap();
    let point = random_point(process.context(), seed);
    let values = eval_set(&derived[0].1[0].set, &point);
    (values[..STATE_SIZE].to_vec(), point)
}

fn state_index(process: &DerivationProcess, name: &str) -> usize {
    process
        .navigation()
        .state
        .symbols()
        .iter()
        .position(|s| s.name() == name)
        .unwrap()
}

#[rstest]
fn airspeed_jacobian(mut process: DerivationProcess) {
    let (h, point) = symbolic_jacobian(&mut process, Sensor::Airspeed, 17);

    for seeded in ["vn", "ve", "vd", "vwn", "vwe"] {
        let dual = DualPoint {
            process: &process,
            point: &point,
            seeded,
        };
        let [rel_n, rel_e, rel_d] = dual.air_relative_velocity();
        let tas = (rel_n * rel_n + rel_e * rel_e + rel_d * rel_d).sqrt();
        assert_relative_eq!(
            h[state_index(&process, seeded)],
            tas[1],
            epsilon = 1e-12,
            max_relative = 1e-10
        );
    }
    // Airspeed does not depend on the attitude
    assert_eq!(h[0], 0.0);
}

#[rstest]
fn declination_jacobian(mut process: DerivationProcess) {
    let (h, point) = symbolic_jacobian(&mut process, Sensor::Declination, 29);

    for seeded in ["magN", "magE", "magD"] {
        let dual = DualPoint {
            process: &process,
            point: &point,
            seeded,
        };
        let decl = (dual.var("magE") / dual.var("magN")).atan();
        assert_relative_eq!(
            h[state_index(&process, seeded)],
            decl[1],
            epsilon = 1e-12,
            max_relative = 1e-10
        );
    }
}

#[rstest]
fn sideslip_jacobian(mut process: DerivationProcess) {
    let (h, point) = symbolic_jacobian(&mut process, Sensor::Sideslip, 31);

    for seeded in ["q0", "q1", "q2", "q3", "vn", "ve", "vd", "vwn", "vwe"] {
        let dual = DualPoint {
            process: &process,
            point: &point,
            seeded,
        };
        let r = dual.rotation_to_earth();
        let v = dual.air_relative_velocity();
        // body frame velocity, i.e. the transposed rotation
        let v_bf: Vec<Dual> = (0..3)
            .map(|i| r[0][i] * v[0] + r[1][i] * v[1] + r[2][i] * v[2])
            .collect();
        let beta = v_bf[1] / v_bf[0];
        assert_relative_eq!(
            h[state_index(&process, seeded)],
            beta[1],
            epsilon = 1e-10,
            max_relative = 1e-8
        );
    }
}
