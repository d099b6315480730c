/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2021 Christopher Rabotin <christopher.rabotin@gmail.com>

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use super::covariance::zero_lower_triangle;
use super::rotation::quat_mult;
use super::state::{Inputs, StateVector};
use super::NavigationModel;
use crate::algebra::matrix::{add, mat_vec, matmul};
use crate::algebra::{cse, jacobian, AlgebraError, Expr, SimplifiedSet, SymMatrix, TemporaryPool};
use crate::errors::{AlgebraSnafu, DerivationError};
use snafu::ResultExt;

/// The nonlinear state transition over one IMU sample interval.
///
/// + the quaternion is integrated at first order with the bias corrected delta angle;
/// + the bias corrected delta velocity is rotated into the earth frame and gravity is added;
/// + the position is integrated with the velocity of the previous step (explicit Euler);
/// + biases, magnetic field and wind are random walks, hence propagated unchanged.
#[derive(Clone, Debug)]
pub struct TransitionModel {
    predicted: Vec<Expr>,
}

impl TransitionModel {
    pub fn new(nav: &NavigationModel) -> Result<Self, AlgebraError> {
        let state = &nav.state;
        let half = Expr::rational(1, 2);

        let d_ang = nav.inputs.delta_angle();
        let d_ang_b = state.gyro_bias();
        let d_ang_true: [Expr; 3] = std::array::from_fn(|i| &d_ang[i] - &d_ang_b[i]);

        let d_vel = nav.inputs.delta_velocity();
        let d_vel_b = state.accel_bias();
        let d_vel_true: [Expr; 3] = std::array::from_fn(|i| &d_vel[i] - &d_vel_b[i]);

        let q = state.quaternion();
        let correction = [
            Expr::one(),
            &half * &d_ang_true[0],
            &half * &d_ang_true[1],
            &half * &d_ang_true[2],
        ];
        let q_new = quat_mult(&q, &correction);

        let v = state.velocity();
        let gravity = [Expr::zero(), Expr::zero(), nav.g.clone()];
        let rotated = mat_vec(&nav.r_to_earth, &d_vel_true)?;
        let v_new: Vec<Expr> = (0..3)
            .map(|i| &v[i] + &rotated[i] + &gravity[i] * &nav.dt)
            .collect();

        let p = state.position();
        let p_new: Vec<Expr> = (0..3).map(|i| &p[i] + &v[i] * &nav.dt).collect();

        let mut predicted = Vec::with_capacity(state.len());
        predicted.extend(q_new);
        predicted.extend(v_new);
        predicted.extend(p_new);
        predicted.extend(state.gyro_bias());
        predicted.extend(state.accel_bias());
        predicted.extend(state.mag_field());
        predicted.extend(state.mag_bias());
        predicted.extend(state.wind());

        Ok(Self { predicted })
    }

    /// The predicted state, in state order.
    pub fn predicted(&self) -> &[Expr] {
        &self.predicted
    }

    /// A = ∂f/∂x
    pub fn state_jacobian(&self, state: &StateVector) -> SymMatrix {
        jacobian(&self.predicted, state.symbols())
    }

    /// G = ∂f/∂u
    pub fn input_jacobian(&self, inputs: &Inputs) -> SymMatrix {
        jacobian(&self.predicted, inputs.symbols())
    }
}

/// P_new = A P Aᵀ + G Qu Gᵀ, with the lower triangle zeroed.
pub fn propagate_covariance(
    a: &SymMatrix,
    p: &SymMatrix,
    g: &SymMatrix,
    qu: &SymMatrix,
) -> Result<SymMatrix, AlgebraError> {
    let apat = matmul(&matmul(a, p)?, &a.transpose())?;
    let gqgt = matmul(&matmul(g, qu)?, &g.transpose())?;
    let mut p_new = add(&apat, &gqgt)?;
    zero_lower_triangle(&mut p_new);
    Ok(p_new)
}

/// Derives the covariance prediction and simplifies it, the result being the `nextP` matrix in
/// column major order.
pub fn covariance_prediction(
    nav: &NavigationModel,
    pool: &mut TemporaryPool,
) -> Result<(SimplifiedSet, (usize, usize)), DerivationError> {
    let transition = TransitionModel::new(nav).context(AlgebraSnafu { target: "nextP" })?;
    let a = transition.state_jacobian(&nav.state);
    let g = transition.input_jacobian(&nav.inputs);
    debug!(
        "transition jacobians: A has {} non zero entries, G has {}",
        a.iter().filter(|e| !e.is_zero()).count(),
        g.iter().filter(|e| !e.is_zero()).count()
    );

    let p_new = propagate_covariance(&a, &nav.covariance, &g, &nav.input_noise.matrix())
        .context(AlgebraSnafu { target: "nextP" })?;

    let entries: Vec<Expr> = p_new.iter().cloned().collect();
    let set = cse(&entries, pool).context(AlgebraSnafu { target: "nextP" })?;
    Ok((set, p_new.shape()))
}
