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

use crate::algebra::{Expr, SymMatrix};
use crate::context::DerivationContext;

/// Symmetric covariance construction.
pub mod covariance;
/// Quaternion algebra.
pub mod rotation;
/// State vector, inputs and input noise.
pub mod state;
/// State transition model, its Jacobians and the covariance prediction.
pub mod transition;

pub use state::{InputNoise, Inputs, StateBlock, StateVector, INPUT_SIZE, STATE_SIZE};
pub use transition::TransitionModel;

/// Everything shared by the derivations of a run, built once and read only afterwards.
#[derive(Clone, Debug)]
pub struct NavigationModel {
    /// IMU sample interval
    pub dt: Expr,
    /// Gravity
    pub g: Expr,
    pub inputs: Inputs,
    pub input_noise: InputNoise,
    pub state: StateVector,
    /// Rotation from body to earth (NED) frame
    pub r_to_earth: SymMatrix,
    /// Rotation from earth (NED) to body frame
    pub r_to_body: SymMatrix,
    /// The 24x24 symmetric covariance
    pub covariance: SymMatrix,
}

impl NavigationModel {
    pub fn new(ctx: &mut DerivationContext) -> Self {
        let dt = ctx.create_symbol("dt").expr();
        let g = ctx.create_symbol("g").expr();
        let inputs = Inputs::new(ctx);
        let input_noise = InputNoise::new(ctx);
        let state = StateVector::new(ctx);

        let r_to_earth = rotation::quat2rot(&state.quaternion());
        let r_to_body = r_to_earth.transpose();
        let covariance = covariance::create_symmetric_cov_matrix(ctx, state.len());

        Self {
            dt,
            g,
            inputs,
            input_noise,
            state,
            r_to_earth,
            r_to_body,
            covariance,
        }
    }
}
