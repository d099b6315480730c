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

/*! # ekf-derivation

Symbolic derivation of the covariance prediction and of the sensor fusion equations of a 24 state
navigation extended Kalman filter, and generation of the C code the filter includes.

The state vector is the attitude quaternion, the NED velocity and position, the delta angle and
delta velocity biases, the earth magnetic field, the body magnetic field bias and the NE wind.
Each derivation is simplified by common subexpression elimination before being written.
*/

/// A minimal computer algebra: expressions, differentiation, matrices and common subexpression elimination.
pub mod algebra;

/// The symbol registry of a derivation run.
pub mod context;

/// State, inputs, rotations, covariance and state transition of the navigation filter.
pub mod ekf;

mod errors;
/// Every derivation failure aborts the run and is returned as this error.
pub use self::errors::DerivationError;

/// Configuration of a run and generation of the C code artifacts.
pub mod io;

/// Generic observation fusion and the observation models of every supported sensor.
pub mod observation;

/// The one-shot derivation run.
pub mod process;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

pub use self::process::{DerivationProcess, DerivationReport};

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}
