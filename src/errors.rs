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

use crate::algebra::AlgebraError;
use crate::io::codegen::EmitError;
use crate::io::ConfigError;
use snafu::prelude::*;

/// Any failure aborts the whole run: there is no partial output or retry policy.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DerivationError {
    #[snafu(display("while deriving {target}, encountered {source}"))]
    Algebra {
        target: String,
        source: AlgebraError,
    },
    #[snafu(display("{target} has no observation axis"))]
    EmptyObservation { target: String },
    #[snafu(display("{target} derives a Kalman gain without a noise variance"))]
    MissingVariance { target: String },
    #[snafu(display("expected a state of {expected} entries, got {got}"))]
    StateSize { expected: usize, got: usize },
    #[snafu(display("emission failed: {source}"))]
    Emit { source: EmitError },
    #[snafu(display("derivation not configured: {source}"))]
    Config { source: ConfigError },
}
