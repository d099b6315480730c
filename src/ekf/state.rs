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

use crate::algebra::matrix::diag;
use crate::algebra::{Expr, SymMatrix, Symbol};
use crate::context::DerivationContext;
use enum_iterator::{all, Sequence};
use std::fmt;

/// Number of states of the filter.
pub const STATE_SIZE: usize = 24;
/// Number of inputs: the delta angles and the delta velocities of one IMU sample.
pub const INPUT_SIZE: usize = 6;

/// The semantic blocks of the state vector, in state order.
///
/// The order is relied upon by every generated Jacobian and gain: reordering invalidates all the
/// generated code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Sequence)]
pub enum StateBlock {
    /// Attitude quaternion, scalar first
    Quaternion,
    /// NED velocity
    Velocity,
    /// NED position
    Position,
    /// Delta angle bias
    GyroBias,
    /// Delta velocity bias
    AccelBias,
    /// Earth magnetic field, NED
    EarthMagField,
    /// Magnetometer bias, body frame
    MagBias,
    /// Horizontal wind, NE
    Wind,
}

impl StateBlock {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            StateBlock::Quaternion => &["q0", "q1", "q2", "q3"],
            StateBlock::Velocity => &["vn", "ve", "vd"],
            StateBlock::Position => &["pn", "pe", "pd"],
            StateBlock::GyroBias => &["dax_b", "day_b", "daz_b"],
            StateBlock::AccelBias => &["dvx_b", "dvy_b", "dvz_b"],
            StateBlock::EarthMagField => &["magN", "magE", "magD"],
            StateBlock::MagBias => &["ibx", "iby", "ibz"],
            StateBlock::Wind => &["vwn", "vwe"],
        }
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Index of the first state of this block.
    pub fn offset(&self) -> usize {
        all::<StateBlock>()
            .take_while(|block| block != self)
            .map(|block| block.len())
            .sum()
    }
}

impl fmt::Display for StateBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}[{}..{}]", self, self.offset(), self.offset() + self.len())
    }
}

/// The 24 state symbols, in block order.
#[derive(Clone, Debug)]
pub struct StateVector {
    symbols: Vec<Symbol>,
}

impl StateVector {
    pub fn new(ctx: &mut DerivationContext) -> Self {
        let symbols = all::<StateBlock>()
            .flat_map(|block| block.names().iter())
            .map(|name| ctx.create_symbol(name))
            .collect();
        Self { symbols }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn exprs(&self) -> Vec<Expr> {
        self.symbols.iter().map(Symbol::expr).collect()
    }

    pub fn block(&self, block: StateBlock) -> Vec<Expr> {
        self.symbols[block.offset()..block.offset() + block.len()]
            .iter()
            .map(Symbol::expr)
            .collect()
    }

    fn fixed<const N: usize>(&self, block: StateBlock) -> [Expr; N] {
        let offset = block.offset();
        std::array::from_fn(|i| self.symbols[offset + i].expr())
    }

    pub fn quaternion(&self) -> [Expr; 4] {
        self.fixed(StateBlock::Quaternion)
    }

    pub fn velocity(&self) -> [Expr; 3] {
        self.fixed(StateBlock::Velocity)
    }

    pub fn position(&self) -> [Expr; 3] {
        self.fixed(StateBlock::Position)
    }

    pub fn gyro_bias(&self) -> [Expr; 3] {
        self.fixed(StateBlock::GyroBias)
    }

    pub fn accel_bias(&self) -> [Expr; 3] {
        self.fixed(StateBlock::AccelBias)
    }

    pub fn mag_field(&self) -> [Expr; 3] {
        self.fixed(StateBlock::EarthMagField)
    }

    pub fn mag_bias(&self) -> [Expr; 3] {
        self.fixed(StateBlock::MagBias)
    }

    pub fn wind(&self) -> [Expr; 2] {
        self.fixed(StateBlock::Wind)
    }
}

/// Integrated IMU measurements of one sample interval.
#[derive(Clone, Debug)]
pub struct Inputs {
    symbols: Vec<Symbol>,
}

impl Inputs {
    pub fn new(ctx: &mut DerivationContext) -> Self {
        Self {
            symbols: ctx.create_symbols(&["dax", "day", "daz", "dvx", "dvy", "dvz"]),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn delta_angle(&self) -> [Expr; 3] {
        std::array::from_fn(|i| self.symbols[i].expr())
    }

    pub fn delta_velocity(&self) -> [Expr; 3] {
        std::array::from_fn(|i| self.symbols[3 + i].expr())
    }
}

/// Variances of the inputs, assumed uncorrelated.
#[derive(Clone, Debug)]
pub struct InputNoise {
    variances: Vec<Symbol>,
}

impl InputNoise {
    pub fn new(ctx: &mut DerivationContext) -> Self {
        Self {
            variances: ctx.create_symbols(&[
                "daxVar", "dayVar", "dazVar", "dvxVar", "dvyVar", "dvzVar",
            ]),
        }
    }

    /// The 6x6 input noise covariance, zero off the diagonal.
    pub fn matrix(&self) -> SymMatrix {
        let entries: Vec<Expr> = self.variances.iter().map(Symbol::expr).collect();
        diag(&entries)
    }
}
