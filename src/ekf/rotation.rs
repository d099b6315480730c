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

/// Rotation matrix equivalent to the quaternion `q` = [q0, q1, q2, q3] (scalar first), rotating
/// from the frame the quaternion is defined in (body) to its reference frame (earth).
///
/// The quaternion is assumed to have unit norm, no normalization is applied.
pub fn quat2rot(q: &[Expr; 4]) -> SymMatrix {
    let [q0, q1, q2, q3] = q;
    let two = Expr::integer(2);
    let sq = |e: &Expr| e.powi(2);

    SymMatrix::from_row_slice(
        3,
        3,
        &[
            sq(q0) + sq(q1) - sq(q2) - sq(q3),
            &two * (q1 * q2 - q0 * q3),
            &two * (q1 * q3 + q0 * q2),
            &two * (q1 * q2 + q0 * q3),
            sq(q0) - sq(q1) + sq(q2) - sq(q3),
            &two * (q2 * q3 - q0 * q1),
            &two * (q1 * q3 - q0 * q2),
            &two * (q2 * q3 + q0 * q1),
            sq(q0) - sq(q1) - sq(q2) + sq(q3),
        ],
    )
}

/// Hamilton product `p ⊗ q`.
pub fn quat_mult(p: &[Expr; 4], q: &[Expr; 4]) -> [Expr; 4] {
    [
        &p[0] * &q[0] - &p[1] * &q[1] - &p[2] * &q[2] - &p[3] * &q[3],
        &p[0] * &q[1] + &p[1] * &q[0] + &p[2] * &q[3] - &p[3] * &q[2],
        &p[0] * &q[2] - &p[1] * &q[3] + &p[2] * &q[0] + &p[3] * &q[1],
        &p[0] * &q[3] + &p[1] * &q[2] - &p[2] * &q[1] + &p[3] * &q[0],
    ]
}
