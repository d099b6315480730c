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

/// Builds a `dim` x `dim` symmetric covariance matrix.
///
/// Only the upper triangle holds independent symbols, named `P(i,j)` with `i <= j`. Each lower
/// triangle entry is the very same symbol as its mirror entry, so the matrix is exactly symmetric
/// before any algebra is performed on it.
pub fn create_symmetric_cov_matrix(ctx: &mut DerivationContext, dim: usize) -> SymMatrix {
    let mut cov = SymMatrix::from_element(dim, dim, Expr::zero());
    for i in 0..dim {
        for j in i..dim {
            let entry = ctx.create_symbol(&format!("P({i},{j})")).expr();
            if i != j {
                cov[(j, i)] = entry.clone();
            }
            cov[(i, j)] = entry;
        }
    }
    cov
}

/// Zeros every entry below the diagonal: only the upper triangle is carried by the filter.
pub fn zero_lower_triangle(mat: &mut SymMatrix) {
    for j in 0..mat.ncols() {
        for i in (j + 1)..mat.nrows() {
            mat[(i, j)] = Expr::zero();
        }
    }
}

pub fn is_symmetric(mat: &SymMatrix) -> bool {
    mat.is_square()
        && (0..mat.nrows()).all(|i| (0..i).all(|j| mat[(i, j)] == mat[(j, i)]))
}

pub fn is_upper_triangular(mat: &SymMatrix) -> bool {
    (0..mat.nrows()).all(|i| (0..i.min(mat.ncols())).all(|j| mat[(i, j)].is_zero()))
}
