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

use super::{AlgebraError, DimensionMismatchSnafu, Expr, Symbol};
use nalgebra::DMatrix;
use snafu::ensure;

/// A dense matrix of symbolic expressions.
///
/// nalgebra only requires `Clone + PartialEq + Debug` of its scalars for storage, indexing and
/// transposition. Products are computed here instead of through nalgebra's numeric kernels so that
/// each entry is built as a single canonical sum with all structurally zero terms skipped.
pub type SymMatrix = DMatrix<Expr>;

pub fn zeros(nrows: usize, ncols: usize) -> SymMatrix {
    SymMatrix::from_element(nrows, ncols, Expr::zero())
}

/// Builds a column vector.
pub fn column<I: IntoIterator<Item = Expr>>(entries: I) -> SymMatrix {
    let entries: Vec<Expr> = entries.into_iter().collect();
    SymMatrix::from_vec(entries.len(), 1, entries)
}

/// Builds a square diagonal matrix, all off-diagonal entries being exactly zero.
pub fn diag(entries: &[Expr]) -> SymMatrix {
    let mut mat = zeros(entries.len(), entries.len());
    for (i, entry) in entries.iter().enumerate() {
        mat[(i, i)] = entry.clone();
    }
    mat
}

/// Builds a matrix of fresh symbols named `name(i,j)`.
pub fn symbol_matrix<F>(nrows: usize, ncols: usize, mut make: F) -> SymMatrix
where
    F: FnMut(usize, usize) -> Symbol,
{
    SymMatrix::from_fn(nrows, ncols, |i, j| make(i, j).expr())
}

pub fn matmul(lhs: &SymMatrix, rhs: &SymMatrix) -> Result<SymMatrix, AlgebraError> {
    ensure!(
        lhs.ncols() == rhs.nrows(),
        DimensionMismatchSnafu {
            action: "matrix product",
            left: lhs.shape(),
            right: rhs.shape(),
        }
    );

    let mut prod = zeros(lhs.nrows(), rhs.ncols());
    for i in 0..lhs.nrows() {
        for j in 0..rhs.ncols() {
            let terms: Vec<Expr> = (0..lhs.ncols())
                .filter(|&k| !lhs[(i, k)].is_zero() && !rhs[(k, j)].is_zero())
                .map(|k| &lhs[(i, k)] * &rhs[(k, j)])
                .collect();
            prod[(i, j)] = Expr::sum(terms);
        }
    }
    Ok(prod)
}

/// Product of a matrix with a vector given as a slice, zero terms skipped.
pub fn mat_vec(mat: &SymMatrix, vec: &[Expr]) -> Result<Vec<Expr>, AlgebraError> {
    ensure!(
        mat.ncols() == vec.len(),
        DimensionMismatchSnafu {
            action: "matrix vector product",
            left: mat.shape(),
            right: (vec.len(), 1),
        }
    );
    Ok((0..mat.nrows())
        .map(|i| {
            Expr::sum(
                vec.iter()
                    .enumerate()
                    .filter(|(k, v)| !mat[(i, *k)].is_zero() && !v.is_zero())
                    .map(|(k, v)| &mat[(i, k)] * v),
            )
        })
        .collect())
}

pub fn add(lhs: &SymMatrix, rhs: &SymMatrix) -> Result<SymMatrix, AlgebraError> {
    ensure!(
        lhs.shape() == rhs.shape(),
        DimensionMismatchSnafu {
            action: "matrix sum",
            left: lhs.shape(),
            right: rhs.shape(),
        }
    );
    Ok(SymMatrix::from_fn(lhs.nrows(), lhs.ncols(), |i, j| {
        &lhs[(i, j)] + &rhs[(i, j)]
    }))
}

/// Multiplies every entry by `factor`.
pub fn scale(mat: &SymMatrix, factor: &Expr) -> SymMatrix {
    mat.map(|entry| entry * factor)
}

/// Stacks blocks vertically, all blocks must have the same number of columns.
pub fn vstack(blocks: &[SymMatrix]) -> Result<SymMatrix, AlgebraError> {
    let ncols = blocks.first().map_or(0, |b| b.ncols());
    let mut rows = 0;
    for block in blocks {
        ensure!(
            block.ncols() == ncols,
            DimensionMismatchSnafu {
                action: "vertical stack",
                left: (rows, ncols),
                right: block.shape(),
            }
        );
        rows += block.nrows();
    }

    let mut stacked = zeros(rows, ncols);
    let mut offset = 0;
    for block in blocks {
        for i in 0..block.nrows() {
            for j in 0..ncols {
                stacked[(offset + i, j)] = block[(i, j)].clone();
            }
        }
        offset += block.nrows();
    }
    Ok(stacked)
}

/// Entries in row major order.
pub fn row_major(mat: &SymMatrix) -> Vec<Expr> {
    let mut entries = Vec::with_capacity(mat.len());
    for i in 0..mat.nrows() {
        for j in 0..mat.ncols() {
            entries.push(mat[(i, j)].clone());
        }
    }
    entries
}
