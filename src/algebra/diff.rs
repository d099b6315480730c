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

use super::matrix::SymMatrix;
use super::{Expr, ExprKind, Func, Rational, Symbol};
use num::One;
use std::collections::HashMap;

/// Differentiates expressions with respect to a single symbol, memoizing every node so that a
/// subgraph shared by several parents (or several outputs) is only differentiated once.
pub struct Differentiator<'a> {
    var: &'a Symbol,
    memo: HashMap<Expr, Expr>,
}

impl<'a> Differentiator<'a> {
    pub fn new(var: &'a Symbol) -> Self {
        Self {
            var,
            memo: HashMap::new(),
        }
    }

    pub fn diff(&mut self, expr: &Expr) -> Expr {
        match expr.kind() {
            ExprKind::Num(_) | ExprKind::Pi => return Expr::zero(),
            ExprKind::Sym(s) => {
                return if s == self.var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            _ => {}
        }

        if let Some(known) = self.memo.get(expr) {
            return known.clone();
        }

        let derivative = match expr.kind() {
            ExprKind::Add(args) => {
                let terms: Vec<Expr> = args.iter().map(|arg| self.diff(arg)).collect();
                Expr::sum(terms)
            }
            ExprKind::Mul(args) => {
                let mut terms = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    let darg = self.diff(arg);
                    if darg.is_zero() {
                        continue;
                    }
                    let mut factors: Vec<Expr> = args
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, other)| other.clone())
                        .collect();
                    factors.push(darg);
                    terms.push(Expr::product(factors));
                }
                Expr::sum(terms)
            }
            ExprKind::Pow(base, exp) => {
                let dbase = self.diff(base);
                if dbase.is_zero() {
                    Expr::zero()
                } else {
                    Expr::product([
                        Expr::number(*exp),
                        base.pow(exp - Rational::one()),
                        dbase,
                    ])
                }
            }
            ExprKind::Func(func, arg) => {
                let darg = self.diff(arg);
                if darg.is_zero() {
                    Expr::zero()
                } else {
                    match func {
                        Func::Sin => arg.cos() * darg,
                        Func::Cos => -(arg.sin() * darg),
                        Func::Atan => darg / (Expr::one() + arg.powi(2)),
                    }
                }
            }
            ExprKind::Num(_) | ExprKind::Sym(_) | ExprKind::Pi => unreachable!(),
        };

        self.memo.insert(expr.clone(), derivative.clone());
        derivative
    }
}

/// Returns d(expr)/d(var).
pub fn derivative(expr: &Expr, var: &Symbol) -> Expr {
    Differentiator::new(var).diff(expr)
}

/// Returns the Jacobian of `outputs` with respect to `vars`, i.e. a matrix of `outputs.len()` rows
/// and `vars.len()` columns.
pub fn jacobian(outputs: &[Expr], vars: &[Symbol]) -> SymMatrix {
    let mut jac = SymMatrix::from_element(outputs.len(), vars.len(), Expr::zero());
    for (j, var) in vars.iter().enumerate() {
        let mut diff = Differentiator::new(var);
        for (i, output) in outputs.iter().enumerate() {
            jac[(i, j)] = diff.diff(output);
        }
    }
    jac
}
