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

use super::{AlgebraError, Expr, ExprKind, Func, Symbol, UnboundSymbolSnafu};
use num::ToPrimitive;
use snafu::OptionExt;
use std::collections::{BTreeSet, HashMap};
use std::f64::consts::PI;

impl Expr {
    /// Replaces every symbol found in `map` and rebuilds the expression canonically.
    pub fn subs(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        let mut memo = HashMap::new();
        self.subs_memo(map, &mut memo)
    }

    fn subs_memo(&self, map: &HashMap<Symbol, Expr>, memo: &mut HashMap<Expr, Expr>) -> Expr {
        match self.kind() {
            ExprKind::Sym(s) => return map.get(s).cloned().unwrap_or_else(|| self.clone()),
            ExprKind::Num(_) | ExprKind::Pi => return self.clone(),
            _ => {}
        }
        if let Some(done) = memo.get(self) {
            return done.clone();
        }
        let children = self
            .children()
            .iter()
            .map(|child| child.subs_memo(map, memo))
            .collect();
        let rebuilt = self.with_children(children);
        memo.insert(self.clone(), rebuilt.clone());
        rebuilt
    }

    /// The set of symbols this expression depends on.
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut symbols = BTreeSet::new();
        let mut visited = std::collections::HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(expr) = pending.pop() {
            if !visited.insert(expr.clone()) {
                continue;
            }
            if let ExprKind::Sym(s) = expr.kind() {
                symbols.insert(s.clone());
            }
            pending.extend(expr.children().iter().cloned());
        }
        symbols
    }

    pub fn depends_on(&self, symbol: &Symbol) -> bool {
        self.free_symbols().contains(symbol)
    }

    /// Evaluates this expression numerically. Every free symbol must be bound in `values`.
    pub fn eval(&self, values: &HashMap<Symbol, f64>) -> Result<f64, AlgebraError> {
        let mut memo = HashMap::new();
        self.eval_memo(values, &mut memo)
    }

    fn eval_memo(
        &self,
        values: &HashMap<Symbol, f64>,
        memo: &mut HashMap<Expr, f64>,
    ) -> Result<f64, AlgebraError> {
        if let Some(val) = memo.get(self) {
            return Ok(*val);
        }
        let val = match self.kind() {
            ExprKind::Num(r) => r.to_f64().unwrap_or(f64::NAN),
            ExprKind::Sym(s) => *values
                .get(s)
                .context(UnboundSymbolSnafu { name: s.name() })?,
            ExprKind::Pi => PI,
            ExprKind::Add(args) => {
                let mut acc = 0.0;
                for arg in args {
                    acc += arg.eval_memo(values, memo)?;
                }
                acc
            }
            ExprKind::Mul(args) => {
                let mut acc = 1.0;
                for arg in args {
                    acc *= arg.eval_memo(values, memo)?;
                }
                acc
            }
            ExprKind::Pow(base, exp) => {
                let base = base.eval_memo(values, memo)?;
                if exp.is_integer() {
                    base.powi(exp.to_integer() as i32)
                } else {
                    base.powf(exp.to_f64().unwrap_or(f64::NAN))
                }
            }
            ExprKind::Func(func, arg) => {
                let arg = arg.eval_memo(values, memo)?;
                match func {
                    Func::Sin => arg.sin(),
                    Func::Cos => arg.cos(),
                    Func::Atan => arg.atan(),
                }
            }
        };
        memo.insert(self.clone(), val);
        Ok(val)
    }
}
