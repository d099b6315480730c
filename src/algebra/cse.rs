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

use super::{AlgebraError, Expr, ExprKind, Symbol, TemporaryPoolExhaustedSnafu};
use num::One;
use snafu::ensure;
use std::collections::{HashMap, HashSet};

/// Issues the temporaries of one simplification, named `<prefix><index>`, up to a fixed capacity.
#[derive(Clone, Debug)]
pub struct TemporaryPool {
    prefix: String,
    capacity: usize,
    issued: usize,
}

impl TemporaryPool {
    pub fn new<S: Into<String>>(prefix: S, capacity: usize) -> Self {
        Self {
            prefix: prefix.into(),
            capacity,
            issued: 0,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn next_symbol(&mut self) -> Result<Symbol, AlgebraError> {
        ensure!(
            self.issued < self.capacity,
            TemporaryPoolExhaustedSnafu {
                prefix: self.prefix.clone(),
                capacity: self.capacity,
            }
        );
        let symbol = Symbol::new(format!("{}{}", self.prefix, self.issued));
        self.issued += 1;
        Ok(symbol)
    }
}

/// The result of a common subexpression elimination: the temporaries in dependency order, each
/// only referencing symbols and previously defined temporaries, and the reduced expressions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimplifiedSet {
    pub replacements: Vec<(Symbol, Expr)>,
    pub reduced: Vec<Expr>,
}

impl SimplifiedSet {
    /// Substitutes every temporary back, which yields the expressions given to [`cse`].
    pub fn expand(&self) -> Vec<Expr> {
        let mut definitions: HashMap<Symbol, Expr> = HashMap::new();
        for (temp, expr) in &self.replacements {
            let expanded = expr.subs(&definitions);
            definitions.insert(temp.clone(), expanded);
        }
        self.reduced
            .iter()
            .map(|expr| expr.subs(&definitions))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.reduced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reduced.is_empty()
    }
}

/// Atoms and negated atoms are cheaper to repeat than to name.
fn is_extractable(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Num(_) | ExprKind::Sym(_) | ExprKind::Pi => false,
        ExprKind::Mul(args) => !(args.len() == 2
            && args[0].as_number().map_or(false, |c| (-c).is_one())
            && args[1].is_atom()),
        _ => true,
    }
}

struct Eliminator<'a> {
    repeated: HashSet<Expr>,
    memo: HashMap<Expr, Expr>,
    replacements: Vec<(Symbol, Expr)>,
    pool: &'a mut TemporaryPool,
}

impl<'a> Eliminator<'a> {
    fn rebuild(&mut self, expr: &Expr) -> Result<Expr, AlgebraError> {
        if expr.is_atom() {
            return Ok(expr.clone());
        }
        if let Some(done) = self.memo.get(expr) {
            return Ok(done.clone());
        }

        let mut children = Vec::with_capacity(expr.children().len());
        for child in expr.children() {
            children.push(self.rebuild(child)?);
        }
        let rebuilt = expr.with_children(children);

        let out = if self.repeated.contains(expr) {
            let temp = self.pool.next_symbol()?;
            trace!("{temp} = {rebuilt}");
            self.replacements.push((temp.clone(), rebuilt));
            temp.expr()
        } else {
            rebuilt
        };
        self.memo.insert(expr.clone(), out.clone());
        Ok(out)
    }
}

fn find_repeated(expr: &Expr, seen: &mut HashSet<Expr>, repeated: &mut HashSet<Expr>) {
    if !is_extractable(expr) {
        return;
    }
    if seen.contains(expr) {
        repeated.insert(expr.clone());
        return;
    }
    seen.insert(expr.clone());
    for child in expr.children() {
        find_repeated(child, seen, repeated);
    }
}

/// Common subexpression elimination over a batch of expressions.
///
/// Every non-atomic subexpression which occurs more than once across the batch is assigned a
/// temporary from `pool`. Temporaries are numbered in dependency order.
pub fn cse(exprs: &[Expr], pool: &mut TemporaryPool) -> Result<SimplifiedSet, AlgebraError> {
    let mut seen = HashSet::new();
    let mut repeated = HashSet::new();
    for expr in exprs {
        find_repeated(expr, &mut seen, &mut repeated);
    }

    let mut elim = Eliminator {
        repeated,
        memo: HashMap::new(),
        replacements: Vec::new(),
        pool,
    };
    let mut reduced = Vec::with_capacity(exprs.len());
    for expr in exprs {
        reduced.push(elim.rebuild(expr)?);
    }

    debug!(
        "cse `{}`: {} expressions, {} temporaries",
        elim.pool.prefix(),
        exprs.len(),
        elim.replacements.len()
    );

    Ok(SimplifiedSet {
        replacements: elim.replacements,
        reduced,
    })
}
