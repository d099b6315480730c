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

use num::rational::Ratio;
use num::{One, Signed, ToPrimitive, Zero};
use snafu::prelude::*;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Common subexpression elimination over batches of expressions.
pub mod cse;
/// Symbolic differentiation and Jacobians.
pub mod diff;
/// Symbolic matrices backed by nalgebra's dynamic matrices.
pub mod matrix;
mod ops;
/// Substitution, free symbols and numeric evaluation.
pub mod subs;

pub use cse::{cse, SimplifiedSet, TemporaryPool};
pub use diff::{derivative, jacobian};
pub use matrix::SymMatrix;

/// Exact coefficients and exponents are kept as rationals so that folding never loses precision.
pub type Rational = Ratio<i64>;

#[derive(Debug, PartialEq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AlgebraError {
    #[snafu(display("no value bound to symbol `{name}`"))]
    UnboundSymbol { name: String },
    #[snafu(display("temporary pool `{prefix}` exhausted after {capacity} temporaries"))]
    TemporaryPoolExhausted { prefix: String, capacity: usize },
    #[snafu(display("{action} on incompatible shapes {left:?} and {right:?}"))]
    DimensionMismatch {
        action: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// A named real valued unknown. Two symbols are the same unknown if and only if they have the same name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    name: Rc<str>,
}

impl Symbol {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: Rc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns this symbol as an expression leaf.
    pub fn expr(&self) -> Expr {
        Expr::from_kind(ExprKind::Sym(self.clone()))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Elementary functions supported by the differentiation rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Atan,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Atan => "atan",
        }
    }
}

/// The node kinds of the expression graph.
///
/// Sums and products are n-ary and always canonical: flattened, numerically folded,
/// collected and sorted. A numeric coefficient of a product is always its first argument.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Num(Rational),
    Sym(Symbol),
    Pi,
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Expr, Rational),
    Func(Func, Expr),
}

#[derive(Debug)]
struct Node {
    kind: ExprKind,
    hash: u64,
}

/// An immutable, reference counted symbolic expression.
///
/// Subexpressions are shared between parents, so the expressions of a derivation form a directed
/// acyclic graph. Every constructor canonicalizes its result, which makes structural equality a
/// sound (if incomplete) test of algebraic equality and lets equal subexpressions be detected by hashing.
#[derive(Clone)]
pub struct Expr(Rc<Node>);

impl Expr {
    fn from_kind(kind: ExprKind) -> Self {
        let mut hasher = DefaultHasher::new();
        match &kind {
            ExprKind::Num(r) => {
                0_u8.hash(&mut hasher);
                r.hash(&mut hasher);
            }
            ExprKind::Sym(s) => {
                1_u8.hash(&mut hasher);
                s.name().hash(&mut hasher);
            }
            ExprKind::Pi => 2_u8.hash(&mut hasher),
            ExprKind::Add(args) => {
                3_u8.hash(&mut hasher);
                for arg in args {
                    arg.0.hash.hash(&mut hasher);
                }
            }
            ExprKind::Mul(args) => {
                4_u8.hash(&mut hasher);
                for arg in args {
                    arg.0.hash.hash(&mut hasher);
                }
            }
            ExprKind::Pow(base, exp) => {
                5_u8.hash(&mut hasher);
                base.0.hash.hash(&mut hasher);
                exp.hash(&mut hasher);
            }
            ExprKind::Func(func, arg) => {
                6_u8.hash(&mut hasher);
                func.hash(&mut hasher);
                arg.0.hash.hash(&mut hasher);
            }
        }
        let hash = hasher.finish();
        Self(Rc::new(Node { kind, hash }))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn number(value: Rational) -> Self {
        Self::from_kind(ExprKind::Num(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::number(Rational::from_integer(value))
    }

    /// Builds the exact rational `numer / denom`.
    pub fn rational(numer: i64, denom: i64) -> Self {
        Self::number(Rational::new(numer, denom))
    }

    pub fn zero() -> Self {
        Self::integer(0)
    }

    pub fn one() -> Self {
        Self::integer(1)
    }

    pub fn pi() -> Self {
        Self::from_kind(ExprKind::Pi)
    }

    pub fn as_number(&self) -> Option<Rational> {
        match self.kind() {
            ExprKind::Num(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self.kind() {
            ExprKind::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_number().map_or(false, |r| r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        self.as_number().map_or(false, |r| r.is_one())
    }

    /// Numbers, symbols and constants.
    pub fn is_atom(&self) -> bool {
        matches!(self.kind(), ExprKind::Num(_) | ExprKind::Sym(_) | ExprKind::Pi)
    }

    /// The direct arguments of this node, empty for atoms.
    pub fn children(&self) -> &[Expr] {
        match self.kind() {
            ExprKind::Add(args) | ExprKind::Mul(args) => args.as_slice(),
            ExprKind::Pow(base, _) => std::slice::from_ref(base),
            ExprKind::Func(_, arg) => std::slice::from_ref(arg),
            _ => &[],
        }
    }

    /// Rebuilds this node from new arguments through the canonical constructors.
    /// The arguments must be given in the order of [`Expr::children`].
    pub fn with_children(&self, children: Vec<Expr>) -> Self {
        match self.kind() {
            ExprKind::Add(_) => Self::sum(children),
            ExprKind::Mul(_) => Self::product(children),
            ExprKind::Pow(_, exp) => match children.into_iter().next() {
                Some(base) => base.pow(*exp),
                None => self.clone(),
            },
            ExprKind::Func(func, _) => match children.into_iter().next() {
                Some(arg) => Self::func(*func, arg),
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Canonical n-ary sum.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Self {
        let mut constant = Rational::zero();
        let mut collected: BTreeMap<Expr, Rational> = BTreeMap::new();
        let mut pending: Vec<Expr> = terms.into_iter().collect();

        while let Some(term) = pending.pop() {
            match term.kind() {
                ExprKind::Num(r) => constant += *r,
                ExprKind::Add(args) => pending.extend(args.iter().cloned()),
                _ => {
                    let (coeff, body) = term.split_coefficient();
                    *collected.entry(body).or_insert_with(Rational::zero) += coeff;
                }
            }
        }

        let mut args: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, coeff)| !coeff.is_zero())
            .map(|(body, coeff)| Self::scaled(coeff, body))
            .collect();
        if !constant.is_zero() {
            args.push(Self::number(constant));
        }

        match args.len() {
            0 => Self::zero(),
            1 => args.remove(0),
            _ => {
                args.sort();
                Self::from_kind(ExprKind::Add(args))
            }
        }
    }

    /// Canonical n-ary product.
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Self {
        let mut coeff = Rational::one();
        let mut powers: BTreeMap<Expr, Rational> = BTreeMap::new();
        let mut pending: Vec<Expr> = factors.into_iter().collect();

        while let Some(factor) = pending.pop() {
            match factor.kind() {
                ExprKind::Num(r) => {
                    if r.is_zero() {
                        return Self::zero();
                    }
                    coeff *= *r;
                }
                ExprKind::Mul(args) => pending.extend(args.iter().cloned()),
                ExprKind::Pow(base, exp) => {
                    *powers.entry(base.clone()).or_insert_with(Rational::zero) += *exp;
                }
                _ => *powers.entry(factor.clone()).or_insert_with(Rational::zero) += 1,
            }
        }

        let mut args = Vec::with_capacity(powers.len() + 1);
        let mut needs_merge = false;
        for (base, exp) in powers {
            if exp.is_zero() {
                continue;
            }
            let factor = base.pow(exp);
            if matches!(factor.kind(), ExprKind::Num(_) | ExprKind::Mul(_)) {
                needs_merge = true;
            }
            args.push(factor);
        }

        if needs_merge {
            // A power collapsed into a number or a product, which must be folded again.
            args.push(Self::number(coeff));
            return Self::product(args);
        }

        if args.is_empty() {
            return Self::number(coeff);
        }
        if args.len() == 1 && coeff.is_one() {
            return args.remove(0);
        }
        if !coeff.is_one() {
            args.push(Self::number(coeff));
        }
        args.sort();
        Self::from_kind(ExprKind::Mul(args))
    }

    /// Raises this expression to a rational power.
    ///
    /// Integer powers of powers and of products are distributed; fractional powers are kept as is
    /// since the underlying quantities are real and no sign information is available.
    pub fn pow(&self, exp: Rational) -> Self {
        if exp.is_zero() {
            return Self::one();
        }
        if exp.is_one() {
            return self.clone();
        }
        match self.kind() {
            ExprKind::Num(r) if exp.is_integer() && !(r.is_zero() && exp.is_negative()) => {
                match exp.to_integer().to_i32() {
                    Some(n) => Self::number(r.pow(n)),
                    None => Self::from_kind(ExprKind::Pow(self.clone(), exp)),
                }
            }
            ExprKind::Pow(base, inner) if exp.is_integer() => base.pow(inner * exp),
            ExprKind::Mul(args) if exp.is_integer() => {
                Self::product(args.iter().map(|arg| arg.pow(exp)).collect::<Vec<_>>())
            }
            _ => Self::from_kind(ExprKind::Pow(self.clone(), exp)),
        }
    }

    pub fn powi(&self, exp: i64) -> Self {
        self.pow(Rational::from_integer(exp))
    }

    pub fn sqrt(&self) -> Self {
        self.pow(Rational::new(1, 2))
    }

    pub fn recip(&self) -> Self {
        self.powi(-1)
    }

    pub fn func(func: Func, arg: Expr) -> Self {
        if arg.is_zero() {
            return match func {
                Func::Sin | Func::Atan => Self::zero(),
                Func::Cos => Self::one(),
            };
        }
        Self::from_kind(ExprKind::Func(func, arg))
    }

    pub fn sin(&self) -> Self {
        Self::func(Func::Sin, self.clone())
    }

    pub fn cos(&self) -> Self {
        Self::func(Func::Cos, self.clone())
    }

    pub fn atan(&self) -> Self {
        Self::func(Func::Atan, self.clone())
    }

    /// Splits a term into its numeric coefficient and the remaining body, e.g. `-2*x*y` into `(-2, x*y)`.
    pub fn split_coefficient(&self) -> (Rational, Expr) {
        match self.kind() {
            ExprKind::Num(r) => (*r, Self::one()),
            ExprKind::Mul(args) => match args[0].as_number() {
                Some(coeff) => {
                    let body = if args.len() == 2 {
                        args[1].clone()
                    } else {
                        Self::from_kind(ExprKind::Mul(args[1..].to_vec()))
                    };
                    (coeff, body)
                }
                None => (Rational::one(), self.clone()),
            },
            _ => (Rational::one(), self.clone()),
        }
    }

    /// Inverse of `split_coefficient` for a body which carries no coefficient.
    fn scaled(coeff: Rational, body: Expr) -> Self {
        if coeff.is_one() {
            return body;
        }
        match body.kind() {
            ExprKind::Mul(args) => {
                let mut scaled = Vec::with_capacity(args.len() + 1);
                scaled.push(Self::number(coeff));
                scaled.extend(args.iter().cloned());
                Self::from_kind(ExprKind::Mul(scaled))
            }
            ExprKind::Num(r) => Self::number(coeff * r),
            _ => Self::from_kind(ExprKind::Mul(vec![Self::number(coeff), body])),
        }
    }

    /// Returns true if the numeric coefficient of this term is negative.
    pub fn is_negative_term(&self) -> bool {
        self.split_coefficient().0.is_negative()
    }

    /// Number of distinct nodes in this expression graph.
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(expr) = pending.pop() {
            if seen.insert(expr.clone()) {
                pending.extend(expr.children().iter().cloned());
            }
        }
        seen.len()
    }

    fn rank(&self) -> u8 {
        match self.kind() {
            ExprKind::Num(_) => 0,
            ExprKind::Sym(_) => 1,
            ExprKind::Pi => 2,
            ExprKind::Pow(..) => 3,
            ExprKind::Func(..) => 4,
            ExprKind::Mul(_) => 5,
            ExprKind::Add(_) => 6,
        }
    }

    fn structural_cmp(&self, other: &Self) -> Ordering {
        match (self.kind(), other.kind()) {
            (ExprKind::Add(a), ExprKind::Add(b)) | (ExprKind::Mul(a), ExprKind::Mul(b)) => a.cmp(b),
            (ExprKind::Pow(b1, e1), ExprKind::Pow(b2, e2)) => b1.cmp(b2).then_with(|| e1.cmp(e2)),
            (ExprKind::Func(f1, a1), ExprKind::Func(f2, a2)) => {
                f1.cmp(f2).then_with(|| a1.cmp(a2))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || (self.0.hash == other.0.hash && self.0.kind == other.0.kind)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl Ord for Expr {
    /// Atoms sort first, by value or by name, so that printed products read naturally.
    /// Composite nodes are ordered by kind and then by their cached structural hash.
    fn cmp(&self, other: &Self) -> Ordering {
        if Rc::ptr_eq(&self.0, &other.0) {
            return Ordering::Equal;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Num(a), ExprKind::Num(b)) => a.cmp(b),
            (ExprKind::Sym(a), ExprKind::Sym(b)) => a.cmp(b),
            (ExprKind::Pi, ExprKind::Pi) => Ordering::Equal,
            _ => self
                .rank()
                .cmp(&other.rank())
                .then_with(|| self.0.hash.cmp(&other.0.hash))
                .then_with(|| self.structural_cmp(other)),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            ExprKind::Num(r) => {
                if r.is_integer() {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "({}/{})", r.numer(), r.denom())
                }
            }
            ExprKind::Sym(s) => write!(f, "{s}"),
            ExprKind::Pi => write!(f, "pi"),
            ExprKind::Add(args) => {
                let terms: Vec<String> = args.iter().map(|arg| format!("{arg}")).collect();
                write!(f, "({})", terms.join(" + "))
            }
            ExprKind::Mul(args) => {
                let factors: Vec<String> = args.iter().map(|arg| format!("{arg}")).collect();
                write!(f, "{}", factors.join("*"))
            }
            ExprKind::Pow(base, exp) => {
                if exp.is_integer() {
                    write!(f, "{base}^{}", exp.numer())
                } else {
                    write!(f, "{base}^({}/{})", exp.numer(), exp.denom())
                }
            }
            ExprKind::Func(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        symbol.expr()
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        symbol.expr()
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<Rational> for Expr {
    fn from(value: Rational) -> Self {
        Self::number(value)
    }
}
