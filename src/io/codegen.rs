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

use crate::algebra::matrix::column;
use crate::algebra::{Expr, ExprKind, Func, Rational, SimplifiedSet, SymMatrix, Symbol};
use crate::ekf::STATE_SIZE;
use crate::observation::DerivedSection;
use num::{One, Signed};
use snafu::prelude::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EmitError {
    #[snafu(display("could not write {artifact}: {source}"))]
    ArtifactIo { artifact: String, source: io::Error },
    #[snafu(display("{artifact} expects {expected} fused expressions but got {got}"))]
    Layout {
        artifact: String,
        expected: usize,
        got: usize,
    },
}

impl PartialEq for EmitError {
    /// No two emission errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

/// Names of the arrays the filter update code expects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockNames {
    pub jacobian: &'static str,
    pub gain: &'static str,
    /// Whether each block is preceded by its comment label
    pub labelled: bool,
}

impl BlockNames {
    pub const FUSION: Self = Self {
        jacobian: "Hfusion",
        gain: "Kfusion",
        labelled: true,
    };

    pub const fn jacobian_only(jacobian: &'static str) -> Self {
        Self {
            jacobian,
            gain: "",
            labelled: false,
        }
    }

    pub const fn compact(jacobian: &'static str, gain: &'static str) -> Self {
        Self {
            jacobian,
            gain,
            labelled: false,
        }
    }
}

/// Writes simplified expressions as C assignments, in the layout the filter update code includes.
pub struct CodeGenerator<W: Write> {
    artifact: String,
    writer: W,
}

impl CodeGenerator<BufWriter<File>> {
    /// Creates (or truncates) the artifact at the provided path.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, EmitError> {
        let artifact = path.as_ref().display().to_string();
        let file = File::create(path.as_ref()).context(ArtifactIoSnafu {
            artifact: artifact.clone(),
        })?;
        Ok(Self {
            artifact,
            writer: BufWriter::new(file),
        })
    }
}

impl<W: Write> CodeGenerator<W> {
    pub fn from_writer<S: Into<String>>(artifact: S, writer: W) -> Self {
        Self {
            artifact: artifact.into(),
            writer,
        }
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    fn write_raw(&mut self, text: &str) -> Result<(), EmitError> {
        self.writer
            .write_all(text.as_bytes())
            .context(ArtifactIoSnafu {
                artifact: self.artifact.clone(),
            })
    }

    /// Writes a comment line.
    pub fn print_string(&mut self, text: &str) -> Result<(), EmitError> {
        self.write_raw(&format!("// {text}\n"))
    }

    /// Writes each temporary as a constant, in dependency order.
    pub fn write_subexpressions(&mut self, replacements: &[(Symbol, Expr)]) -> Result<(), EmitError> {
        let mut text = String::new();
        for (symbol, expr) in replacements {
            text.push_str(&format!("const float {symbol} = {};\n", ccode(expr)));
        }
        text.push_str("\n\n");
        self.write_raw(&text)
    }

    /// Writes every entry of a matrix, column by column, skipping the lower triangle if the matrix
    /// is symmetric. Vectors are indexed with a single index and a 1x1 matrix is a plain scalar.
    pub fn write_matrix(
        &mut self,
        mat: &SymMatrix,
        identifier: &str,
        symmetric: bool,
    ) -> Result<(), EmitError> {
        let mut text = String::new();
        if mat.len() == 1 {
            text.push_str(&format!("{identifier} = {};\n", ccode(&mat[(0, 0)])));
        } else if mat.nrows() == 1 || mat.ncols() == 1 {
            for (i, entry) in mat.iter().enumerate() {
                text.push_str(&format!("{identifier}({i}) = {};\n", ccode(entry)));
            }
        } else {
            for j in 0..mat.ncols() {
                for i in 0..mat.nrows() {
                    if !symmetric || j >= i {
                        text.push_str(&format!(
                            "{identifier}({i},{j}) = {};\n",
                            ccode(&mat[(i, j)])
                        ));
                    }
                }
            }
        }
        text.push_str("\n\n");
        self.write_raw(&text)
    }

    /// Writes the subexpressions then, for each of the `n_obs` axes, its 24 entries long Jacobian
    /// and gain blocks.
    pub fn write_fusion_equations(
        &mut self,
        set: &SimplifiedSet,
        n_obs: usize,
        names: &BlockNames,
    ) -> Result<(), EmitError> {
        if n_obs < 1 {
            return Ok(());
        }
        let stride = 2 * STATE_SIZE;
        ensure!(
            set.reduced.len() == stride * n_obs,
            LayoutSnafu {
                artifact: self.artifact.clone(),
                expected: stride * n_obs,
                got: set.reduced.len()
            }
        );

        if names.labelled {
            self.print_string("Sub Expressions")?;
        }
        self.write_subexpressions(&set.replacements)?;

        for (axis, block) in set.reduced.chunks(stride).enumerate() {
            let suffix = if n_obs > 1 {
                format!(" - axis {axis}")
            } else {
                String::new()
            };
            if names.labelled {
                self.print_string(&format!("Observation Jacobians{suffix}"))?;
            }
            self.write_matrix(
                &column(block[..STATE_SIZE].iter().cloned()),
                names.jacobian,
                false,
            )?;
            if names.labelled {
                self.print_string(&format!("Kalman gains{suffix}"))?;
            }
            self.write_matrix(
                &column(block[STATE_SIZE..].iter().cloned()),
                names.gain,
                false,
            )?;
        }
        Ok(())
    }

    /// Writes one derived section of a sensor artifact, preceded by its heading.
    pub fn write_section(
        &mut self,
        section: &DerivedSection,
        names: &BlockNames,
    ) -> Result<(), EmitError> {
        if let Some(heading) = &section.heading {
            self.print_string(heading)?;
        }
        if section.n_obs == 0 {
            self.write_subexpressions(&section.set.replacements)?;
            self.write_matrix(
                &column(section.set.reduced.iter().cloned()),
                names.jacobian,
                false,
            )
        } else {
            self.write_fusion_equations(&section.set, section.n_obs, names)
        }
    }

    /// Flushes the artifact and returns the underlying writer.
    pub fn close(mut self) -> Result<W, EmitError> {
        self.writer.flush().context(ArtifactIoSnafu {
            artifact: self.artifact.clone(),
        })?;
        Ok(self.writer)
    }
}

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_ATOM: u8 = 3;

/// Prints an expression as single precision C.
pub fn ccode(expr: &Expr) -> String {
    print_prec(expr, 0)
}

fn parenthesize(text: String, prec: u8, parent: u8) -> String {
    if prec < parent {
        format!("({text})")
    } else {
        text
    }
}

/// Integers are printed as is, other rationals as a floating point division.
fn float_literal(value: Rational) -> String {
    if value.is_integer() {
        format!("{}", value.to_integer())
    } else {
        format!("{}.0F/{}.0F", value.numer(), value.denom())
    }
}

fn print_prec(expr: &Expr, parent: u8) -> String {
    match expr.kind() {
        ExprKind::Num(value) => {
            let prec = if value.is_negative() {
                PREC_ADD
            } else if value.is_integer() {
                PREC_ATOM
            } else {
                PREC_MUL
            };
            parenthesize(float_literal(*value), prec, parent)
        }
        ExprKind::Sym(symbol) => symbol.to_string(),
        ExprKind::Pi => "M_PI_F".to_string(),
        ExprKind::Add(terms) => {
            let mut text = print_prec(&terms[0], PREC_ADD);
            for term in &terms[1..] {
                if term.is_negative_term() {
                    text.push_str(" - ");
                    text.push_str(&print_prec(&-term, PREC_MUL));
                } else {
                    text.push_str(" + ");
                    text.push_str(&print_prec(term, PREC_ADD));
                }
            }
            parenthesize(text, PREC_ADD, parent)
        }
        ExprKind::Mul(_) => print_product(expr, parent),
        ExprKind::Pow(_, exp) if exp.is_negative() => print_product(expr, parent),
        ExprKind::Pow(base, exp) => print_power(base, *exp),
        ExprKind::Func(func, arg) => {
            let name = match func {
                Func::Sin => "sinf",
                Func::Cos => "cosf",
                Func::Atan => "atanf",
            };
            format!("{name}({})", print_prec(arg, 0))
        }
    }
}

/// Prints a positive power.
fn print_power(base: &Expr, exp: Rational) -> String {
    if exp == Rational::new(1, 2) {
        format!("sqrtf({})", print_prec(base, 0))
    } else if exp.is_one() {
        print_prec(base, PREC_ATOM)
    } else {
        format!("powf({}, {})", print_prec(base, 0), float_literal(exp))
    }
}

/// Prints a product as a signed fraction, negative powers being moved to the denominator.
fn print_product(expr: &Expr, parent: u8) -> String {
    let (coeff, body) = expr.split_coefficient();
    let factors: Vec<Expr> = match body.kind() {
        ExprKind::Mul(args) => args.clone(),
        _ if body.is_one() => Vec::new(),
        _ => vec![body.clone()],
    };

    let mut numer = Vec::new();
    let mut denom = Vec::new();
    if !coeff.abs().is_one() || factors.is_empty() {
        let magnitude = coeff.abs();
        if magnitude.is_integer() {
            numer.push(float_literal(magnitude));
        } else {
            numer.push(format!("({})", float_literal(magnitude)));
        }
    }
    for factor in &factors {
        match factor.kind() {
            ExprKind::Pow(base, exp) if exp.is_negative() => denom.push(print_power(base, -*exp)),
            _ => numer.push(print_prec(factor, PREC_MUL)),
        }
    }

    let mut text = if numer.is_empty() {
        "1.0F".to_string()
    } else {
        numer.join("*")
    };
    match denom.len() {
        0 => {}
        1 => {
            text.push('/');
            text.push_str(&denom[0]);
        }
        _ => text.push_str(&format!("/({})", denom.join("*"))),
    }
    if coeff.is_negative() {
        text.insert(0, '-');
        parenthesize(text, PREC_ADD, parent)
    } else {
        parenthesize(text, PREC_MUL, parent)
    }
}
