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

use crate::algebra::matrix::{matmul, scale};
use crate::algebra::{cse, jacobian, Expr, SimplifiedSet, SymMatrix, Symbol, TemporaryPool};
use crate::ekf::STATE_SIZE;
use crate::errors::{
    AlgebraSnafu, DerivationError, EmptyObservationSnafu, MissingVarianceSnafu, StateSizeSnafu,
};
use crate::io::PoolConfig;
use serde_derive::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};

/// The observation models of every supported sensor.
pub mod sensors;
pub use sensors::{FusionTarget, PoolKind, Section, Sensor};

/// How the observation Jacobian and Kalman gain are derived for a sensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionStrategy {
    /// Each scalar axis is derived and simplified on its own, no matrix inverse is ever needed.
    Sequential,
    /// The axes are derived the same way but simplified together, sharing subexpressions across
    /// axes at the cost of more working memory in the generated code.
    Batched,
    /// Only the observation Jacobian is derived.
    JacobianOnly,
}

/// The shared inputs of every observation derivation: the state and its covariance.
#[derive(Clone, Debug)]
pub struct FusionProblem<'a> {
    target: &'a str,
    covariance: &'a SymMatrix,
    state: &'a [Symbol],
}

impl<'a> FusionProblem<'a> {
    /// Checks that the state is the full filter state and that the covariance matches it.
    pub fn new(
        target: &'a str,
        covariance: &'a SymMatrix,
        state: &'a [Symbol],
    ) -> Result<Self, DerivationError> {
        ensure!(
            state.len() == STATE_SIZE,
            StateSizeSnafu {
                expected: STATE_SIZE,
                got: state.len()
            }
        );
        ensure!(
            covariance.shape() == (STATE_SIZE, STATE_SIZE),
            StateSizeSnafu {
                expected: STATE_SIZE,
                got: covariance.nrows().max(covariance.ncols())
            }
        );
        Ok(Self {
            target,
            covariance,
            state,
        })
    }

    pub fn target(&self) -> &str {
        self.target
    }

    /// Observation Jacobian (transposed) followed by the Kalman gain of one scalar observation,
    /// i.e. 2 x 24 entries.
    fn axis_products(&self, observation: &Expr, variance: &Expr) -> Result<Vec<Expr>, DerivationError> {
        let h = jacobian(std::slice::from_ref(observation), self.state);
        let ht = h.transpose();
        let pht = matmul(self.covariance, &ht).context(AlgebraSnafu {
            target: self.target,
        })?;
        let hpht = matmul(&h, &pht).context(AlgebraSnafu {
            target: self.target,
        })?;
        let innov_var = &hpht[(0, 0)] + variance;
        let gain = scale(&pht, &innov_var.recip());

        let mut products = Vec::with_capacity(2 * self.state.len());
        products.extend(ht.iter().cloned());
        products.extend(gain.iter().cloned());
        Ok(products)
    }

    /// Jacobian and gain of a single scalar observation: 24 Jacobian entries then 24 gain entries.
    pub fn observation_equations(
        &self,
        observation: &Expr,
        variance: &Expr,
        pool: &mut TemporaryPool,
    ) -> Result<SimplifiedSet, DerivationError> {
        let products = self.axis_products(observation, variance)?;
        cse(&products, pool).context(AlgebraSnafu {
            target: self.target,
        })
    }

    /// Jacobians and gains of a vector observation, each axis being fused as a scalar, and all
    /// axes simplified together: 48 entries per axis, in axis order.
    pub fn observation_vector_equations(
        &self,
        observations: &[Expr],
        variance: &Expr,
        pool: &mut TemporaryPool,
    ) -> Result<SimplifiedSet, DerivationError> {
        ensure!(
            !observations.is_empty(),
            EmptyObservationSnafu {
                target: self.target
            }
        );
        if observations.len() == 1 {
            warn!("{}: vector fusion of a single axis", self.target);
        }
        let mut products = Vec::with_capacity(observations.len() * 2 * self.state.len());
        for observation in observations {
            products.extend(self.axis_products(observation, variance)?);
        }
        cse(&products, pool).context(AlgebraSnafu {
            target: self.target,
        })
    }

    /// The 24 entries of the observation Jacobian only.
    pub fn jacobian_equations(
        &self,
        observation: &Expr,
        pool: &mut TemporaryPool,
    ) -> Result<SimplifiedSet, DerivationError> {
        let h = jacobian(std::slice::from_ref(observation), self.state);
        let entries: Vec<Expr> = h.iter().cloned().collect();
        cse(&entries, pool).context(AlgebraSnafu {
            target: self.target,
        })
    }
}

/// One simplified section of an artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedSection {
    pub heading: Option<String>,
    pub set: SimplifiedSet,
    /// Number of fused axes in `set`, zero for a Jacobian only section.
    pub n_obs: usize,
}

impl FusionTarget {
    /// Derives and simplifies every section of this target, each with a fresh temporary pool.
    pub fn derive(
        &self,
        problem: &FusionProblem,
        pools: &PoolConfig,
    ) -> Result<Vec<DerivedSection>, DerivationError> {
        let mut derived = Vec::with_capacity(self.sections.len());
        for section in &self.sections {
            ensure!(
                !section.axes.is_empty(),
                EmptyObservationSnafu {
                    target: problem.target()
                }
            );
            let mut pool = pools.pool(section.pool);
            let (set, n_obs) = match (self.strategy, &self.variance) {
                (FusionStrategy::JacobianOnly, _) => {
                    (problem.jacobian_equations(&section.axes[0], &mut pool)?, 0)
                }
                (FusionStrategy::Sequential, Some(variance)) => (
                    problem.observation_equations(&section.axes[0], variance, &mut pool)?,
                    1,
                ),
                (FusionStrategy::Batched, Some(variance)) => (
                    problem.observation_vector_equations(&section.axes, variance, &mut pool)?,
                    section.axes.len(),
                ),
                (_, None) => {
                    return MissingVarianceSnafu {
                        target: problem.target(),
                    }
                    .fail()
                }
            };
            info!(
                "{} {}: {} subexpressions, {} outputs",
                self.artifact,
                section.heading.as_deref().unwrap_or(""),
                set.replacements.len(),
                set.reduced.len()
            );
            derived.push(DerivedSection {
                heading: section.heading.clone(),
                set,
                n_obs,
            });
        }
        Ok(derived)
    }
}
