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

use crate::algebra::{SimplifiedSet, SymMatrix};
use crate::context::DerivationContext;
use crate::ekf::transition::covariance_prediction;
use crate::ekf::NavigationModel;
use crate::errors::{AlgebraSnafu, ConfigSnafu, DerivationError, EmitSnafu};
use crate::io::codegen::{ArtifactIoSnafu, CodeGenerator};
use crate::io::DerivationConfig;
use crate::observation::{DerivedSection, FusionProblem, FusionTarget, Sensor};
use snafu::ResultExt;
use std::fs;
use std::path::PathBuf;

/// Name of the covariance prediction artifact.
pub const COVARIANCE_ARTIFACT: &str = "covariance_generated.cpp";

/// What a run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationReport {
    /// Paths of the written artifacts, in write order
    pub artifacts: Vec<PathBuf>,
    /// Every symbol name issued during the run, in issue order
    pub symbols: Vec<String>,
}

/// A sensor target and its simplified sections.
pub type DerivedTarget = (FusionTarget, Vec<DerivedSection>);

/// The one-shot derivation run.
///
/// The state, inputs and covariance are built once when the process is created and are only read
/// afterwards. Each derivation runs to completion and its artifact is written before the next one
/// starts: the first failure aborts the run.
#[derive(Clone, Debug)]
pub struct DerivationProcess {
    config: DerivationConfig,
    ctx: DerivationContext,
    nav: NavigationModel,
}

impl DerivationProcess {
    pub fn new(config: DerivationConfig) -> Result<Self, DerivationError> {
        config.validate().context(ConfigSnafu)?;
        let mut ctx = DerivationContext::new();
        let nav = NavigationModel::new(&mut ctx);
        debug!("navigation model built with {} symbols", ctx.len());
        Ok(Self { config, ctx, nav })
    }

    pub fn config(&self) -> &DerivationConfig {
        &self.config
    }

    pub fn navigation(&self) -> &NavigationModel {
        &self.nav
    }

    pub fn context(&self) -> &DerivationContext {
        &self.ctx
    }

    /// Derives the simplified covariance prediction and the shape of `nextP`.
    pub fn derive_covariance(&self) -> Result<(SimplifiedSet, (usize, usize)), DerivationError> {
        let mut pool = self.config.pools.covariance_pool();
        let (set, shape) = covariance_prediction(&self.nav, &mut pool)?;
        info!(
            "covariance prediction: {} subexpressions, {} outputs",
            set.replacements.len(),
            set.reduced.len()
        );
        Ok((set, shape))
    }

    /// Derives every target of a sensor. Symbols specific to the sensor are issued on each call.
    pub fn derive_sensor(&mut self, sensor: Sensor) -> Result<Vec<DerivedTarget>, DerivationError> {
        let targets = sensor
            .targets(&mut self.ctx, &self.nav)
            .context(AlgebraSnafu {
                target: sensor.to_string(),
            })?;

        let mut derived = Vec::with_capacity(targets.len());
        for target in targets {
            let problem =
                FusionProblem::new(target.artifact, &self.nav.covariance, self.nav.state.symbols())?;
            let sections = target.derive(&problem, &self.config.pools)?;
            derived.push((target, sections));
        }
        Ok(derived)
    }

    fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.config.output_dir.join(artifact)
    }

    /// Writes the `nextP` upper triangle.
    pub fn write_covariance(
        &self,
        set: &SimplifiedSet,
        shape: (usize, usize),
    ) -> Result<PathBuf, DerivationError> {
        let path = self.artifact_path(COVARIANCE_ARTIFACT);
        let mut gen = CodeGenerator::create(&path).context(EmitSnafu)?;
        gen.print_string("Equations for covariance matrix prediction, without process noise!")
            .context(EmitSnafu)?;
        gen.write_subexpressions(&set.replacements)
            .context(EmitSnafu)?;
        // reduced entries are in column major order, as nalgebra stores them
        let next_p = SymMatrix::from_vec(shape.0, shape.1, set.reduced.clone());
        gen.write_matrix(&next_p, "nextP", true)
            .context(EmitSnafu)?;
        gen.close().context(EmitSnafu)?;
        info!("wrote {}", path.display());
        Ok(path)
    }

    /// Writes every section of a sensor target in its artifact.
    pub fn write_target(
        &self,
        target: &FusionTarget,
        sections: &[DerivedSection],
    ) -> Result<PathBuf, DerivationError> {
        let path = self.artifact_path(target.artifact);
        let mut gen = CodeGenerator::create(&path).context(EmitSnafu)?;
        for section in sections {
            gen.write_section(section, &target.names)
                .context(EmitSnafu)?;
        }
        gen.close().context(EmitSnafu)?;
        info!("wrote {} ({} sections)", path.display(), sections.len());
        Ok(path)
    }

    /// Derives and writes every configured artifact, covariance first then each sensor in order.
    pub fn run(mut self) -> Result<DerivationReport, DerivationError> {
        let output_dir = self.config.output_dir.clone();
        fs::create_dir_all(&output_dir)
            .context(ArtifactIoSnafu {
                artifact: output_dir.display().to_string(),
            })
            .context(EmitSnafu)?;

        let mut artifacts = Vec::new();
        if self.config.covariance {
            let (set, shape) = self.derive_covariance()?;
            artifacts.push(self.write_covariance(&set, shape)?);
        }

        for sensor in self.config.sensors() {
            info!("deriving {sensor} fusion");
            for (target, sections) in self.derive_sensor(sensor)? {
                artifacts.push(self.write_target(&target, &sections)?);
            }
        }

        let collisions = self.ctx.collisions();
        if !collisions.is_empty() {
            warn!("symbol names issued more than once: {collisions:?}");
        }
        info!(
            "derivation complete: {} artifacts in {}",
            artifacts.len(),
            output_dir.display()
        );

        Ok(DerivationReport {
            artifacts,
            symbols: self.ctx.into_names(),
        })
    }
}
