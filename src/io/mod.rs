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

use crate::algebra::TemporaryPool;
use crate::observation::{PoolKind, Sensor};
use enum_iterator::all;
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use snafu::prelude::*;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use typed_builder::TypedBuilder;

/// Writes the generated C code artifacts.
pub mod codegen;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read configuration file: {source}"))]
    ReadError { source: io::Error },
    #[snafu(display("failed to parse YAML configuration file: {source}"))]
    ParseError { source: serde_yaml::Error },
    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig { reason: String },
}

impl PartialEq for ConfigError {
    /// No two configuration errors match
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

pub trait ConfigRepr: Debug + Sized + serde::Serialize + DeserializeOwned {
    /// Builds the configuration representation from the path to a yaml
    fn load<P>(path: P) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path).context(ReadSnafu)?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).context(ParseSnafu)
    }

    /// Builds the configuration representation from the provided string of a yaml
    fn loads(data: &str) -> Result<Self, ConfigError> {
        debug!("Loading YAML:\n{data}");
        serde_yaml::from_str(data).context(ParseSnafu)
    }
}

/// Naming prefix and size of a pool of CSE temporaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PoolSpec {
    #[builder(setter(into))]
    pub prefix: String,
    pub capacity: usize,
}

impl PoolSpec {
    pub fn pool(&self) -> TemporaryPool {
        TemporaryPool::new(self.prefix.as_str(), self.capacity)
    }
}

/// The temporary pools of each call site, the prefixes must be distinct so that the temporaries of
/// two artifacts never collide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct PoolConfig {
    /// Observation Jacobians and Kalman gains
    #[builder(default = PoolSpec::builder().prefix("HK").capacity(1000).build())]
    pub gain: PoolSpec,
    /// Covariance prediction
    #[builder(default = PoolSpec::builder().prefix("PS").capacity(1000).build())]
    pub covariance: PoolSpec,
    /// Yaw observation, first formulation
    #[builder(default = PoolSpec::builder().prefix("SA").capacity(200).build())]
    pub formulation_a: PoolSpec,
    /// Yaw observation, second formulation
    #[builder(default = PoolSpec::builder().prefix("SB").capacity(200).build())]
    pub formulation_b: PoolSpec,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PoolConfig {
    /// Returns a fresh pool for the provided call site, numbering restarts at zero.
    pub fn pool(&self, kind: PoolKind) -> TemporaryPool {
        match kind {
            PoolKind::Gain => self.gain.pool(),
            PoolKind::FormulationA => self.formulation_a.pool(),
            PoolKind::FormulationB => self.formulation_b.pool(),
        }
    }

    pub fn covariance_pool(&self) -> TemporaryPool {
        self.covariance.pool()
    }

    fn specs(&self) -> [&PoolSpec; 4] {
        [
            &self.gain,
            &self.covariance,
            &self.formulation_a,
            &self.formulation_b,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let specs = self.specs();
        for (i, spec) in specs.iter().enumerate() {
            ensure!(
                !spec.prefix.is_empty() && spec.prefix.chars().all(|c| c.is_ascii_alphabetic()),
                InvalidConfigSnafu {
                    reason: format!("pool prefix `{}` must be alphabetic", spec.prefix)
                }
            );
            ensure!(
                spec.capacity > 0,
                InvalidConfigSnafu {
                    reason: format!("pool `{}` has no capacity", spec.prefix)
                }
            );
            if let Some(other) = specs[i + 1..].iter().find(|other| other.prefix == spec.prefix) {
                return InvalidConfigSnafu {
                    reason: format!("pool prefix `{}` is used twice", other.prefix),
                }
                .fail();
            }
        }
        Ok(())
    }
}

/// Configuration of a derivation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
#[serde(default)]
pub struct DerivationConfig {
    /// Directory where the artifacts are written, defaults to the current directory.
    #[builder(default = PathBuf::from("."), setter(into))]
    pub output_dir: PathBuf,
    /// Set to false to skip the covariance prediction.
    #[builder(default = true)]
    pub covariance: bool,
    /// Sensors to derive, if unset, defaults to all sensors.
    #[builder(default, setter(strip_option))]
    pub sensors: Option<Vec<Sensor>>,
    #[builder(default)]
    pub pools: PoolConfig,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConfigRepr for DerivationConfig {}

impl DerivationConfig {
    /// The sensors to derive, in derivation order.
    pub fn sensors(&self) -> Vec<Sensor> {
        match &self.sensors {
            Some(sensors) => all::<Sensor>().filter(|s| sensors.contains(s)).collect(),
            None => all::<Sensor>().collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sensors) = &self.sensors {
            ensure!(
                !sensors.is_empty() || self.covariance,
                InvalidConfigSnafu {
                    reason: "nothing to derive".to_string()
                }
            );
        }
        self.pools.validate()
    }
}
