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

extern crate ekf_derivation;
extern crate log;
extern crate pretty_env_logger;

use clap::Parser;
use ekf_derivation::io::{ConfigRepr, DerivationConfig};
use ekf_derivation::{DerivationError, DerivationProcess};
use log::{error, info};
use std::env::{set_var, var};
use std::path::PathBuf;

const LOG_VAR: &str = "EKF_DERIVATION_LOG";

/// Derives the EKF covariance prediction and sensor fusion equations and writes them as C code.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML configuration of the run, defaults to every artifact
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory where the artifacts are written, overrides the configuration
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<(), DerivationError> {
    let args = Args::parse();

    if var(LOG_VAR).is_err() {
        set_var(LOG_VAR, "INFO");
    }

    if pretty_env_logger::try_init_custom_env(LOG_VAR).is_err() {
        println!("could not init logger");
    }

    let mut config = match &args.config {
        Some(path) => match DerivationConfig::load(path) {
            Ok(config) => {
                info!("Loaded configuration `{}`", path.display());
                config
            }
            Err(source) => {
                error!("{source}");
                return Err(DerivationError::Config { source });
            }
        },
        None => DerivationConfig::default(),
    };

    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let report = DerivationProcess::new(config)?.run()?;
    for artifact in &report.artifacts {
        info!("{}", artifact.display());
    }
    Ok(())
}
