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

use super::FusionStrategy;
use crate::algebra::matrix::{mat_vec, matmul, symbol_matrix};
use crate::algebra::{AlgebraError, Expr};
use crate::context::DerivationContext;
use crate::ekf::NavigationModel;
use crate::io::codegen::BlockNames;
use enum_iterator::Sequence;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// The sensors for which fusion equations are derived, in derivation order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize)]
pub enum Sensor {
    /// Yaw angle of a 321 or 312 Euler sequence, two formulations each
    Yaw,
    /// Dual antenna GPS heading
    GpsYaw,
    /// Three axis magnetometer
    Magnetometer,
    /// Magnetic declination
    Declination,
    /// True airspeed
    Airspeed,
    /// Sideslip angle
    Sideslip,
    /// Optical flow line of sight rates
    OpticalFlow,
    /// Body frame velocity
    BodyVelocity,
    /// Body frame lateral drag acceleration (multirotors)
    BodyDrag,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which temporary pool simplifies a section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolKind {
    Gain,
    FormulationA,
    FormulationB,
}

/// A labelled group of observation axes simplified together.
///
/// Sequential and Jacobian only sections hold exactly one axis.
#[derive(Clone, Debug)]
pub struct Section {
    pub heading: Option<String>,
    pub axes: Vec<Expr>,
    pub pool: PoolKind,
}

impl Section {
    fn single(heading: Option<String>, axis: Expr) -> Self {
        Self {
            heading,
            axes: vec![axis],
            pool: PoolKind::Gain,
        }
    }
}

/// One artifact worth of derivations for a sensor.
#[derive(Clone, Debug)]
pub struct FusionTarget {
    pub artifact: &'static str,
    pub strategy: FusionStrategy,
    /// Observation noise variance, unused for Jacobian only targets
    pub variance: Option<Expr>,
    pub sections: Vec<Section>,
    pub names: BlockNames,
}

impl FusionTarget {
    /// One section per axis, each fused as a scalar.
    fn sequential<H: Fn(usize) -> Option<String>>(
        artifact: &'static str,
        axes: &[Expr],
        variance: &Expr,
        heading: H,
        names: BlockNames,
    ) -> Self {
        Self {
            artifact,
            strategy: FusionStrategy::Sequential,
            variance: Some(variance.clone()),
            sections: axes
                .iter()
                .enumerate()
                .map(|(i, axis)| Section::single(heading(i), axis.clone()))
                .collect(),
            names,
        }
    }

    /// Single scalar observation in its own artifact.
    fn scalar(artifact: &'static str, observation: Expr, variance: &Expr) -> Self {
        Self::sequential(
            artifact,
            &[observation],
            variance,
            |_| None,
            BlockNames::FUSION,
        )
    }

    /// All axes fused in one simplification.
    fn batched(artifact: &'static str, axes: &[Expr], variance: &Expr) -> Self {
        Self {
            artifact,
            strategy: FusionStrategy::Batched,
            variance: Some(variance.clone()),
            sections: vec![Section {
                heading: None,
                axes: axes.to_vec(),
                pool: PoolKind::Gain,
            }],
            names: BlockNames::FUSION,
        }
    }
}

impl Sensor {
    /// Builds the observation models of this sensor, allocating its own symbols in `ctx`.
    pub fn targets(
        &self,
        ctx: &mut DerivationContext,
        nav: &NavigationModel,
    ) -> Result<Vec<FusionTarget>, AlgebraError> {
        match self {
            Sensor::Yaw => Ok(yaw(nav)),
            Sensor::GpsYaw => gps_yaw(ctx, nav),
            Sensor::Magnetometer => magnetometer(ctx, nav),
            Sensor::Declination => Ok(declination(ctx, nav)),
            Sensor::Airspeed => Ok(airspeed(ctx, nav)),
            Sensor::Sideslip => sideslip(ctx, nav),
            Sensor::OpticalFlow => optical_flow(ctx, nav),
            Sensor::BodyVelocity => body_velocity(ctx, nav),
            Sensor::BodyDrag => body_drag(ctx, nav),
        }
    }
}

/// Velocity relative to the air mass, NED, assuming no vertical wind.
fn air_relative_velocity(nav: &NavigationModel) -> [Expr; 3] {
    let [vn, ve, vd] = nav.state.velocity();
    let [vwn, vwe] = nav.state.wind();
    [vn - vwn, ve - vwe, vd]
}

fn yaw(nav: &NavigationModel) -> Vec<FusionTarget> {
    let r = &nav.r_to_earth;
    let half_pi = Expr::pi() / Expr::integer(2);

    // Formulation B avoids the singularity of formulation A at +-90 deg of yaw
    let sections = vec![
        Section {
            heading: Some("calculate 321 yaw observation matrix - option A".to_string()),
            axes: vec![(&r[(1, 0)] / &r[(0, 0)]).atan()],
            pool: PoolKind::FormulationA,
        },
        Section {
            heading: Some("calculate 321 yaw observation matrix - option B".to_string()),
            axes: vec![&half_pi - (&r[(0, 0)] / &r[(1, 0)]).atan()],
            pool: PoolKind::FormulationB,
        },
        Section {
            heading: Some("calculate 312 yaw observation matrix - option A".to_string()),
            axes: vec![(-(&r[(0, 1)] / &r[(1, 1)])).atan()],
            pool: PoolKind::FormulationA,
        },
        Section {
            heading: Some("calculate 312 yaw observation matrix - option B".to_string()),
            axes: vec![&half_pi - (-(&r[(1, 1)] / &r[(0, 1)])).atan()],
            pool: PoolKind::FormulationB,
        },
    ];

    vec![FusionTarget {
        artifact: "yaw_generated.cpp",
        strategy: FusionStrategy::JacobianOnly,
        variance: None,
        sections,
        names: BlockNames::jacobian_only("H_YAW"),
    }]
}

fn gps_yaw(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    let obs_var = ctx.create_symbol("R_YAW").expr();
    // yaw of the antenna array axis with respect to the body X axis
    let ant_yaw = ctx.create_symbol("ant_yaw").expr();

    let ant_vec_bf = [ant_yaw.cos(), ant_yaw.sin(), Expr::zero()];
    let ant_vec_ef = mat_vec(&nav.r_to_body.transpose(), &ant_vec_bf)?;
    let observation = (&ant_vec_ef[1] / &ant_vec_ef[0]).atan();

    Ok(vec![FusionTarget::scalar(
        "gps_yaw_generated.cpp",
        observation,
        &obs_var,
    )])
}

fn magnetometer(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    let obs_var = ctx.create_symbol("R_MAG").expr();

    let field_bf = mat_vec(&nav.r_to_body, &nav.state.mag_field())?;
    let bias = nav.state.mag_bias();
    let m_mag: Vec<Expr> = field_bf
        .iter()
        .zip(bias.iter())
        .map(|(field, bias)| field + bias)
        .collect();

    Ok(vec![
        FusionTarget::sequential(
            "3Dmag_generated.cpp",
            &m_mag,
            &obs_var,
            |i| Some(format!("Axis {i} equations")),
            BlockNames::FUSION,
        ),
        FusionTarget::batched("3Dmag_generated_alt.cpp", &m_mag, &obs_var),
    ])
}

fn declination(ctx: &mut DerivationContext, nav: &NavigationModel) -> Vec<FusionTarget> {
    let obs_var = ctx.create_symbol("R_DECL").expr();
    let [mag_n, mag_e, _] = nav.state.mag_field();
    // angle of the horizontal field with respect to magnetic north
    let observation = (mag_e / mag_n).atan();
    vec![FusionTarget::scalar(
        "mag_decl_generated.cpp",
        observation,
        &obs_var,
    )]
}

fn airspeed(ctx: &mut DerivationContext, nav: &NavigationModel) -> Vec<FusionTarget> {
    let obs_var = ctx.create_symbol("R_TAS").expr();
    let [rel_n, rel_e, rel_d] = air_relative_velocity(nav);
    let observation = (&rel_n * &rel_n + &rel_e * &rel_e + &rel_d * &rel_d).sqrt();
    vec![FusionTarget::scalar("tas_generated.cpp", observation, &obs_var)]
}

fn sideslip(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    let obs_var = ctx.create_symbol("R_BETA").expr();
    let v_rel_bf = mat_vec(&nav.r_to_body, &air_relative_velocity(nav))?;
    let observation = &v_rel_bf[1] / &v_rel_bf[0];
    Ok(vec![FusionTarget::scalar(
        "beta_generated.cpp",
        observation,
        &obs_var,
    )])
}

fn optical_flow(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    // range from the focal point to the ground along the sensor Z axis
    let range = ctx.create_symbol("range").expr();
    let obs_var = ctx.create_symbol("R_LOS").expr();

    // body to sensor rotation, opaque to the derivation
    let tbs = symbol_matrix(3, 3, |i, j| ctx.create_symbol(&format!("Tbs({i},{j})")));

    // earth relative velocity in a non rotating sensor frame
    let rel_vel_sensor = mat_vec(&matmul(&tbs, &nav.r_to_body)?, &nav.state.velocity())?;

    // line of sight rates about the sensor X and Y axes
    let los_rates = [
        &rel_vel_sensor[1] / &range,
        -(&rel_vel_sensor[0] / &range),
    ];

    Ok(vec![
        FusionTarget::sequential(
            "flow_generated.cpp",
            &los_rates,
            &obs_var,
            |i| Some(format!("{} Axis Equations", ["X", "Y"][i])),
            BlockNames::FUSION,
        ),
        FusionTarget::batched("flow_generated_alt.cpp", &los_rates, &obs_var),
    ])
}

fn body_velocity(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    let obs_var = ctx.create_symbol("R_VEL").expr();
    let vel_bf = mat_vec(&nav.r_to_body, &nav.state.velocity())?;

    Ok(vec![
        FusionTarget::sequential(
            "vel_bf_generated.cpp",
            &vel_bf,
            &obs_var,
            |i| Some(format!("axis {i}")),
            BlockNames::compact("H_VEL", "Kfusion"),
        ),
        FusionTarget::batched("vel_bf_generated_alt.cpp", &vel_bf, &obs_var),
    ])
}

fn body_drag(
    ctx: &mut DerivationContext,
    nav: &NavigationModel,
) -> Result<Vec<FusionTarget>, AlgebraError> {
    let obs_var = ctx.create_symbol("R_ACC").expr();
    let kacc_x = ctx.create_symbol("Kaccx").expr();
    let kacc_y = ctx.create_symbol("Kaccy").expr();

    let vrel = mat_vec(&nav.r_to_body, &air_relative_velocity(nav))?;

    // viscous drag linearization, Kacc is the mean slope of the ballistic drag curve
    let accel = [-(&kacc_x * &vrel[0]), -(&kacc_y * &vrel[1])];

    Ok(vec![
        FusionTarget::sequential(
            "acc_bf_generated.cpp",
            &accel,
            &obs_var,
            |i| Some(format!("Axis {i} equations")),
            BlockNames::FUSION,
        ),
        FusionTarget::batched("acc_bf_generated_alt.cpp", &accel, &obs_var),
    ])
}
