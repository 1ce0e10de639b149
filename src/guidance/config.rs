/*
    Nyx, blazing fast astrodynamics
    Copyright (C) 2018-onwards Christopher Rabotin <christopher.rabotin@gmail.com>

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

use crate::io::{ConfigError, ConfigRepr};
use crate::md::pvg::OptimizerOpts;
use serde_derive::{Deserialize, Serialize};

/// Gravitational parameter of the Earth, in m³/s².
pub const EARTH_GM: f64 = 3.986_004_418e14;

/// Tuning of the guidance controller.
///
/// The terminal guidance constants are empirical.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Time to go below which the steering is frozen and the terminal logic starts (s)
    pub terminal_time_s: f64,
    /// Minimum cosine between the thrust axis and the commanded direction for the RCS to finish the burn
    pub min_alignment_cos: f64,
    /// Number of ticks of look ahead of the miss metric
    pub tick_lookahead: u32,
    /// Tick duration used until two ticks have been seen (s)
    pub default_tick_s: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            terminal_time_s: 10.0,
            min_alignment_cos: 0.5,
            tick_lookahead: 1,
            default_tick_s: 0.02,
        }
    }
}

/// Settings of the adapter between the vehicle and the optimizer.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Minimum time between two solver attempts (s)
    pub min_interval_s: f64,
    /// Attempts are skipped when the active stage has less velocity change left than this (m/s)
    pub dv_margin_m_s: f64,
    /// Duration of the first guess of a coast before the final burn, if the plan should include one (s)
    pub coast_before_final_s: Option<f64>,
    /// Gravitational parameter of the central body (m³/s²)
    pub mu: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            min_interval_s: 1.0,
            dv_margin_m_s: 10.0,
            coast_before_final_s: None,
            mu: EARTH_GM,
        }
    }
}

/// All of the settings of the guidance, as loaded from a YAML file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub controller: ControllerConfig,
    pub adapter: AdapterConfig,
    pub optimizer: OptimizerOpts,
}

impl ConfigRepr for GuidanceConfig {}

impl GuidanceConfig {
    /// Checks the consistency of the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::InvalidConfig { msg: msg.to_string() });
        if !(self.adapter.mu > 0.0) {
            return invalid("adapter.mu must be positive");
        }
        if !(self.adapter.min_interval_s >= 0.0) || !(self.adapter.dv_margin_m_s >= 0.0) {
            return invalid("adapter intervals and margins must not be negative");
        }
        if matches!(self.adapter.coast_before_final_s, Some(c) if !(c >= 0.0)) {
            return invalid("adapter.coast_before_final_s must not be negative");
        }
        if !(self.controller.terminal_time_s >= 0.0) || !(self.controller.default_tick_s > 0.0) {
            return invalid("controller times must be positive");
        }
        if !(-1.0..=1.0).contains(&self.controller.min_alignment_cos) {
            return invalid("controller.min_alignment_cos must be a cosine");
        }
        if self.optimizer.samples_per_arc < 2 || !(self.optimizer.convergence_tol > 0.0) {
            return invalid("optimizer needs at least two samples per arc and a positive tolerance");
        }
        Ok(())
    }
}
