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

use crate::guidance::AdapterError;
use crate::io::ConfigError;
use crate::md::pvg::OptimizerError;
use crate::propagators::{ConicError, PropagationError};
use crate::tools::{LambertError, RootError};
use snafu::prelude::*;

/// Any error of this crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PvgError {
    #[snafu(display("root finding failed: {source}"))]
    Root { source: RootError },
    #[snafu(display("propagation failed: {source}"))]
    Propagation { source: PropagationError },
    #[snafu(display("conic propagation failed: {source}"))]
    Conic { source: ConicError },
    #[snafu(display("Lambert solver failed: {source}"))]
    Lambert { source: LambertError },
    #[snafu(display("{source}"))]
    Optimizer { source: OptimizerError },
    #[snafu(display("{source}"))]
    Adapter { source: AdapterError },
    #[snafu(display("{source}"))]
    Config { source: ConfigError },
}

impl From<RootError> for PvgError {
    fn from(source: RootError) -> Self {
        Self::Root { source }
    }
}

impl From<PropagationError> for PvgError {
    fn from(source: PropagationError) -> Self {
        Self::Propagation { source }
    }
}

impl From<ConicError> for PvgError {
    fn from(source: ConicError) -> Self {
        Self::Conic { source }
    }
}

impl From<LambertError> for PvgError {
    fn from(source: LambertError) -> Self {
        Self::Lambert { source }
    }
}

impl From<OptimizerError> for PvgError {
    fn from(source: OptimizerError) -> Self {
        Self::Optimizer { source }
    }
}

impl From<AdapterError> for PvgError {
    fn from(source: AdapterError) -> Self {
        Self::Adapter { source }
    }
}

impl From<ConfigError> for PvgError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}
