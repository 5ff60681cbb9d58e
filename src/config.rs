// Copyright (C) 2023 Dheatly23
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use rand_xoshiro::Xoshiro256StarStar;

use crate::error::{Error, Result};
use crate::grid::GridSpec;
use crate::permutation::rng_from_seed;
use crate::store::SidecarFormat;

/// Settings of an encrypt run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    grid_size: usize,
    seed: Option<String>,
    sidecar_format: SidecarFormat,
}

impl Config {
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }

    pub fn sidecar_format(&self) -> SidecarFormat {
        self.sidecar_format
    }

    /// Grid for a frame of the given resolution.
    pub fn grid_for(&self, frame_w: usize, frame_h: usize) -> Result<GridSpec> {
        GridSpec::new(self.grid_size, frame_w, frame_h)
    }

    /// Fresh random source for permutation generation.
    pub fn random(&self) -> Xoshiro256StarStar {
        rng_from_seed(self.seed.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    grid_size: usize,
    seed: Option<String>,
    sidecar_format: SidecarFormat,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            grid_size: 4,
            seed: None,
            sidecar_format: SidecarFormat::default(),
        }
    }

    pub fn grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    pub fn seed(mut self, seed: Option<String>) -> Self {
        self.seed = seed;
        self
    }

    pub fn sidecar_format(mut self, format: SidecarFormat) -> Self {
        self.sidecar_format = format;
        self
    }

    /// Validate and build. The grid size is checked against frames later,
    /// here only the lower bound applies.
    pub fn build(self) -> Result<Config> {
        if self.grid_size <= 1 {
            return Err(Error::InvalidGridSpec {
                grid_size: self.grid_size,
                reason: "must be at least 2".into(),
            });
        }

        Ok(Config {
            grid_size: self.grid_size,
            seed: self.seed,
            sidecar_format: self.sidecar_format,
        })
    }
}
