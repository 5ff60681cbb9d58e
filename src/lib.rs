//! Library to shuffle video frames as a grid of tiles, and put them back.
//!
//! A frame is cut into `grid_size × grid_size` equally sized tiles which are
//! moved to random positions. Tiles are only moved, never altered, so:
//!
//! * No tile is duplicated nor removed.
//! * Given the permutation, the original frame is restored exactly
//!   (minus remainder pixels past the last full tile).
//! * Per-frame permutations are stored in a sidecar file, in frame order.
//!
//! This is visual obfuscation, not encryption in any cryptographic sense.

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
//

pub mod config;
pub mod error;
pub mod grid;
pub mod media;
pub mod permutation;
pub mod pipeline;
pub mod session;
pub mod shuffle;
pub mod store;

#[doc(inline)]
pub use crate::config::{Config, ConfigBuilder};
#[doc(inline)]
pub use crate::error::{Error, Result};
#[doc(inline)]
pub use crate::grid::{partition, reassemble, GridSpec};
#[doc(inline)]
pub use crate::permutation::{generate, rng_from_seed, OriginForm, PlacementForm};
#[doc(inline)]
pub use crate::shuffle::{shuffle, shuffle_frame, unshuffle, unshuffle_frame};
#[doc(inline)]
pub use crate::store::{PermutationReader, PermutationWriter, SidecarFormat};
