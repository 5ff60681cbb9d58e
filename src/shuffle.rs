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

//! Moving tiles between grid positions.
//!
//! [`shuffle`] and [`unshuffle`] work on any tile list. [`shuffle_frame`]
//! and [`unshuffle_frame`] do partition, permutation and reassembly in a
//! single parallel pass over a frame and produce the same output as the
//! three separate stages.

use ndarray::parallel::prelude::*;
use ndarray::prelude::*;

use crate::error::{Error, Result};
use crate::grid::GridSpec;
use crate::permutation::OriginForm;

fn check_len(tiles: usize, perm: &OriginForm) -> Result<()> {
    if tiles != perm.len() {
        return Err(Error::PermutationMalformed {
            expected: tiles,
            reason: format!("permutation has {} entries", perm.len()),
        });
    }
    Ok(())
}

/// Move `tiles[k]` to position `origin[k]`.
pub fn shuffle<T>(tiles: Vec<T>, origin: &OriginForm) -> Result<Vec<T>> {
    check_len(tiles.len(), origin)?;

    let mut out: Vec<Option<T>> = tiles.iter().map(|_| None).collect();
    for (k, tile) in tiles.into_iter().enumerate() {
        out[origin.position_of(k)] = Some(tile);
    }

    // Bijection is guaranteed by `OriginForm`, so every slot is filled.
    out.into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| Error::TileMismatch("shuffle left an empty slot".into()))
}

/// Inverse of [`shuffle`]: `original[k] = shuffled[origin[k]]`.
pub fn unshuffle<T>(shuffled: Vec<T>, origin: &OriginForm) -> Result<Vec<T>> {
    check_len(shuffled.len(), origin)?;

    let mut slots: Vec<Option<T>> = shuffled.into_iter().map(Some).collect();
    (0..origin.len())
        .map(|k| {
            slots[origin.position_of(k)]
                .take()
                .ok_or_else(|| Error::TileMismatch(format!("tile {k} taken twice")))
        })
        .collect()
}

/// Copy block `sources[k]` of `frame` into block `k` of a fresh frame.
fn permute_blocks<A>(frame: ArrayView3<'_, A>, grid: &GridSpec, sources: &[usize]) -> Array3<A>
where
    A: Clone + Default + Send + Sync,
{
    let g = grid.grid_size();
    let channels = frame.dim().2;
    let mut out = <Array3<A>>::default((grid.output_height(), grid.output_width(), channels));

    let frame = &frame;
    out.axis_chunks_iter_mut(Axis(0), grid.tile_height())
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut band)| {
            for (col, block) in band
                .axis_chunks_iter_mut(Axis(1), grid.tile_width())
                .enumerate()
            {
                let src = grid.tile_view(frame, sources[row * g + col]);
                azip!((d in block, s in &src) d.clone_from(s));
            }
        });

    out
}

/// Shuffle the tiles of `frame` in one pass.
///
/// Equivalent to `reassemble(shuffle(partition(frame), origin))`.
pub fn shuffle_frame<A>(
    frame: ArrayView3<'_, A>,
    grid: &GridSpec,
    origin: &OriginForm,
) -> Result<Array3<A>>
where
    A: Clone + Default + Send + Sync,
{
    grid.check_frame(&frame)?;
    check_len(grid.tile_count(), origin)?;

    let placement = origin.to_placement();
    Ok(permute_blocks(frame, grid, placement.as_slice()))
}

/// Restore the tile order of a shuffled `frame` in one pass.
///
/// Equivalent to `reassemble(unshuffle(partition(frame), origin))`.
pub fn unshuffle_frame<A>(
    frame: ArrayView3<'_, A>,
    grid: &GridSpec,
    origin: &OriginForm,
) -> Result<Array3<A>>
where
    A: Clone + Default + Send + Sync,
{
    grid.check_frame(&frame)?;
    check_len(grid.tile_count(), origin)?;

    Ok(permute_blocks(frame, grid, origin.as_slice()))
}
