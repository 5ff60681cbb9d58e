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

//! Tile grid geometry, partitioning and reassembly.
//!
//! Frames are `(height, width, channels)` arrays. A grid of
//! `grid_size × grid_size` tiles covers the frame from the top-left corner;
//! pixels past the last full tile on the right or bottom edge are dropped.

use ndarray::parallel::prelude::*;
use ndarray::prelude::*;

use crate::error::{Error, Result};

/// Geometry of a square tile grid over a frame of fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSpec {
    grid_size: usize,
    tile_w: usize,
    tile_h: usize,
    frame_w: usize,
    frame_h: usize,
}

impl GridSpec {
    /// Derive a grid for a `frame_w × frame_h` frame.
    ///
    /// Rejects `grid_size <= 1` and any grid size that is not strictly
    /// smaller than the shortest frame side.
    pub fn new(grid_size: usize, frame_w: usize, frame_h: usize) -> Result<Self> {
        if grid_size <= 1 || grid_size >= frame_w.min(frame_h) {
            return Err(Error::InvalidGridSpec {
                grid_size,
                reason: format!(
                    "a {frame_w}x{frame_h} frame needs a grid size from 2 to {}",
                    frame_w.min(frame_h).saturating_sub(1)
                ),
            });
        }

        Ok(Self {
            grid_size,
            tile_w: frame_w / grid_size,
            tile_h: frame_h / grid_size,
            frame_w,
            frame_h,
        })
    }

    /// Derive the grid of a frame that was already cut to whole tiles, such
    /// as the output of a shuffle.
    ///
    /// Sides that are exact multiples of `grid_size` may be as small as
    /// `grid_size` (one-pixel tiles). Other sizes fall back to
    /// [`GridSpec::new`].
    pub fn tiled(grid_size: usize, frame_w: usize, frame_h: usize) -> Result<Self> {
        let exact = grid_size >= 2
            && frame_w >= grid_size
            && frame_h >= grid_size
            && frame_w % grid_size == 0
            && frame_h % grid_size == 0;
        if !exact {
            return Self::new(grid_size, frame_w, frame_h);
        }

        Ok(Self {
            grid_size,
            tile_w: frame_w / grid_size,
            tile_h: frame_h / grid_size,
            frame_w,
            frame_h,
        })
    }

    /// Derive a grid from the shape of `frame`.
    pub fn for_frame<A>(frame: &ArrayView3<'_, A>, grid_size: usize) -> Result<Self> {
        let (h, w, _) = frame.dim();
        Self::new(grid_size, w, h)
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn tile_width(&self) -> usize {
        self.tile_w
    }

    pub fn tile_height(&self) -> usize {
        self.tile_h
    }

    pub fn frame_width(&self) -> usize {
        self.frame_w
    }

    pub fn frame_height(&self) -> usize {
        self.frame_h
    }

    /// Number of tiles, `grid_size²`.
    pub fn tile_count(&self) -> usize {
        self.grid_size * self.grid_size
    }

    /// Width of a reassembled frame (remainder columns excluded).
    pub fn output_width(&self) -> usize {
        self.grid_size * self.tile_w
    }

    /// Height of a reassembled frame (remainder rows excluded).
    pub fn output_height(&self) -> usize {
        self.grid_size * self.tile_h
    }

    /// Top-left pixel `(y, x)` of tile `k`.
    pub fn tile_origin(&self, k: usize) -> (usize, usize) {
        let (row, col) = (k / self.grid_size, k % self.grid_size);
        (row * self.tile_h, col * self.tile_w)
    }

    /// Whether a frame of this resolution is covered by the grid.
    pub fn matches(&self, frame_w: usize, frame_h: usize) -> bool {
        self.frame_w == frame_w && self.frame_h == frame_h
    }

    pub(crate) fn check_frame<A>(&self, frame: &ArrayView3<'_, A>) -> Result<()> {
        let (h, w, _) = frame.dim();
        if !self.matches(w, h) {
            return Err(Error::FrameMismatch {
                expected: (self.frame_w, self.frame_h),
                actual: (w, h),
            });
        }
        Ok(())
    }

    pub(crate) fn tile_view<'a, A>(
        &self,
        frame: &'a ArrayView3<'_, A>,
        k: usize,
    ) -> ArrayView3<'a, A> {
        let (y, x) = self.tile_origin(k);
        frame.slice(s![y..y + self.tile_h, x..x + self.tile_w, ..])
    }
}

/// Split `frame` into row-major tiles (`k = row * grid_size + col`).
///
/// Every tile is an owned copy, so the source frame may be reused or
/// overwritten afterwards.
pub fn partition<A>(frame: ArrayView3<'_, A>, grid: &GridSpec) -> Result<Vec<Array3<A>>>
where
    A: Clone + Send + Sync,
{
    grid.check_frame(&frame)?;

    let frame = &frame;
    Ok((0..grid.tile_count())
        .into_par_iter()
        .map(|k| grid.tile_view(frame, k).to_owned())
        .collect())
}

/// Lay row-major `tiles` back into a frame of the grid's output size.
///
/// The buffer starts out as `A::default()` (zero for pixel types) and
/// every tile must be `tile_height × tile_width` with a common channel count.
pub fn reassemble<A>(tiles: &[Array3<A>], grid: &GridSpec) -> Result<Array3<A>>
where
    A: Clone + Default + Send + Sync,
{
    if tiles.len() != grid.tile_count() {
        return Err(Error::TileMismatch(format!(
            "expected {} tiles, got {}",
            grid.tile_count(),
            tiles.len()
        )));
    }

    let channels = tiles[0].dim().2;
    let expected = (grid.tile_h, grid.tile_w, channels);
    if let Some((k, t)) = tiles.iter().enumerate().find(|(_, t)| t.dim() != expected) {
        return Err(Error::TileMismatch(format!(
            "tile {k} has shape {:?}, expected {expected:?}",
            t.dim()
        )));
    }

    let mut out = <Array3<A>>::default((grid.output_height(), grid.output_width(), channels));
    let g = grid.grid_size;
    out.axis_chunks_iter_mut(Axis(0), grid.tile_h)
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut band)| {
            for (col, mut block) in band.axis_chunks_iter_mut(Axis(1), grid.tile_w).enumerate() {
                block.assign(&tiles[row * g + col]);
            }
        });

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_4x4() -> Array3<u8> {
        Array3::from_shape_fn((4, 4, 1), |(y, x, _)| (y * 4 + x + 1) as u8)
    }

    #[test]
    fn rejects_bad_grid_sizes() {
        assert!(matches!(
            GridSpec::new(1, 64, 64),
            Err(Error::InvalidGridSpec { grid_size: 1, .. })
        ));
        assert!(GridSpec::new(0, 64, 64).is_err());
        assert!(GridSpec::new(48, 640, 48).is_err());
        assert!(GridSpec::new(47, 640, 48).is_ok());
    }

    #[test]
    fn tiled_accepts_one_pixel_tiles() {
        let g = GridSpec::tiled(9, 9, 9).unwrap();
        assert_eq!((g.tile_width(), g.tile_height()), (1, 1));
        assert_eq!((g.output_width(), g.output_height()), (9, 9));

        let g = GridSpec::tiled(4, 4, 12).unwrap();
        assert_eq!((g.tile_width(), g.tile_height()), (1, 3));

        assert!(GridSpec::new(9, 9, 9).is_err());
        assert!(GridSpec::tiled(1, 9, 9).is_err());
        assert!(GridSpec::tiled(9, 18, 8).is_err());
        // Not whole tiles: same rules as `new`.
        assert_eq!(GridSpec::tiled(3, 10, 10).unwrap(), GridSpec::new(3, 10, 10).unwrap());
        assert!(GridSpec::tiled(9, 10, 9).is_err());
    }

    #[test]
    fn tile_geometry() {
        let g = GridSpec::new(4, 640, 480).unwrap();
        assert_eq!((g.tile_width(), g.tile_height()), (160, 120));
        assert_eq!(g.tile_count(), 16);
        assert_eq!(g.tile_origin(0), (0, 0));
        assert_eq!(g.tile_origin(5), (120, 160));
        assert_eq!(g.tile_origin(15), (360, 480));
    }

    #[test]
    fn partition_is_row_major() {
        let frame = sample_4x4();
        let grid = GridSpec::for_frame(&frame.view(), 2).unwrap();
        let tiles = partition(frame.view(), &grid).unwrap();

        let flat: Vec<Vec<u8>> = tiles.iter().map(|t| t.iter().copied().collect()).collect();
        assert_eq!(
            flat,
            vec![
                vec![1, 2, 5, 6],
                vec![3, 4, 7, 8],
                vec![9, 10, 13, 14],
                vec![11, 12, 15, 16],
            ]
        );
    }

    #[test]
    fn partition_checks_resolution() {
        let grid = GridSpec::new(2, 8, 8).unwrap();
        let frame = sample_4x4();
        assert!(matches!(
            partition(frame.view(), &grid),
            Err(Error::FrameMismatch { .. })
        ));
    }

    #[test]
    fn reassemble_restores_frame() {
        let frame = Array3::from_shape_fn((12, 9, 3), |(y, x, c)| (y * 31 + x * 7 + c) as u8);
        let grid = GridSpec::for_frame(&frame.view(), 3).unwrap();
        let tiles = partition(frame.view(), &grid).unwrap();
        assert_eq!(reassemble(&tiles, &grid).unwrap(), frame);
    }

    #[test]
    fn remainder_pixels_are_dropped() {
        let frame = Array3::from_shape_fn((10, 100, 1), |(y, x, _)| (y * 100 + x) as u16);
        let grid = GridSpec::for_frame(&frame.view(), 7).unwrap();
        assert_eq!(grid.tile_width(), 14);
        assert_eq!(grid.tile_height(), 1);

        let out = reassemble(&partition(frame.view(), &grid).unwrap(), &grid).unwrap();
        assert_eq!(out.dim(), (7, 98, 1));
        assert_eq!(out, frame.slice(s![..7, ..98, ..]));
    }

    #[test]
    fn reassemble_rejects_wrong_tiles() {
        let grid = GridSpec::new(2, 4, 4).unwrap();
        let tiles = vec![<Array3<u8>>::zeros((2, 2, 1)); 3];
        assert!(matches!(
            reassemble(&tiles, &grid),
            Err(Error::TileMismatch(_))
        ));

        let mut tiles = vec![<Array3<u8>>::zeros((2, 2, 1)); 4];
        tiles[2] = <Array3<u8>>::zeros((2, 3, 1));
        assert!(matches!(
            reassemble(&tiles, &grid),
            Err(Error::TileMismatch(_))
        ));
    }
}
