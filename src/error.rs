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

//! Error type shared by every stage of the tile pipeline.

use std::path::PathBuf;

/// Errors produced while partitioning, permuting or persisting frames.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Grid size is unusable for the frame (`<= 1`, or not smaller than
    /// the shortest frame side).
    #[error("invalid grid size {grid_size}: {reason}")]
    InvalidGridSpec { grid_size: usize, reason: String },

    /// Capture device or input file could not be opened.
    #[error("source unavailable ({}): {reason}", .path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    /// A permutation has the wrong length or is not a bijection.
    #[error("malformed permutation (expected {expected} entries): {reason}")]
    PermutationMalformed { expected: usize, reason: String },

    /// Frame count and permutation chunk count disagree.
    #[error("stream desynchronized: {frames} frame(s) against {permutations} permutation(s)")]
    StreamDesynchronization { frames: usize, permutations: usize },

    /// Decryption was requested before anything was encrypted.
    #[error("no permutation recorded yet, encrypt something first")]
    EmptyPermutation,

    /// Tile list does not match the grid it is reassembled into.
    #[error("tile mismatch: {0}")]
    TileMismatch(String),

    /// Frame shape does not match what the stage expects.
    #[error("frame mismatch: expected {expected:?}, got {actual:?}")]
    FrameMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Sidecar text could not be parsed.
    #[error("sidecar format error: {0}")]
    Sidecar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, Error>;
