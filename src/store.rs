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

//! Permutation sidecar files.
//!
//! A sidecar holds one origin-form permutation per frame, concatenated in
//! frame order as comma-separated decimal integers. There is no delimiter
//! between frames: frame `t` is chunk `t` of `grid_size²` entries.
//!
//! The default format prefixes the body with a single header line:
//!
//! ```text
//! #tilecipher grid=4 tiles=16 frames=2 sha256=<hex digest of the body>
//! 2,0,3,1,...
//! ```
//!
//! Bare bodies without a header (the legacy form) are always accepted by
//! [`PermutationReader`]; the grid size must then be supplied by the caller.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::permutation::OriginForm;

const MAGIC: &str = "#tilecipher";

/// Sidecar encoding chosen when writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SidecarFormat {
    /// Bare comma-separated integers.
    Legacy,
    /// Header line with grid size, frame count and checksum, then the body.
    #[default]
    Headered,
}

fn tile_count(grid_size: usize) -> Result<usize> {
    if grid_size < 2 {
        return Err(Error::Sidecar(format!("grid size {grid_size} is too small")));
    }
    grid_size
        .checked_mul(grid_size)
        .ok_or_else(|| Error::Sidecar(format!("grid size {grid_size} is too large")))
}

fn digest(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Collects per-frame permutations and writes them out as one record.
///
/// Nothing reaches the inner writer until [`PermutationWriter::finish`].
#[derive(Debug)]
pub struct PermutationWriter<W: Write> {
    inner: W,
    grid_size: usize,
    tile_count: usize,
    format: SidecarFormat,
    entries: Vec<usize>,
    frames: usize,
}

impl PermutationWriter<BufWriter<File>> {
    /// Create (or truncate) a sidecar file at `path`.
    pub fn create(path: impl AsRef<Path>, grid_size: usize, format: SidecarFormat) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), grid_size, format)
    }
}

impl<W: Write> PermutationWriter<W> {
    pub fn new(inner: W, grid_size: usize, format: SidecarFormat) -> Result<Self> {
        Ok(Self {
            inner,
            grid_size,
            tile_count: tile_count(grid_size)?,
            format,
            entries: Vec::new(),
            frames: 0,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Number of permutations appended so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Append the permutation of the next frame.
    pub fn push(&mut self, perm: &OriginForm) -> Result<()> {
        if perm.len() != self.tile_count {
            return Err(Error::PermutationMalformed {
                expected: self.tile_count,
                reason: format!("cannot store permutation of {} entries", perm.len()),
            });
        }

        self.entries.extend_from_slice(perm.as_slice());
        self.frames += 1;
        Ok(())
    }

    /// Write the whole record, flush, and hand back the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let body = self
            .entries
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(",");

        if self.format == SidecarFormat::Headered {
            writeln!(
                self.inner,
                "{MAGIC} grid={} tiles={} frames={} sha256={}",
                self.grid_size,
                self.tile_count,
                self.frames,
                digest(&body),
            )?;
        }
        self.inner.write_all(body.as_bytes())?;
        self.inner.flush()?;

        tracing::debug!(frames = self.frames, format = ?self.format, "sidecar written");
        Ok(self.inner)
    }
}

#[derive(Debug, Default)]
struct Header {
    grid_size: Option<usize>,
    tiles: Option<usize>,
    frames: Option<usize>,
    sha256: Option<String>,
}

fn parse_header(line: &str) -> Result<Header> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some(MAGIC) {
        return Err(Error::Sidecar(format!("unrecognized header {line:?}")));
    }

    let number = |key: &str, value: &str| {
        value
            .parse::<usize>()
            .map_err(|_| Error::Sidecar(format!("header field {key} has bad value {value:?}")))
    };

    let mut header = Header::default();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            return Err(Error::Sidecar(format!("bad header field {field:?}")));
        };
        match key {
            "grid" => header.grid_size = Some(number(key, value)?),
            "tiles" => header.tiles = Some(number(key, value)?),
            "frames" => header.frames = Some(number(key, value)?),
            "sha256" => header.sha256 = Some(value.to_ascii_lowercase()),
            _ => tracing::debug!(key, "ignoring unknown sidecar header field"),
        }
    }

    Ok(header)
}

fn parse_body(body: &str) -> Result<Vec<usize>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split(',')
        .enumerate()
        .map(|(i, tok)| {
            let tok = tok.trim();
            tok.parse::<usize>()
                .map_err(|_| Error::Sidecar(format!("entry {i} is not an index: {tok:?}")))
        })
        .collect()
}

/// Reads a whole sidecar up front and hands out one permutation per frame,
/// strictly in the order they were written.
#[derive(Debug)]
pub struct PermutationReader {
    grid_size: usize,
    tile_count: usize,
    chunks: VecDeque<Vec<usize>>,
    total: usize,
    consumed: usize,
    checksum_verified: bool,
}

impl PermutationReader {
    /// Read and parse the sidecar file at `path`.
    pub fn open(path: impl AsRef<Path>, grid_size: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::SourceUnavailable {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, grid_size)
    }

    /// Parse sidecar text, headered or legacy.
    ///
    /// `grid_size` is required for legacy text. When the header also names a
    /// grid size both must agree.
    pub fn parse(text: &str, grid_size: Option<usize>) -> Result<Self> {
        let text = text.trim_start();
        let (header, body) = if text.starts_with(MAGIC) {
            let (line, rest) = text.split_once('\n').unwrap_or((text, ""));
            (Some(parse_header(line)?), rest)
        } else {
            (None, text)
        };
        let body = body.trim();

        let header_grid = header.as_ref().and_then(|h| h.grid_size);
        let grid_size = match (header_grid, grid_size) {
            (Some(a), Some(b)) if a != b => {
                return Err(Error::Sidecar(format!(
                    "sidecar was written for grid size {a}, not {b}"
                )));
            }
            (Some(g), _) | (None, Some(g)) => g,
            (None, None) => {
                return Err(Error::Sidecar(
                    "sidecar has no header, a grid size must be given".into(),
                ));
            }
        };
        let tile_count = tile_count(grid_size)?;

        let mut checksum_verified = false;
        if let Some(header) = &header {
            if let Some(tiles) = header.tiles.filter(|&t| t != tile_count) {
                return Err(Error::Sidecar(format!(
                    "header claims {tiles} tiles per frame, grid size {grid_size} has {tile_count}"
                )));
            }
            if let Some(expected) = &header.sha256 {
                if *expected != digest(body) {
                    return Err(Error::Sidecar("sha256 checksum mismatch".into()));
                }
                checksum_verified = true;
            }
        }

        let values = parse_body(body)?;
        if values.len() % tile_count != 0 {
            return Err(Error::PermutationMalformed {
                expected: tile_count,
                reason: format!(
                    "{} entries leave a partial chunk of {}",
                    values.len(),
                    values.len() % tile_count
                ),
            });
        }

        let chunks: VecDeque<_> = values.chunks(tile_count).map(<[usize]>::to_vec).collect();
        let total = chunks.len();

        if let Some(frames) = header.as_ref().and_then(|h| h.frames) {
            if frames != total {
                return Err(Error::StreamDesynchronization {
                    frames,
                    permutations: total,
                });
            }
        }

        tracing::debug!(grid_size, frames = total, checksum_verified, "sidecar loaded");
        Ok(Self {
            grid_size,
            tile_count,
            chunks,
            total,
            consumed: 0,
            checksum_verified,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Total number of frames recorded in the sidecar.
    pub fn frames(&self) -> usize {
        self.total
    }

    /// Permutations not yet handed out.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }

    pub fn checksum_verified(&self) -> bool {
        self.checksum_verified
    }

    /// Pop the permutation of the next frame.
    ///
    /// Fails with [`Error::StreamDesynchronization`] once the sidecar is
    /// exhausted, and with [`Error::PermutationMalformed`] if the chunk is
    /// not a bijection.
    pub fn next_permutation(&mut self) -> Result<OriginForm> {
        let chunk = self
            .chunks
            .pop_front()
            .ok_or(Error::StreamDesynchronization {
                frames: self.consumed + 1,
                permutations: self.total,
            })?;
        self.consumed += 1;

        OriginForm::with_len(chunk, self.tile_count)
    }

    /// Check that every permutation was consumed.
    pub fn finish(self) -> Result<()> {
        if !self.chunks.is_empty() {
            return Err(Error::StreamDesynchronization {
                frames: self.consumed,
                permutations: self.total,
            });
        }
        Ok(())
    }
}
