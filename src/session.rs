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

//! Interactive encrypt/decrypt toggling over a live stream.
//!
//! A [`Session`] owns everything the interactive loop needs: the current
//! [`Mode`], the random source and the most recent permutation. The
//! permutation lives in memory only and is never written to a sidecar.
//!
//! Decryption reuses the last recorded permutation for *every* following
//! frame, not only the frame it was generated for. On a live feed this
//! only restores the picture while the scene is static; it is kept that
//! way on purpose.

use ndarray::prelude::*;
use rand::Rng;

use crate::error::{Error, Result};
use crate::grid::GridSpec;
use crate::permutation::{generate, OriginForm};
use crate::shuffle::{shuffle_frame, unshuffle_frame};

pub const MIN_GRID_SIZE: usize = 2;
pub const MAX_GRID_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Passthrough,
    Encrypting,
    Decrypting,
}

/// Keyboard commands understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Encrypt,
    Decrypt,
    Quit,
}

impl Key {
    /// `e`, `d` and `q`; anything else is ignored.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'e' => Some(Self::Encrypt),
            'd' => Some(Self::Decrypt),
            'q' => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct Session<R> {
    grid_size: usize,
    mode: Mode,
    grid: Option<GridSpec>,
    last: Option<OriginForm>,
    random: R,
}

impl<R: Rng> Session<R> {
    /// Start in passthrough. Grid size must be within
    /// [`MIN_GRID_SIZE`]`..=`[`MAX_GRID_SIZE`].
    pub fn new(grid_size: usize, random: R) -> Result<Self> {
        if !(MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size) {
            return Err(Error::InvalidGridSpec {
                grid_size,
                reason: format!("interactive grid size must be {MIN_GRID_SIZE} to {MAX_GRID_SIZE}"),
            });
        }

        Ok(Self {
            grid_size,
            mode: Mode::Passthrough,
            grid: None,
            last: None,
            random,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn last_permutation(&self) -> Option<&OriginForm> {
        self.last.as_ref()
    }

    /// Flip encryption; decryption is always switched off.
    pub fn toggle_encrypt(&mut self) -> Mode {
        self.mode = match self.mode {
            Mode::Encrypting => Mode::Passthrough,
            _ => Mode::Encrypting,
        };
        self.mode
    }

    /// Flip decryption; encryption is always switched off.
    ///
    /// Without a recorded permutation this fails with
    /// [`Error::EmptyPermutation`] and the mode is left untouched.
    pub fn toggle_decrypt(&mut self) -> Result<Mode> {
        if self.last.is_none() {
            return Err(Error::EmptyPermutation);
        }

        self.mode = match self.mode {
            Mode::Decrypting => Mode::Passthrough,
            _ => Mode::Decrypting,
        };
        Ok(self.mode)
    }

    /// Apply a key press. Only [`Key::Quit`] ends the session.
    pub fn handle_key(&mut self, key: Key) -> Control {
        match key {
            Key::Encrypt => {
                let mode = self.toggle_encrypt();
                tracing::info!(encryption = mode == Mode::Encrypting, "toggled encryption");
            }
            Key::Decrypt => match self.toggle_decrypt() {
                Ok(mode) => {
                    tracing::info!(decryption = mode == Mode::Decrypting, "toggled decryption");
                }
                Err(e) => tracing::warn!("{e}"),
            },
            Key::Quit => return Control::Quit,
        }
        Control::Continue
    }

    fn grid_for(&mut self, frame: &ArrayView3<'_, u8>) -> Result<GridSpec> {
        let (h, w, _) = frame.dim();
        match self.grid {
            Some(grid) if grid.matches(w, h) => Ok(grid),
            _ => {
                let grid = GridSpec::new(self.grid_size, w, h)?;
                tracing::debug!(?grid, "derived grid for new resolution");
                self.grid = Some(grid);
                Ok(grid)
            }
        }
    }

    /// Drop back to passthrough, keeping the recorded permutation.
    pub fn passthrough(&mut self) {
        self.mode = Mode::Passthrough;
    }

    /// Produce the frame to display for `frame` in the current mode.
    ///
    /// The result always has the resolution of `frame`; remainder pixels
    /// outside the tile grid are black while encrypting or decrypting.
    pub fn process(&mut self, frame: ArrayView3<'_, u8>) -> Result<Array3<u8>> {
        let tiles = match self.mode {
            Mode::Passthrough => return Ok(frame.to_owned()),
            Mode::Encrypting => {
                let grid = self.grid_for(&frame)?;
                let perm = generate(grid.tile_count(), &mut self.random)?;
                let out = shuffle_frame(frame.view(), &grid, &perm)?;
                self.last = Some(perm);
                out
            }
            Mode::Decrypting => {
                let grid = self.grid_for(&frame)?;
                let perm = self.last.as_ref().ok_or(Error::EmptyPermutation)?;
                unshuffle_frame(frame.view(), &grid, perm)?
            }
        };

        if tiles.dim() == frame.dim() {
            return Ok(tiles);
        }
        let mut out = Array3::zeros(frame.dim());
        let (h, w, _) = tiles.dim();
        out.slice_mut(s![..h, ..w, ..]).assign(&tiles);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permutation::rng_from_seed;

    fn session() -> Session<rand_xoshiro::Xoshiro256StarStar> {
        Session::new(4, rng_from_seed(Some("session"))).unwrap()
    }

    fn frame() -> Array3<u8> {
        Array3::from_shape_fn((32, 48, 3), |(y, x, c)| (y * 5 + x + c * 40) as u8)
    }

    #[test]
    fn grid_range_is_enforced() {
        assert!(Session::new(1, rng_from_seed(None)).is_err());
        assert!(Session::new(65, rng_from_seed(None)).is_err());
        assert!(Session::new(64, rng_from_seed(None)).is_ok());
    }

    #[test]
    fn decrypt_before_encrypt_is_a_notice() {
        let mut s = session();
        assert!(matches!(s.toggle_decrypt(), Err(Error::EmptyPermutation)));
        assert_eq!(s.handle_key(Key::Decrypt), Control::Continue);
        assert_eq!(s.mode(), Mode::Passthrough);
    }

    #[test]
    fn toggles_are_mutually_exclusive() {
        let mut s = session();
        let f = frame();

        assert_eq!(s.toggle_encrypt(), Mode::Encrypting);
        s.process(f.view()).unwrap();
        assert!(s.last_permutation().is_some());

        assert_eq!(s.toggle_decrypt().unwrap(), Mode::Decrypting);
        assert_eq!(s.toggle_encrypt(), Mode::Encrypting);
        assert_eq!(s.toggle_encrypt(), Mode::Passthrough);
        assert_eq!(s.toggle_decrypt().unwrap(), Mode::Decrypting);
        assert_eq!(s.toggle_decrypt().unwrap(), Mode::Passthrough);
        assert_eq!(s.handle_key(Key::Quit), Control::Quit);
    }

    #[test]
    fn decrypt_restores_last_encrypted_frame() {
        let mut s = session();
        let f = frame();

        assert_eq!(s.process(f.view()).unwrap(), f);

        s.handle_key(Key::Encrypt);
        let encrypted = s.process(f.view()).unwrap();
        assert_ne!(encrypted, f);

        s.handle_key(Key::Decrypt);
        assert_eq!(s.mode(), Mode::Decrypting);
        assert_eq!(s.process(encrypted.view()).unwrap(), f);
        // The same permutation keeps being applied to later frames.
        assert_eq!(s.process(encrypted.view()).unwrap(), f);
    }

    #[test]
    fn display_keeps_frame_resolution() {
        let mut s = session();
        let f = Array3::from_shape_fn((30, 50, 1), |(y, x, _)| (y * 50 + x) as u8);

        s.toggle_encrypt();
        let encrypted = s.process(f.view()).unwrap();
        assert_eq!(encrypted.dim(), f.dim());
        assert!(encrypted.slice(s![28.., .., ..]).iter().all(|&v| v == 0));
        assert!(encrypted.slice(s![.., 48.., ..]).iter().all(|&v| v == 0));

        s.toggle_decrypt().unwrap();
        let decrypted = s.process(encrypted.view()).unwrap();
        assert_eq!(decrypted.slice(s![..28, ..48, ..]), f.slice(s![..28, ..48, ..]));
    }

    #[test]
    fn keys_from_chars() {
        assert_eq!(Key::from_char('e'), Some(Key::Encrypt));
        assert_eq!(Key::from_char('D'), Some(Key::Decrypt));
        assert_eq!(Key::from_char('q'), Some(Key::Quit));
        assert_eq!(Key::from_char('.'), None);
    }
}
