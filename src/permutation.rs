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

//! Tile permutations in their two encodings.
//!
//! * [`OriginForm`]: `origin[k]` is the shuffled position source tile `k`
//!   was moved to. This is the form written to sidecar files.
//! * [`PlacementForm`]: `placement[k]` is the source tile now sitting at
//!   shuffled position `k`.
//!
//! Both are validated bijections on `0..N`; they can only be exchanged
//! through [`OriginForm::to_placement`] and [`PlacementForm::to_origin`].

use rand::prelude::*;
use rand_xoshiro::Xoshiro256StarStar;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

fn check_bijection(values: &[usize]) -> Result<()> {
    let n = values.len();
    let mut seen = vec![false; n];

    for (i, &v) in values.iter().enumerate() {
        if v >= n {
            return Err(Error::PermutationMalformed {
                expected: n,
                reason: format!("entry {i} is {v}, out of range"),
            });
        }
        if std::mem::replace(&mut seen[v], true) {
            return Err(Error::PermutationMalformed {
                expected: n,
                reason: format!("value {v} appears more than once"),
            });
        }
    }

    Ok(())
}

fn check_len(values: &[usize], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(Error::PermutationMalformed {
            expected,
            reason: format!("got {} entries", values.len()),
        });
    }
    Ok(())
}

fn invert(values: &[usize]) -> Vec<usize> {
    let mut out = vec![0; values.len()];
    for (i, &v) in values.iter().enumerate() {
        out[v] = i;
    }
    out
}

/// Permutation recorded as "where did each source tile go".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginForm(Vec<usize>);

impl OriginForm {
    /// Validate `values` as a bijection on `0..values.len()`.
    pub fn new(values: Vec<usize>) -> Result<Self> {
        check_bijection(&values)?;
        Ok(Self(values))
    }

    /// Like [`OriginForm::new`], but also requires exactly `expected` entries.
    pub fn with_len(values: Vec<usize>, expected: usize) -> Result<Self> {
        check_len(&values, expected)?;
        Self::new(values)
    }

    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }

    /// Shuffled position of source tile `k`.
    pub fn position_of(&self, k: usize) -> usize {
        self.0[k]
    }

    pub fn to_placement(&self) -> PlacementForm {
        PlacementForm(invert(&self.0))
    }
}

/// Permutation recorded as "which source tile sits here".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlacementForm(Vec<usize>);

impl PlacementForm {
    /// Validate `values` as a bijection on `0..values.len()`.
    pub fn new(values: Vec<usize>) -> Result<Self> {
        check_bijection(&values)?;
        Ok(Self(values))
    }

    pub fn with_len(values: Vec<usize>, expected: usize) -> Result<Self> {
        check_len(&values, expected)?;
        Self::new(values)
    }

    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }

    /// Source tile shown at shuffled position `k`.
    pub fn source_of(&self, k: usize) -> usize {
        self.0[k]
    }

    pub fn to_origin(&self) -> OriginForm {
        OriginForm(invert(&self.0))
    }
}

/// Generate a uniformly random permutation of `n` tiles.
///
/// The shuffled index list is the placement form; it is validated before
/// being converted to the origin form that callers store.
pub fn generate<R>(n: usize, random: &mut R) -> Result<OriginForm>
where
    R: Rng + ?Sized,
{
    let mut indices: Vec<_> = (0..n).collect();
    indices.shuffle(random);

    let placement = PlacementForm::with_len(indices, n)?;
    Ok(placement.to_origin())
}

/// Build the random source used for permutation generation.
///
/// A seed string is hashed with SHA-256 to get reproducible runs;
/// otherwise the generator is seeded from OS entropy.
pub fn rng_from_seed(seed: Option<&str>) -> Xoshiro256StarStar {
    if let Some(seed) = seed {
        let mut hasher = Sha256::new();
        hasher.update(seed);

        Xoshiro256StarStar::from_seed(hasher.finalize().into())
    } else {
        Xoshiro256StarStar::from_entropy()
    }
}
