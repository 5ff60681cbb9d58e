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

//! Batch runs over whole streams.
//!
//! Encrypting writes every shuffled frame to a sink and its permutation to
//! a sidecar. Decrypting reads the sidecar fully, then pairs permutation
//! `t` with frame `t` in strict order. Sinks and sidecar writers are
//! finished on every exit path, including errors and cancellation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::Config;
use crate::error::Result;
use crate::grid::GridSpec;
use crate::media::{FrameSink, FrameSource, ImageSequence, ImageSequenceWriter};
use crate::permutation::generate;
use crate::session::{Control, Key, Session};
use crate::shuffle::{shuffle_frame, unshuffle_frame};
use crate::store::{PermutationReader, PermutationWriter};

/// Shared stop flag, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one pass over a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub frames: usize,
    pub grid: Option<GridSpec>,
    pub cancelled: bool,
}

impl RunReport {
    fn new(grid: Option<GridSpec>) -> Self {
        Self {
            frames: 0,
            grid,
            cancelled: false,
        }
    }
}

/// Shuffle every frame of `source` into `sink`, recording permutations in
/// `sidecar`.
///
/// The grid is derived from the source resolution before any frame is
/// read. Returns the report and the finished sidecar writer.
pub fn encrypt_stream<S, K, W, R>(
    source: &mut S,
    sink: &mut K,
    mut sidecar: PermutationWriter<W>,
    random: &mut R,
    cancel: &Cancel,
) -> Result<(RunReport, W)>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
    W: Write,
    R: Rng + ?Sized,
{
    let (w, h) = source.dimensions();
    let grid = GridSpec::new(sidecar.grid_size(), w, h)?;
    let mut report = RunReport::new(Some(grid));

    let result = (|| -> Result<()> {
        while !cancel.is_cancelled() {
            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };

            let perm = generate(grid.tile_count(), &mut *random)?;
            let out = shuffle_frame(frame.view(), &grid, &perm)?;
            sink.write_frame(out.view())?;
            sidecar.push(&perm)?;

            report.frames += 1;
            tracing::debug!(frame = report.frames, "encrypted frame");
        }
        report.cancelled = true;
        Ok(())
    })();

    let sink_done = sink.finish();
    let sidecar_done = sidecar.finish();
    result?;
    sink_done?;
    let inner = sidecar_done?;

    tracing::info!(frames = report.frames, cancelled = report.cancelled, "encrypt pass done");
    Ok((report, inner))
}

/// Restore every frame of `source` into `sink` using the permutations in
/// `sidecar`, one per frame, in order.
///
/// Running out of permutations, or finishing the stream with permutations
/// left over, is a [`crate::Error::StreamDesynchronization`]. Frames emitted
/// before the error stay in the sink.
pub fn decrypt_stream<S, K>(
    source: &mut S,
    sink: &mut K,
    mut sidecar: PermutationReader,
    cancel: &Cancel,
) -> Result<RunReport>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let (w, h) = source.dimensions();
    let grid = GridSpec::tiled(sidecar.grid_size(), w, h)?;
    let mut report = RunReport::new(Some(grid));

    let result = (|| -> Result<()> {
        while !cancel.is_cancelled() {
            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };

            let perm = sidecar.next_permutation()?;
            let out = unshuffle_frame(frame.view(), &grid, &perm)?;
            sink.write_frame(out.view())?;

            report.frames += 1;
            tracing::debug!(frame = report.frames, "decrypted frame");
        }
        report.cancelled = true;
        Ok(())
    })();

    let sink_done = sink.finish();
    result?;
    sink_done?;
    if !report.cancelled {
        sidecar.finish()?;
    }

    tracing::info!(frames = report.frames, cancelled = report.cancelled, "decrypt pass done");
    Ok(report)
}

/// Drive an interactive [`Session`] with one optional key per frame.
///
/// Each key is applied after its frame was emitted, the way a live loop
/// polls the keyboard after showing a frame. A frame the session cannot
/// process is emitted unchanged and the session drops to passthrough.
pub fn replay_stream<S, K, R, I>(
    session: &mut Session<R>,
    source: &mut S,
    sink: &mut K,
    keys: I,
    cancel: &Cancel,
) -> Result<RunReport>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
    R: Rng,
    I: IntoIterator<Item = Option<Key>>,
{
    let mut keys = keys.into_iter();
    let mut report = RunReport::new(None);

    let result = (|| -> Result<()> {
        while !cancel.is_cancelled() {
            let Some(frame) = source.next_frame()? else {
                return Ok(());
            };

            let shown = session.process(frame.view()).unwrap_or_else(|e| {
                tracing::warn!("{e}, falling back to passthrough");
                session.passthrough();
                frame
            });
            sink.write_frame(shown.view())?;
            report.frames += 1;

            if let Some(Some(key)) = keys.next() {
                if session.handle_key(key) == Control::Quit {
                    return Ok(());
                }
            }
        }
        report.cancelled = true;
        Ok(())
    })();

    let sink_done = sink.finish();
    result?;
    sink_done?;
    Ok(report)
}

/// Encrypt an image sequence directory into `output`, writing the sidecar
/// to `sidecar`.
pub fn encrypt_dir(
    config: &Config,
    input: &Path,
    output: &Path,
    sidecar: &Path,
    cancel: &Cancel,
) -> Result<RunReport> {
    let mut source = ImageSequence::open(input)?;
    let (w, h) = source.dimensions();
    config.grid_for(w, h)?;

    let mut sink = ImageSequenceWriter::create(output)?;
    let writer = PermutationWriter::create(sidecar, config.grid_size(), config.sidecar_format())?;
    let mut random = config.random();

    let (report, _) = encrypt_stream(&mut source, &mut sink, writer, &mut random, cancel)?;
    Ok(report)
}

/// Decrypt an image sequence directory into `output` using `sidecar`.
pub fn decrypt_dir(
    input: &Path,
    output: &Path,
    sidecar: &Path,
    grid_size: Option<usize>,
    cancel: &Cancel,
) -> Result<RunReport> {
    let reader = PermutationReader::open(sidecar, grid_size)?;
    let mut source = ImageSequence::open(input)?;
    let mut sink = ImageSequenceWriter::create(output)?;

    decrypt_stream(&mut source, &mut sink, reader, cancel)
}

/// Directories and sidecar used by [`roundtrip`].
#[derive(Debug, Clone)]
pub struct RoundtripPaths {
    pub input: PathBuf,
    pub encrypted: PathBuf,
    pub decrypted: PathBuf,
    pub sidecar: PathBuf,
}

/// Encrypt on a background thread, wait for it to finish (sidecar
/// included), then decrypt its output.
///
/// Decryption is skipped when the encrypt pass was cancelled.
pub fn roundtrip(
    config: &Config,
    paths: &RoundtripPaths,
    cancel: &Cancel,
) -> Result<(RunReport, Option<RunReport>)> {
    let encrypted = std::thread::scope(|scope| {
        scope
            .spawn(|| encrypt_dir(config, &paths.input, &paths.encrypted, &paths.sidecar, cancel))
            .join()
    });
    let encrypted = match encrypted {
        Ok(report) => report?,
        Err(panic) => std::panic::resume_unwind(panic),
    };
    if encrypted.cancelled {
        return Ok((encrypted, None));
    }

    let decrypted = decrypt_dir(
        &paths.encrypted,
        &paths.decrypted,
        &paths.sidecar,
        Some(config.grid_size()),
        cancel,
    )?;
    Ok((encrypted, Some(decrypted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::media::{MemorySink, MemorySource};
    use crate::permutation::rng_from_seed;
    use crate::store::SidecarFormat;
    use ndarray::prelude::*;

    fn frames(n: usize) -> Vec<Array3<u8>> {
        (0..n)
            .map(|t| Array3::from_shape_fn((24, 36, 3), |(y, x, c)| (y * 9 + x * 2 + c + t * 17) as u8))
            .collect()
    }

    fn encrypt(input: Vec<Array3<u8>>, grid_size: usize) -> (MemorySink, String) {
        let mut source = MemorySource::new(input);
        let mut sink = MemorySink::new();
        let writer = PermutationWriter::new(Vec::new(), grid_size, SidecarFormat::Headered).unwrap();
        let (report, text) = encrypt_stream(
            &mut source,
            &mut sink,
            writer,
            &mut rng_from_seed(Some("pipeline")),
            &Cancel::new(),
        )
        .unwrap();
        assert_eq!(report.frames, sink.frames.len());
        (sink, String::from_utf8(text).unwrap())
    }

    #[test]
    fn stream_roundtrip() {
        let input = frames(5);
        let (encrypted, text) = encrypt(input.clone(), 3);
        assert!(encrypted.finished);
        assert_ne!(encrypted.frames, input);

        let reader = PermutationReader::parse(&text, None).unwrap();
        assert_eq!(reader.frames(), 5);

        let mut source = MemorySource::new(encrypted.frames);
        let mut sink = MemorySink::new();
        let report = decrypt_stream(&mut source, &mut sink, reader, &Cancel::new()).unwrap();
        assert_eq!(report.frames, 5);
        assert_eq!(sink.frames, input);
    }

    #[test]
    fn one_pixel_tiles_roundtrip() {
        let input: Vec<_> = (0..2)
            .map(|t| Array3::from_shape_fn((10, 10, 1), |(y, x, _)| (y * 10 + x + t) as u8))
            .collect();
        let (encrypted, text) = encrypt(input.clone(), 9);
        assert_eq!(encrypted.frames[0].dim(), (9, 9, 1));

        let mut sink = MemorySink::new();
        let report = decrypt_stream(
            &mut MemorySource::new(encrypted.frames),
            &mut sink,
            PermutationReader::parse(&text, None).unwrap(),
            &Cancel::new(),
        )
        .unwrap();
        assert_eq!(report.frames, 2);
        for (out, frame) in sink.frames.iter().zip(&input) {
            assert_eq!(out, &frame.slice(s![..9, ..9, ..]));
        }
    }

    #[test]
    fn too_many_frames_is_desync() {
        let (encrypted, text) = encrypt(frames(2), 3);
        let mut more = encrypted.frames.clone();
        more.push(encrypted.frames[0].clone());

        let mut sink = MemorySink::new();
        let err = decrypt_stream(
            &mut MemorySource::new(more),
            &mut sink,
            PermutationReader::parse(&text, None).unwrap(),
            &Cancel::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::StreamDesynchronization {
                frames: 3,
                permutations: 2
            }
        ));
        // Frames up to the last good one are kept and the sink is closed.
        assert_eq!(sink.frames.len(), 2);
        assert!(sink.finished);
    }

    #[test]
    fn too_few_frames_is_desync() {
        let (encrypted, text) = encrypt(frames(3), 3);
        let err = decrypt_stream(
            &mut MemorySource::new(encrypted.frames[..2].to_vec()),
            &mut MemorySink::new(),
            PermutationReader::parse(&text, None).unwrap(),
            &Cancel::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::StreamDesynchronization { .. }));
    }

    #[test]
    fn invalid_grid_rejected_before_any_frame() {
        let mut sink = MemorySink::new();
        let writer = PermutationWriter::new(Vec::new(), 24, SidecarFormat::Legacy).unwrap();
        let err = encrypt_stream(
            &mut MemorySource::new(frames(1)),
            &mut sink,
            writer,
            &mut rng_from_seed(None),
            &Cancel::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidGridSpec { grid_size: 24, .. }));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn cancelled_run_keeps_sidecar_consistent() {
        let cancel = Cancel::new();
        cancel.cancel();

        let mut sink = MemorySink::new();
        let writer = PermutationWriter::new(Vec::new(), 3, SidecarFormat::Headered).unwrap();
        let (report, text) = encrypt_stream(
            &mut MemorySource::new(frames(4)),
            &mut sink,
            writer,
            &mut rng_from_seed(None),
            &cancel,
        )
        .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.frames, 0);
        assert!(sink.finished);

        let reader = PermutationReader::parse(std::str::from_utf8(&text).unwrap(), None).unwrap();
        assert_eq!(reader.frames(), 0);
    }

    #[test]
    fn replay_follows_key_script() {
        let input = frames(5);
        let mut session = Session::new(4, rng_from_seed(Some("replay"))).unwrap();
        let mut sink = MemorySink::new();
        let keys = "de.dq".chars().map(Key::from_char);

        let report = replay_stream(
            &mut session,
            &mut MemorySource::new(input.clone()),
            &mut sink,
            keys,
            &Cancel::new(),
        )
        .unwrap();

        // Frame 0 passthrough ('d' ignored), frame 1 passthrough then 'e',
        // frame 2 encrypted, frame 3 encrypted then 'd', frame 4 decrypted then 'q'.
        assert_eq!(report.frames, 5);
        assert_eq!(sink.frames[0], input[0]);
        assert_eq!(sink.frames[1], input[1]);
        assert_ne!(sink.frames[2], input[2]);
        assert_ne!(sink.frames[3], input[3]);
        assert_eq!(sink.frames.len(), 5);

        // Frame 4 is decrypted with the permutation recorded on frame 3.
        let grid = GridSpec::new(4, 36, 24).unwrap();
        let last = session.last_permutation().unwrap();
        assert_eq!(
            sink.frames[4],
            unshuffle_frame(input[4].view(), &grid, last).unwrap()
        );
        assert!(sink.finished);
    }
}
