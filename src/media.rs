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

//! Frame sources and sinks.
//!
//! The pipeline only needs "next frame or end of stream" on the input side
//! and "append a frame" on the output side. Image sequences (one still image
//! per frame in a directory) and in-memory buffers are provided.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::error::{ParameterError, ParameterErrorKind};
use image::io::Reader as ImageReader;
use image::{save_buffer, ColorType, DynamicImage, ImageError, ImageFormat};
use ndarray::prelude::*;

use crate::error::{Error, Result};

/// Producer of frames, in stream order.
pub trait FrameSource {
    /// `(width, height)` of the frames this source produces.
    fn dimensions(&self) -> (usize, usize);

    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Array3<u8>>>;
}

/// Consumer of frames of fixed dimensions, in emission order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: ArrayView3<'_, u8>) -> Result<()>;

    /// Release the sink. Called on every exit path of a pipeline run.
    fn finish(&mut self) -> Result<()>;
}

fn unavailable(path: &Path, reason: impl ToString) -> Error {
    Error::SourceUnavailable {
        path: path.to_owned(),
        reason: reason.to_string(),
    }
}

fn frame_dims(frame: &ArrayView3<'_, u8>) -> (usize, usize) {
    let (h, w, _) = frame.dim();
    (w, h)
}

/// Convert a decoded image to a `(height, width, channels)` byte array.
///
/// 8-bit images keep their channel layout, anything else is narrowed to
/// RGB or RGBA.
pub fn image_to_array(im: DynamicImage) -> Result<Array3<u8>> {
    let (w, h) = (im.width() as usize, im.height() as usize);
    let (channels, bytes) = match im {
        DynamicImage::ImageLuma8(b) => (1, b.into_raw()),
        DynamicImage::ImageLumaA8(b) => (2, b.into_raw()),
        DynamicImage::ImageRgb8(b) => (3, b.into_raw()),
        DynamicImage::ImageRgba8(b) => (4, b.into_raw()),
        im if im.color().has_alpha() => (4, im.into_rgba8().into_raw()),
        im => (3, im.into_rgb8().into_raw()),
    };

    Ok(Array3::from_shape_vec((h, w, channels), bytes)?)
}

/// Write a `(height, width, channels)` byte array as an image file.
pub fn save_array(path: impl AsRef<Path>, frame: ArrayView3<'_, u8>) -> Result<()> {
    let (h, w, c) = frame.dim();
    let color = match c {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        _ => {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::Generic(format!("cannot save frame with {c} channels")),
            ))
            .into())
        }
    };

    let frame = frame.as_standard_layout();
    save_buffer(
        path,
        frame.as_slice().expect("Should be standard-layout"),
        w as _,
        h as _,
        color,
    )?;
    Ok(())
}

fn load_frame(path: &Path) -> Result<Array3<u8>> {
    let im = ImageReader::new(BufReader::new(File::open(path)?))
        .with_guessed_format()?
        .decode()?;
    image_to_array(im)
}

/// Directory of still images, read in lexical file name order.
#[derive(Debug)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
    pending: Option<Array3<u8>>,
    dims: (usize, usize),
}

impl ImageSequence {
    /// Open `dir` and decode its first frame to learn the resolution.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| unavailable(dir, e))? {
            let path = entry?.path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort_unstable();

        let mut paths = VecDeque::from(paths);
        let Some(first) = paths.pop_front() else {
            return Err(unavailable(dir, "no image frames found"));
        };
        let frame = load_frame(&first).map_err(|e| unavailable(&first, e))?;
        let dims = frame_dims(&frame.view());

        tracing::debug!(dir = %dir.display(), frames = paths.len() + 1, ?dims, "opened image sequence");
        Ok(Self {
            paths,
            pending: Some(frame),
            dims,
        })
    }

    /// Frames not yet returned.
    pub fn remaining(&self) -> usize {
        self.paths.len() + usize::from(self.pending.is_some())
    }
}

impl FrameSource for ImageSequence {
    fn dimensions(&self) -> (usize, usize) {
        self.dims
    }

    fn next_frame(&mut self) -> Result<Option<Array3<u8>>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        match self.paths.pop_front() {
            Some(path) => load_frame(&path).map(Some),
            None => Ok(None),
        }
    }
}

/// Writes frames as `frame_000000.png`, `frame_000001.png`, ... into a
/// directory. All frames must share the resolution of the first one.
#[derive(Debug)]
pub struct ImageSequenceWriter {
    dir: PathBuf,
    written: usize,
    dims: Option<(usize, usize)>,
}

impl ImageSequenceWriter {
    /// Create `dir` (and parents) if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: 0,
            dims: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for ImageSequenceWriter {
    fn write_frame(&mut self, frame: ArrayView3<'_, u8>) -> Result<()> {
        let actual = frame_dims(&frame);
        let expected = *self.dims.get_or_insert(actual);
        if expected != actual {
            return Err(Error::FrameMismatch { expected, actual });
        }

        save_array(self.dir.join(format!("frame_{:06}.png", self.written)), frame)?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        tracing::debug!(dir = %self.dir.display(), frames = self.written, "image sequence closed");
        Ok(())
    }
}

/// Frames held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    frames: VecDeque<Array3<u8>>,
    dims: (usize, usize),
}

impl MemorySource {
    pub fn new(frames: Vec<Array3<u8>>) -> Self {
        let dims = frames
            .first()
            .map(|f| frame_dims(&f.view()))
            .unwrap_or_default();
        Self {
            frames: frames.into(),
            dims,
        }
    }
}

impl FrameSource for MemorySource {
    fn dimensions(&self) -> (usize, usize) {
        self.dims
    }

    fn next_frame(&mut self) -> Result<Option<Array3<u8>>> {
        Ok(self.frames.pop_front())
    }
}

/// Collects emitted frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<Array3<u8>>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: ArrayView3<'_, u8>) -> Result<()> {
        if let Some(first) = self.frames.first() {
            let expected = frame_dims(&first.view());
            let actual = frame_dims(&frame);
            if expected != actual {
                return Err(Error::FrameMismatch { expected, actual });
            }
        }
        self.frames.push(frame.to_owned());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
