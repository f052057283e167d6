// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frame sources and sinks
//!
//! Decoding and encoding video is somebody else's job.  A source hands
//! over every frame of the clip, its frame rate and its size; a sink
//! takes the finished frames and the frame rate.  The image-sequence
//! pair here reads and writes a directory of numbered stills, which is
//! what `ffmpeg -i clip.mp4 frames/%06d.png` and friends produce and
//! consume.

use crate::batch::Frame;
use crate::error::{ResizeError, Result};
use image::{ImageFormat, Pixel, Rgb};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SourceVideo<P: Pixel> {
    pub frames: Vec<Frame<P>>,
    pub frame_rate: f64,
    pub dimensions: (u32, u32),
}

pub trait FrameSource<P: Pixel> {
    fn read(&mut self) -> Result<SourceVideo<P>>;
}

pub trait FrameSink<P: Pixel> {
    fn write(&mut self, frames: &[Frame<P>], frame_rate: f64) -> Result<()>;
}

/// A directory of still images, one per frame, taken in file name
/// order.  Stills carry no frame rate, so the caller supplies one.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    directory: PathBuf,
    frame_rate: f64,
}

impl ImageSequenceSource {
    pub fn new<P: AsRef<Path>>(directory: P, frame_rate: f64) -> Self {
        ImageSequenceSource {
            directory: directory.as_ref().to_path_buf(),
            frame_rate,
        }
    }

    fn frame_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.directory).map_err(|e| {
            ResizeError::input(format!(
                "cannot read frames from {}: {}",
                self.directory.display(),
                e
            ))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ResizeError::input(format!("cannot list frames: {}", e)))?
                .path();
            if path.is_file() && ImageFormat::from_path(&path).is_ok() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl FrameSource<Rgb<u8>> for ImageSequenceSource {
    fn read(&mut self) -> Result<SourceVideo<Rgb<u8>>> {
        if !(self.frame_rate > 0.0) {
            return Err(ResizeError::input(format!(
                "frame rate must be positive, got {}",
                self.frame_rate
            )));
        }
        let paths = self.frame_paths()?;
        if paths.is_empty() {
            return Err(ResizeError::input(format!(
                "no frames found in {}",
                self.directory.display()
            )));
        }
        let frames = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                image::open(path)
                    .map(|image| image.to_rgb8())
                    .map_err(|e| {
                        ResizeError::input(format!("cannot decode {}: {}", path.display(), e))
                            .in_frame(i)
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let dimensions = frames[0].dimensions();
        Ok(SourceVideo {
            frames,
            frame_rate: self.frame_rate,
            dimensions,
        })
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory,
/// creating it if need be.
#[derive(Debug, Clone)]
pub struct ImageSequenceSink {
    directory: PathBuf,
}

impl ImageSequenceSink {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        ImageSequenceSink {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("frame_{:06}.png", index))
    }
}

impl FrameSink<Rgb<u8>> for ImageSequenceSink {
    fn write(&mut self, frames: &[Frame<Rgb<u8>>], _frame_rate: f64) -> Result<()> {
        if frames.is_empty() {
            return Err(ResizeError::output("no frames to write"));
        }
        fs::create_dir_all(&self.directory).map_err(|e| {
            ResizeError::output(format!(
                "cannot create {}: {}",
                self.directory.display(),
                e
            ))
        })?;
        // Frames are encoded into a hidden staging directory first, so a
        // failed encode leaves nothing behind in the target.
        let staging = tempfile::Builder::new()
            .prefix(".vidseam-")
            .tempdir_in(&self.directory)
            .map_err(|e| ResizeError::output(format!("cannot stage frames: {}", e)))?;
        let staged = |i: usize| staging.path().join(format!("frame_{:06}.png", i));
        for (i, frame) in frames.iter().enumerate() {
            let path = staged(i);
            frame.save(&path).map_err(|e| {
                ResizeError::output(format!("cannot write {}: {}", path.display(), e)).in_frame(i)
            })?;
        }
        for i in 0..frames.len() {
            if let Err(e) = fs::rename(staged(i), self.frame_path(i)) {
                for moved in 0..i {
                    let _ = fs::remove_file(self.frame_path(moved));
                }
                return Err(ResizeError::output(format!(
                    "cannot move {} into place: {}",
                    self.frame_path(i).display(),
                    e
                ))
                .in_frame(i));
            }
        }
        Ok(())
    }
}

/// Frames already in memory.
pub struct MemorySource<P: Pixel> {
    frames: Vec<Frame<P>>,
    frame_rate: f64,
}

impl<P: Pixel> MemorySource<P> {
    pub fn new(frames: Vec<Frame<P>>, frame_rate: f64) -> Self {
        MemorySource { frames, frame_rate }
    }
}

impl<P: Pixel> FrameSource<P> for MemorySource<P> {
    fn read(&mut self) -> Result<SourceVideo<P>> {
        let frames = self.frames.clone();
        let dimensions = frames
            .first()
            .map(|f| f.dimensions())
            .ok_or_else(|| ResizeError::input("the frame sequence is empty"))?;
        Ok(SourceVideo {
            frames,
            frame_rate: self.frame_rate,
            dimensions,
        })
    }
}

/// Keeps whatever it is given.
pub struct MemorySink<P: Pixel> {
    pub frames: Vec<Frame<P>>,
    pub frame_rate: Option<f64>,
    pub writes: usize,
}

impl<P: Pixel> MemorySink<P> {
    pub fn new() -> Self {
        MemorySink {
            frames: Vec::new(),
            frame_rate: None,
            writes: 0,
        }
    }
}

impl<P: Pixel> Default for MemorySink<P> {
    fn default() -> Self {
        MemorySink::new()
    }
}

impl<P: Pixel> FrameSink<P> for MemorySink<P> {
    fn write(&mut self, frames: &[Frame<P>], frame_rate: f64) -> Result<()> {
        self.frames = frames.to_vec();
        self.frame_rate = Some(frame_rate);
        self.writes += 1;
        Ok(())
    }
}
