// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run configuration

use crate::error::{ResizeError, Result};
use std::str::FromStr;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_TEMPORAL_WEIGHT: f64 = 0.3;
pub const DEFAULT_BAND_WIDTH: u32 = 2;
pub const DEFAULT_MEMORY_BUDGET: u64 = 2048 * 1024 * 1024;

/// How seams are chosen for the frames of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeamPolicy {
    /// Every frame gets the cheapest seam through its own energy map.
    PerFrame,
    /// One seam, found on the mean energy of the whole batch, is cut
    /// from every frame.
    Shared,
}

impl Default for SeamPolicy {
    fn default() -> Self {
        SeamPolicy::PerFrame
    }
}

impl FromStr for SeamPolicy {
    type Err = ResizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "per-frame" => Ok(SeamPolicy::PerFrame),
            "shared" => Ok(SeamPolicy::Shared),
            other => Err(ResizeError::input(format!(
                "unknown seam policy '{}', expected 'per-frame' or 'shared'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub target_width: u32,
    pub target_height: u32,
    /// Frames carved together under one plan.
    pub batch_size: usize,
    /// Share of the temporal term in the combined energy, in [0, 1].
    pub temporal_weight: f64,
    /// Warn once per batch when an axis grows or shrinks by more than
    /// this factor.  Unset means never warn.
    pub distortion_ratio: Option<f64>,
    /// Cells on either side of a seam whose energy is recomputed after
    /// each edit.
    pub band_width: u32,
    /// Bytes of working memory a single batch may claim.
    pub memory_budget: u64,
    pub seam_policy: SeamPolicy,
    pub lanes: usize,
    pub prefer_accelerator: bool,
}

#[cfg(feature = "threaded")]
fn default_lanes() -> usize {
    num_cpus::get()
}

#[cfg(not(feature = "threaded"))]
fn default_lanes() -> usize {
    1
}

impl Config {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Config {
            target_width,
            target_height,
            batch_size: DEFAULT_BATCH_SIZE,
            temporal_weight: DEFAULT_TEMPORAL_WEIGHT,
            distortion_ratio: None,
            band_width: DEFAULT_BAND_WIDTH,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            seam_policy: SeamPolicy::default(),
            lanes: default_lanes(),
            prefer_accelerator: false,
        }
    }

    pub fn target(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(ResizeError::input(format!(
                "target dimensions {}x{} must both be positive",
                self.target_width, self.target_height
            )));
        }
        if self.batch_size == 0 {
            return Err(ResizeError::input("batch size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.temporal_weight) {
            return Err(ResizeError::input(format!(
                "temporal weight must be between 0 and 1, got {}",
                self.temporal_weight
            )));
        }
        if let Some(ratio) = self.distortion_ratio {
            if !(ratio > 0.0) {
                return Err(ResizeError::input(format!(
                    "distortion ratio must be positive, got {}",
                    ratio
                )));
            }
        }
        if self.lanes == 0 {
            return Err(ResizeError::input("lanes must be at least 1"));
        }
        Ok(())
    }
}
