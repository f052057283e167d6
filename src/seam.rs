// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Seams, and the vocabulary for talking about them.

use crate::error::{ResizeError, Result};
use std::fmt;

/// Which way a seam runs.  A vertical seam runs top to bottom and has
/// one column index per row; removing it narrows the frame.  A
/// horizontal seam runs left to right and has one row index per
/// column.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// The frame dimension being changed.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Axis {
    Width,
    Height,
}

impl Axis {
    /// Changing the width takes vertical seams, and vice versa.
    pub fn orientation(self) -> Orientation {
        match self {
            Axis::Width => Orientation::Vertical,
            Axis::Height => Orientation::Horizontal,
        }
    }

    /// Pick this axis' component out of a (width, height) pair.
    pub fn of(self, (width, height): (u32, u32)) -> u32 {
        match self {
            Axis::Width => width,
            Axis::Height => height,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Axis::Width => write!(f, "width"),
            Axis::Height => write!(f, "height"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SeamOp {
    Remove,
    Insert,
}

/// A connected path of one pixel per row (or column).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seam {
    pub orientation: Orientation,
    pub indices: Vec<u32>,
}

impl Seam {
    pub fn new(orientation: Orientation, indices: Vec<u32>) -> Self {
        Seam {
            orientation,
            indices,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The (width, height) of something of size `dimensions` once this
    /// seam has been removed from it or inserted into it.
    pub fn dimensions_after(&self, op: SeamOp, (width, height): (u32, u32)) -> (u32, u32) {
        match (self.orientation, op) {
            (Orientation::Vertical, SeamOp::Remove) => (width.saturating_sub(1), height),
            (Orientation::Vertical, SeamOp::Insert) => (width + 1, height),
            (Orientation::Horizontal, SeamOp::Remove) => (width, height.saturating_sub(1)),
            (Orientation::Horizontal, SeamOp::Insert) => (width, height + 1),
        }
    }

    /// Check the seam against the (width, height) of whatever it is
    /// about to cut: one index per row or column, every index in range,
    /// and no jumps of more than one between neighbours.
    pub fn validate(&self, (width, height): (u32, u32)) -> Result<()> {
        let (length, bound) = match self.orientation {
            Orientation::Vertical => (height, width),
            Orientation::Horizontal => (width, height),
        };
        if self.indices.len() != length as usize {
            return Err(ResizeError::algorithm(format!(
                "{:?} seam has {} entries, expected {}",
                self.orientation,
                self.indices.len(),
                length
            )));
        }
        if let Some(bad) = self.indices.iter().find(|&&i| i >= bound) {
            return Err(ResizeError::algorithm(format!(
                "{:?} seam index {} out of range 0..{}",
                self.orientation, bad, bound
            )));
        }
        if let Some(pos) = self
            .indices
            .windows(2)
            .position(|w| (i64::from(w[0]) - i64::from(w[1])).abs() > 1)
        {
            return Err(ResizeError::algorithm(format!(
                "{:?} seam breaks connectivity between entries {} and {}",
                self.orientation,
                pos,
                pos + 1
            )));
        }
        Ok(())
    }
}
