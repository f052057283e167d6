// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors
//!
//! Everything that can go wrong during a retargeting run falls into one
//! of four buckets: bad input, not enough resources, a broken internal
//! invariant, or a sink that refused the result.  Every error carries
//! the batch and frame where it was first noticed.

use failure::Fail;
use std::fmt;

/// Where in the run an error was first detected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub batch: Option<usize>,
    pub frame: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.batch, self.frame) {
            (Some(b), Some(fr)) => write!(f, "batch {}, frame {}", b, fr),
            (Some(b), None) => write!(f, "batch {}", b),
            (None, Some(fr)) => write!(f, "frame {}", fr),
            (None, None) => write!(f, "run"),
        }
    }
}

#[derive(Debug, Fail)]
pub enum ResizeError {
    /// Unreadable source, empty or ragged frame sequence, nonsense
    /// targets or settings.
    #[fail(display = "input error ({}): {}", location, message)]
    Input { location: Location, message: String },

    /// No compute context, or a batch that will not fit the budget.
    #[fail(display = "resource error ({}): {}", location, message)]
    Resource { location: Location, message: String },

    /// An internal invariant broke.  Always a bug.
    #[fail(display = "algorithm error ({}): {}", location, message)]
    Algorithm { location: Location, message: String },

    /// The frame sink would not take the result.
    #[fail(display = "output error ({}): {}", location, message)]
    Output { location: Location, message: String },

    /// Someone asked us to stop between two seam steps.
    #[fail(
        display = "cancelled ({}) after {} completed seam steps",
        location, completed_steps
    )]
    Cancelled {
        location: Location,
        completed_steps: usize,
    },
}

impl ResizeError {
    pub fn input<S: Into<String>>(message: S) -> Self {
        ResizeError::Input {
            location: Location::default(),
            message: message.into(),
        }
    }

    pub fn resource<S: Into<String>>(message: S) -> Self {
        ResizeError::Resource {
            location: Location::default(),
            message: message.into(),
        }
    }

    pub fn algorithm<S: Into<String>>(message: S) -> Self {
        ResizeError::Algorithm {
            location: Location::default(),
            message: message.into(),
        }
    }

    pub fn output<S: Into<String>>(message: S) -> Self {
        ResizeError::Output {
            location: Location::default(),
            message: message.into(),
        }
    }

    pub fn cancelled(completed_steps: usize) -> Self {
        ResizeError::Cancelled {
            location: Location::default(),
            completed_steps,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            ResizeError::Input { location, .. }
            | ResizeError::Resource { location, .. }
            | ResizeError::Algorithm { location, .. }
            | ResizeError::Output { location, .. }
            | ResizeError::Cancelled { location, .. } => *location,
        }
    }

    fn location_mut(&mut self) -> &mut Location {
        match self {
            ResizeError::Input { location, .. }
            | ResizeError::Resource { location, .. }
            | ResizeError::Algorithm { location, .. }
            | ResizeError::Output { location, .. }
            | ResizeError::Cancelled { location, .. } => location,
        }
    }

    /// Attribute the error to a batch, unless it already has one.  The
    /// first place an error is seen wins.
    pub fn in_batch(mut self, batch: usize) -> Self {
        let location = self.location_mut();
        location.batch = location.batch.or(Some(batch));
        self
    }

    /// Attribute the error to a frame, unless it already has one.
    pub fn in_frame(mut self, frame: usize) -> Self {
        let location = self.location_mut();
        location.frame = location.frame.or(Some(frame));
        self
    }

    pub fn is_resource(&self) -> bool {
        match self {
            ResizeError::Resource { .. } => true,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            ResizeError::Cancelled { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResizeError>;
