// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Content-aware resizing of video by seam carving.
//!
//! Frames are carved in batches.  Within a batch every frame loses (or
//! gains) one seam per step, in lock-step, with an energy function that
//! adds a temporal term to the usual Sobel gradient so that seams avoid
//! the parts of the picture that move.

pub mod batch;
pub mod compute;
pub mod config;
pub mod energy;
pub mod error;
pub mod events;
pub mod flipper;
pub mod lanes;
pub mod pipeline;
pub mod plan;
pub mod seam;
pub mod seamcarver;
pub mod seamfinder;
pub mod sequence;
pub mod twodmap;

pub use batch::{Batch, BatchCoordinator, BatchState, CarvedBatch, Frame, StepRecord};
pub use compute::{select_provider, BatchLease, ComputeProvider, ExecutionStatus, HostProvider};
pub use config::{Config, SeamPolicy};
pub use energy::{combine, spatial_energy, temporal_energy};
pub use error::{Location, ResizeError, Result};
pub use events::{
    Cancellation, Event, EventSink, Level, LogProgress, LogSink, NoProgress, ProgressObserver,
    RecordingSink,
};
pub use pipeline::{Retargeter, RunSummary};
pub use plan::{PlanStep, ResizePlan};
pub use seam::{Axis, Orientation, Seam, SeamOp};
pub use seamcarver::{insert_seam, remove_seam, update_energy};
pub use seamfinder::{find_minimum_seam, DynamicProgramming, SeamFinder};
pub use sequence::{
    FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, MemorySink, MemorySource,
    SourceVideo,
};
pub use twodmap::{EnergyMap, TwoDimensionalMap};
