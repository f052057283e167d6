// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The retargeting run
//!
//! Read every frame, deal them into batches of `batch_size`, carve the
//! batches one after another, and hand the whole result to the sink in
//! a single write.  The last source frame of each batch is carried into
//! the next as its lead-in, so the temporal term does not start cold at
//! every batch boundary.
//!
//! A batch that runs out of resources is retried once on a fresh
//! compute context.  Anything else that goes wrong ends the run, and
//! the sink never sees a partial result.

use crate::batch::{Batch, BatchCoordinator, CarvedBatch, Frame};
use crate::compute::{
    batch_footprint, select_provider, BatchLease, ComputeProvider, ExecutionStatus, HostProvider,
};
use crate::config::Config;
use crate::error::{ResizeError, Result};
use crate::events::{Cancellation, Event, EventSink, ProgressObserver};
use crate::sequence::{FrameSink, FrameSource};
use image::{Pixel, Primitive};
use std::mem;

/// What a successful run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: usize,
    pub batches: usize,
    /// Seam removals and insertions, counted per frame.
    pub seam_operations: usize,
    pub dimensions: (u32, u32),
    pub frame_rate: f64,
    pub status: ExecutionStatus,
}

pub struct Retargeter<'a> {
    config: Config,
    host: HostProvider,
    provider: Option<&'a dyn ComputeProvider>,
    events: &'a dyn EventSink,
    progress: &'a dyn ProgressObserver,
    cancel: Cancellation,
}

impl<'a> Retargeter<'a> {
    /// A retargeter running on whatever the configuration asks for:
    /// its memory budget, its lane count, and an accelerator if one
    /// was preferred.
    pub fn new(
        config: Config,
        events: &'a dyn EventSink,
        progress: &'a dyn ProgressObserver,
        cancel: Cancellation,
    ) -> Self {
        let host = select_provider(
            config.prefer_accelerator,
            config.memory_budget,
            config.lanes,
        );
        Retargeter {
            config,
            host,
            provider: None,
            events,
            progress,
            cancel,
        }
    }

    /// Run on another provider.  The configured memory budget and lane
    /// count still cap what any one batch gets.
    pub fn with_provider(mut self, provider: &'a dyn ComputeProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    fn provider(&self) -> &dyn ComputeProvider {
        match self.provider {
            Some(provider) => provider,
            None => &self.host,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run<P, S, In, Out>(&self, source: &mut In, sink: &mut Out) -> Result<RunSummary>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
        In: FrameSource<P>,
        Out: FrameSink<P>,
    {
        self.process(source, sink).map_err(|e| {
            self.events.emit(located(Event::error(e.to_string()), &e));
            e
        })
    }

    fn process<P, S, In, Out>(&self, source: &mut In, sink: &mut Out) -> Result<RunSummary>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
        In: FrameSource<P>,
        Out: FrameSink<P>,
    {
        self.config.validate()?;

        let video = source.read().map_err(|e| match e {
            ResizeError::Input { .. } => e,
            other => ResizeError::input(other.to_string()),
        })?;
        let dimensions = check_sequence(&video.frames)?;
        let total = video.frames.len();
        self.events.emit(Event::info(format!(
            "read {} frames at {}x{}, {} fps",
            total, dimensions.0, dimensions.1, video.frame_rate
        )));

        let mut state = RunState {
            frames: Vec::with_capacity(total),
            lead_in: None,
            batches: 0,
            seam_operations: 0,
            steps: 0,
            status: None,
        };
        for (index, chunk) in video.frames.chunks(self.config.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ResizeError::cancelled(state.steps).in_batch(index));
            }
            let first_frame = index * self.config.batch_size;
            let lead_in = state.lead_in.take();
            let done = state.steps;
            let carved = self
                .carve_with_retry(index, first_frame, chunk, lead_in, &mut state)
                .map_err(|e| match e {
                    ResizeError::Cancelled {
                        location,
                        completed_steps,
                    } => ResizeError::Cancelled {
                        location,
                        completed_steps: done + completed_steps,
                    },
                    other => other,
                })?;

            state.seam_operations += carved.operations();
            state.steps += carved.history.len();
            state.batches += 1;
            state.lead_in = chunk.last().cloned();
            state.frames.extend(carved.frames);
            self.progress.update(state.frames.len(), total);
        }
        self.progress.finish();

        if state.frames.len() != total {
            return Err(ResizeError::algorithm(format!(
                "carved {} frames out of {}",
                state.frames.len(),
                total
            )));
        }

        sink.write(&state.frames, video.frame_rate)
            .map_err(|e| match e {
                ResizeError::Output { .. } => e,
                other => ResizeError::output(other.to_string()),
            })?;
        self.events.emit(Event::info(format!(
            "wrote {} frames at {}x{}, {} fps",
            total, self.config.target_width, self.config.target_height, video.frame_rate
        )));

        Ok(RunSummary {
            frames: total,
            batches: state.batches,
            seam_operations: state.seam_operations,
            dimensions: self.config.target(),
            frame_rate: video.frame_rate,
            status: state.status.unwrap_or(ExecutionStatus::Native),
        })
    }

    // A resource failure gets one more try on a fresh context; the old
    // lease is dropped, and so released, before the new one is taken.
    fn carve_with_retry<P, S>(
        &self,
        index: usize,
        first_frame: usize,
        frames: &[Frame<P>],
        lead_in: Option<Frame<P>>,
        state: &mut RunState<P>,
    ) -> Result<CarvedBatch<P>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        match self.carve_once(index, first_frame, frames, lead_in.clone(), state) {
            Err(ref e) if e.is_resource() => {
                self.events.emit(
                    Event::warning(format!("{}; retrying the batch once", e)).batch(index),
                );
                self.carve_once(index, first_frame, frames, lead_in, state)
            }
            result => result,
        }
    }

    fn carve_once<P, S>(
        &self,
        index: usize,
        first_frame: usize,
        frames: &[Frame<P>],
        lead_in: Option<Frame<P>>,
        state: &mut RunState<P>,
    ) -> Result<CarvedBatch<P>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        let mut lease = BatchLease::acquire(self.provider()).map_err(|e| e.in_batch(index))?;
        if state.status.is_none() {
            if lease.status == ExecutionStatus::DegradedToHost {
                self.events
                    .emit(Event::warning("accelerator unavailable, using host"));
            }
            state.status = Some(lease.status);
        }

        let source = frames.first().map(|f| f.dimensions()).unwrap_or_default();
        let bytes_per_pixel = usize::from(P::CHANNEL_COUNT) * mem::size_of::<S>();
        let footprint = batch_footprint(
            frames.len(),
            source,
            self.config.target(),
            bytes_per_pixel,
        );
        if footprint > self.config.memory_budget {
            return Err(ResizeError::resource(format!(
                "batch needs {} bytes but the configured budget is {} bytes",
                footprint, self.config.memory_budget
            ))
            .in_batch(index));
        }
        lease.allocate(footprint).map_err(|e| e.in_batch(index))?;

        let lanes = lease.lanes().min(self.config.lanes);
        let coordinator =
            BatchCoordinator::new(&self.config, self.events, self.cancel.clone(), lanes);
        coordinator.carve(Batch {
            index,
            first_frame,
            frames: frames.to_vec(),
            lead_in,
        })
    }
}

struct RunState<P: Pixel> {
    frames: Vec<Frame<P>>,
    lead_in: Option<Frame<P>>,
    batches: usize,
    seam_operations: usize,
    // Synchronized seam steps finished so far, over all batches.
    steps: usize,
    status: Option<ExecutionStatus>,
}

fn located(event: Event, error: &ResizeError) -> Event {
    let location = error.location();
    let event = match location.batch {
        Some(batch) => event.batch(batch),
        None => event,
    };
    match location.frame {
        Some(frame) => event.frame(frame),
        None => event,
    }
}

/// Every frame of a run must be the same size.
fn check_sequence<P: Pixel>(frames: &[Frame<P>]) -> Result<(u32, u32)> {
    let dimensions = frames
        .first()
        .map(|f| f.dimensions())
        .ok_or_else(|| ResizeError::input("the frame sequence is empty"))?;
    if dimensions.0 == 0 || dimensions.1 == 0 {
        return Err(ResizeError::input("frames have no pixels").in_frame(0));
    }
    match frames.iter().position(|f| f.dimensions() != dimensions) {
        Some(odd) => Err(ResizeError::input(format!(
            "frame is {:?}, the first frame is {:?}",
            frames[odd].dimensions(),
            dimensions
        ))
        .in_frame(odd)),
        None => Ok(dimensions),
    }
}
