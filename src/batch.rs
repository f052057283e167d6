// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Batch coordination
//!
//! A batch of frames is carved to size in lock-step.  Every plan step
//! takes exactly one seam out of (or puts one into) every frame of the
//! batch, and no frame starts step n+1 until all of them have finished
//! step n.  That keeps every frame the same size at every step
//! boundary, which is what lets the temporal energy be computed across
//! the batch at all.
//!
//! Each frame carries its own spatial energy map, patched locally after
//! every edit, and its own copy of the batch's temporal map, carved
//! along with the frame.

use crate::config::{Config, SeamPolicy};
use crate::energy::{combine, spatial_energy, temporal_energy};
use crate::error::{ResizeError, Result};
use crate::events::{Cancellation, Event, EventSink};
use crate::lanes::map_lanes;
use crate::plan::ResizePlan;
use crate::seam::{Axis, Seam, SeamOp};
use crate::seamcarver::{carve_map, edit, mark_insertion, update_energy};
use crate::seamfinder::{DynamicProgramming, SeamFinder};
use crate::twodmap::EnergyMap;
use image::{ImageBuffer, Pixel, Primitive};

/// A frame of any pixel type the `image` crate knows about.
pub type Frame<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Frames carved together under one plan.
pub struct Batch<P: Pixel> {
    pub index: usize,
    /// Position of the batch's first frame in the whole run.
    pub first_frame: usize,
    pub frames: Vec<Frame<P>>,
    /// The last source frame of the previous batch, if there was one.
    /// It joins the temporal window whenever its size still matches.
    pub lead_in: Option<Frame<P>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Planning,
    CarvingWidth,
    CarvingHeight,
    Done,
}

/// One completed, synchronized step: every frame of the batch is now
/// `dimensions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    pub axis: Axis,
    pub op: SeamOp,
    pub dimensions: (u32, u32),
}

pub struct CarvedBatch<P: Pixel> {
    pub index: usize,
    pub frames: Vec<Frame<P>>,
    pub plan: ResizePlan,
    pub history: Vec<StepRecord>,
    pub distortion_warned: bool,
}

impl<P: Pixel> CarvedBatch<P> {
    /// Seam edits applied, over all frames.
    pub fn operations(&self) -> usize {
        self.history.len() * self.frames.len()
    }
}

struct Lane<P, S>
where
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    frame: ImageBuffer<P, Vec<S>>,
    spatial: EnergyMap,
    temporal: EnergyMap,
    // Cells already stretched by an insertion on this axis.
    inserted: EnergyMap,
}

impl<P, S> Lane<P, S>
where
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    fn new(frame: ImageBuffer<P, Vec<S>>, temporal: EnergyMap) -> Self {
        let (width, height) = frame.dimensions();
        Lane {
            spatial: spatial_energy(&frame),
            temporal,
            inserted: EnergyMap::new(width, height),
            frame,
        }
    }

    fn energy(&self, weight: f64) -> Result<EnergyMap> {
        let mut energy = combine(&self.spatial, &self.temporal, weight)?;
        for (e, mark) in energy.energy.iter_mut().zip(self.inserted.values()) {
            *e += mark;
        }
        Ok(energy)
    }

    fn apply(&self, seam: &Seam, op: SeamOp, band: u32, weight: f64) -> Result<Self> {
        let frame = edit(&self.frame, seam, op)?;
        let spatial = update_energy(&self.spatial, seam, op, &frame, band)?;
        let temporal = carve_map(&self.temporal, seam, op)?;
        let mut inserted = carve_map(&self.inserted, seam, op)?;
        if op == SeamOp::Insert {
            // More than any seam could cost on the unmarked cells, so
            // the next insertion goes somewhere new while it can.
            let bound = combine(&self.spatial, &self.temporal, weight)?
                .values()
                .iter()
                .sum::<f64>()
                + 1.0;
            mark_insertion(&mut inserted, seam, bound);
        }
        Ok(Lane {
            frame,
            spatial,
            temporal,
            inserted,
        })
    }
}

pub struct BatchCoordinator<'a> {
    config: &'a Config,
    events: &'a dyn EventSink,
    cancel: Cancellation,
    lanes: usize,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        config: &'a Config,
        events: &'a dyn EventSink,
        cancel: Cancellation,
        lanes: usize,
    ) -> Self {
        BatchCoordinator {
            config,
            events,
            cancel,
            lanes: lanes.max(1),
        }
    }

    /// Carve every frame of the batch to the configured target size.
    pub fn carve<P, S>(&self, batch: Batch<P>) -> Result<CarvedBatch<P>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        let index = batch.index;
        self.run(batch).map_err(|e| e.in_batch(index))
    }

    fn run<P, S>(&self, batch: Batch<P>) -> Result<CarvedBatch<P>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        let Batch {
            index,
            first_frame,
            mut frames,
            lead_in,
        } = batch;
        let dimensions = uniform_dimensions(&frames, first_frame)?;

        let mut state = BatchState::Planning;
        let mut plan = None;
        let mut history = Vec::new();
        let mut distortion_warned = false;

        loop {
            state = match state {
                BatchState::Planning => {
                    let planned = ResizePlan::new(dimensions, self.config.target())?;
                    distortion_warned = self.check_distortion(&planned, index);
                    self.events.emit(
                        Event::info(format!(
                            "carving {} frames from {}x{} to {}x{} in {} steps",
                            frames.len(),
                            dimensions.0,
                            dimensions.1,
                            planned.target_width,
                            planned.target_height,
                            planned.len()
                        ))
                        .batch(index),
                    );
                    plan = Some(planned);
                    BatchState::CarvingWidth
                }
                BatchState::CarvingWidth | BatchState::CarvingHeight => {
                    let (axis, next) = match state {
                        BatchState::CarvingWidth => (Axis::Width, BatchState::CarvingHeight),
                        _ => (Axis::Height, BatchState::Done),
                    };
                    let planned = plan
                        .as_ref()
                        .ok_or_else(|| ResizeError::algorithm("carving began before planning"))?;
                    frames = self.carve_axis(
                        axis,
                        frames,
                        lead_in.as_ref(),
                        planned,
                        first_frame,
                        &mut history,
                    )?;
                    next
                }
                BatchState::Done => break,
            }
        }

        let plan = plan.ok_or_else(|| ResizeError::algorithm("batch finished without a plan"))?;
        Ok(CarvedBatch {
            index,
            frames,
            plan,
            history,
            distortion_warned,
        })
    }

    fn check_distortion(&self, plan: &ResizePlan, index: usize) -> bool {
        let ratio = match self.config.distortion_ratio {
            Some(ratio) => ratio,
            None => return false,
        };
        let axes = plan.distorted_axes(ratio);
        if axes.is_empty() {
            return false;
        }
        let names: Vec<String> = axes.iter().map(|a| a.to_string()).collect();
        self.events.emit(
            Event::warning(format!(
                "resizing {}x{} to {}x{} changes {} by more than {}x; expect visible distortion",
                plan.source.0,
                plan.source.1,
                plan.target_width,
                plan.target_height,
                names.join(" and "),
                ratio
            ))
            .batch(index),
        );
        true
    }

    fn carve_axis<P, S>(
        &self,
        axis: Axis,
        frames: Vec<ImageBuffer<P, Vec<S>>>,
        lead_in: Option<&ImageBuffer<P, Vec<S>>>,
        plan: &ResizePlan,
        first_frame: usize,
        history: &mut Vec<StepRecord>,
    ) -> Result<Vec<ImageBuffer<P, Vec<S>>>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        let steps: Vec<_> = plan.steps_for(axis).cloned().collect();
        if steps.is_empty() {
            return Ok(frames);
        }

        let dimensions = uniform_dimensions(&frames, first_frame)?;
        let window: Vec<_> = lead_in
            .filter(|f| f.dimensions() == dimensions)
            .into_iter()
            .chain(frames.iter())
            .collect();
        let temporal = temporal_energy(&window)?;

        let mut lanes = map_lanes(frames, self.lanes, |_, frame| {
            Ok(Lane::new(frame, temporal.clone()))
        })?;

        for step in steps {
            if self.cancel.is_cancelled() {
                return Err(ResizeError::cancelled(history.len()));
            }
            lanes = self.step(lanes, axis, step.op, first_frame)?;
            let dimensions = lanes
                .first()
                .map(|l| l.frame.dimensions())
                .unwrap_or_default();
            if let Some(odd) = lanes.iter().position(|l| l.frame.dimensions() != dimensions) {
                return Err(ResizeError::algorithm(format!(
                    "frames fell out of step after a {} seam, expected {:?}",
                    axis, dimensions
                ))
                .in_frame(first_frame + odd));
            }
            history.push(StepRecord {
                axis,
                op: step.op,
                dimensions,
            });
        }
        Ok(lanes.into_iter().map(|l| l.frame).collect())
    }

    // One synchronized step: every lane gets one seam edit, and the
    // call does not return until all of them have.
    fn step<P, S>(
        &self,
        lanes: Vec<Lane<P, S>>,
        axis: Axis,
        op: SeamOp,
        first_frame: usize,
    ) -> Result<Vec<Lane<P, S>>>
    where
        P: Pixel<Subpixel = S> + Send + Sync + 'static,
        S: Primitive + Send + Sync + 'static,
    {
        let orientation = axis.orientation();
        let weight = self.config.temporal_weight;
        let band = self.config.band_width;

        match self.config.seam_policy {
            SeamPolicy::PerFrame => {
                let finder = DynamicProgramming::new(self.lanes / lanes.len().max(1));
                map_lanes(lanes, self.lanes, |i, lane| {
                    lane.energy(weight)
                        .and_then(|energy| finder.find_seam(&energy, orientation))
                        .and_then(|seam| lane.apply(&seam, op, band, weight))
                        .map_err(|e| e.in_frame(first_frame + i))
                })
            }
            SeamPolicy::Shared => {
                let energies = lanes
                    .iter()
                    .enumerate()
                    .map(|(i, lane)| lane.energy(weight).map_err(|e| e.in_frame(first_frame + i)))
                    .collect::<Result<Vec<_>>>()?;
                let mean = EnergyMap::mean(&energies.iter().collect::<Vec<_>>())?;
                let seam = DynamicProgramming::new(self.lanes).find_seam(&mean, orientation)?;
                map_lanes(lanes, self.lanes, |i, lane| {
                    lane.apply(&seam, op, band, weight)
                        .map_err(|e| e.in_frame(first_frame + i))
                })
            }
        }
    }
}

fn uniform_dimensions<P, S>(
    frames: &[ImageBuffer<P, Vec<S>>],
    first_frame: usize,
) -> Result<(u32, u32)>
where
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    let first = frames
        .first()
        .ok_or_else(|| ResizeError::input("a batch needs at least one frame"))?;
    let dimensions = first.dimensions();
    match frames.iter().position(|f| f.dimensions() != dimensions) {
        Some(odd) => Err(ResizeError::input(format!(
            "frame is {:?}, the rest of its batch is {:?}",
            frames[odd].dimensions(),
            dimensions
        ))
        .in_frame(first_frame + odd)),
        None => Ok(dimensions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Level, RecordingSink};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn frame(width: u32, height: u32, shift: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            let v = ((x + shift) * 37 + y * 11) % 256;
            Rgb([v as u8, (v / 2) as u8, (255 - v) as u8])
        })
    }

    fn batch(count: usize, width: u32, height: u32) -> Batch<Rgb<u8>> {
        Batch {
            index: 0,
            first_frame: 0,
            frames: (0..count).map(|i| frame(width, height, i as u32)).collect(),
            lead_in: None,
        }
    }

    #[test]
    fn width_reduction_stays_in_lock_step() {
        let config = Config::new(8, 6);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 4);
        let carved = coordinator.carve(batch(5, 10, 6)).unwrap();

        assert_eq!(carved.frames.len(), 5);
        assert!(carved.frames.iter().all(|f| f.dimensions() == (8, 6)));
        assert_eq!(
            carved.history,
            vec![
                StepRecord {
                    axis: Axis::Width,
                    op: SeamOp::Remove,
                    dimensions: (9, 6)
                },
                StepRecord {
                    axis: Axis::Width,
                    op: SeamOp::Remove,
                    dimensions: (8, 6)
                },
            ]
        );
        assert_eq!(carved.operations(), 10);
    }

    #[test]
    fn frames_come_back_in_order() {
        // Each frame is a flat color; carving cannot mix them up.
        let config = Config::new(4, 5);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 3);
        let frames = (0..6u8)
            .map(|i| RgbImage::from_pixel(6, 4, Rgb([i * 40, i, 0])))
            .collect();
        let carved = coordinator
            .carve(Batch {
                index: 0,
                first_frame: 0,
                frames,
                lead_in: None,
            })
            .unwrap();
        for (i, f) in carved.frames.iter().enumerate() {
            assert_eq!(f.dimensions(), (4, 5));
            assert!(f.pixels().all(|p| *p == Rgb([i as u8 * 40, i as u8, 0])));
        }
    }

    #[test]
    fn nothing_to_do_means_no_seams() {
        let config = Config::new(7, 5);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 2);
        let source = batch(3, 7, 5);
        let originals = source.frames.clone();
        let carved = coordinator.carve(source).unwrap();
        assert!(carved.history.is_empty());
        assert_eq!(carved.operations(), 0);
        assert_eq!(carved.frames, originals);
    }

    #[test]
    fn both_axes_in_both_directions() {
        let config = Config::new(12, 4);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 2);
        let carved = coordinator.carve(batch(2, 10, 6)).unwrap();
        assert!(carved.frames.iter().all(|f| f.dimensions() == (12, 4)));
        let widths: Vec<_> = carved.history.iter().filter(|s| s.axis == Axis::Width).collect();
        assert_eq!(widths.len(), 2);
        assert!(widths.iter().all(|s| s.op == SeamOp::Insert));
        // Width is finished before height starts.
        assert_eq!(carved.history[1].dimensions, (12, 6));
        assert_eq!(carved.history[3].dimensions, (12, 4));
    }

    #[test]
    fn distortion_warns_once_per_batch() {
        let mut config = Config::new(25, 6);
        config.distortion_ratio = Some(2.0);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 2);
        let carved = coordinator.carve(batch(2, 10, 6)).unwrap();
        assert!(carved.distortion_warned);
        assert!(carved.frames.iter().all(|f| f.dimensions() == (25, 6)));
        assert_eq!(events.count(Level::Warning), 1);
    }

    #[test]
    fn shared_policy_cuts_the_same_seam_everywhere() {
        let mut config = Config::new(5, 4);
        config.seam_policy = SeamPolicy::Shared;
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 2);
        let same = frame(8, 4, 0);
        let carved = coordinator
            .carve(Batch {
                index: 0,
                first_frame: 0,
                frames: vec![same.clone(), same.clone(), same],
                lead_in: None,
            })
            .unwrap();
        assert_eq!(carved.frames[0], carved.frames[1]);
        assert_eq!(carved.frames[1], carved.frames[2]);
    }

    #[test]
    fn cancellation_stops_between_steps() {
        let config = Config::new(4, 6);
        let events = RecordingSink::new();
        let cancel = Cancellation::new();
        cancel.cancel();
        let coordinator = BatchCoordinator::new(&config, &events, cancel, 2);
        let err = coordinator.carve(batch(2, 10, 6)).err().unwrap();
        assert!(err.is_cancelled());
        assert_eq!(err.location().batch, Some(0));
    }

    #[test]
    fn ragged_batches_are_rejected() {
        let config = Config::new(4, 4);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 1);
        let mut ragged = batch(3, 6, 4);
        ragged.first_frame = 10;
        ragged.frames[2] = frame(5, 4, 0);
        match coordinator.carve(ragged) {
            Err(ResizeError::Input { location, .. }) => assert_eq!(location.frame, Some(12)),
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("ragged batch was carved"),
        }
    }

    fn gray_ramp(width: u32, height: u32, step: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| Luma([(x * step) as u8]))
    }

    fn row_of(frame: &GrayImage, y: u32) -> Vec<u8> {
        (0..frame.width()).map(|x| frame.get_pixel(x, y)[0]).collect()
    }

    #[test]
    fn widening_spreads_the_new_columns() {
        let config = Config::new(20, 6);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 1);
        let ramp = gray_ramp(10, 6, 25);
        let carved = coordinator
            .carve(Batch {
                index: 0,
                first_frame: 0,
                frames: vec![ramp.clone(), ramp],
                lead_in: None,
            })
            .unwrap();

        // One new column between each pair of old ones, plus the edge.
        let expected = [
            0, 0, 12, 25, 37, 50, 62, 75, 87, 100, 112, 125, 137, 150, 162, 175, 187, 200, 212, 225,
        ];
        for frame in &carved.frames {
            for y in 0..6 {
                assert_eq!(row_of(frame, y), expected);
            }
        }
    }

    #[test]
    fn lead_in_joins_the_temporal_window() {
        // Every seam through the ramp costs the same at both edges, so
        // without motion the leftmost column goes.  A lead-in frame that
        // differs on the left makes that side expensive instead.
        let config = Config::new(7, 4);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 1);
        let ramp = gray_ramp(8, 4, 10);
        let mut before = ramp.clone();
        for y in 0..4 {
            before.put_pixel(0, y, Luma([255]));
            before.put_pixel(1, y, Luma([255]));
        }
        let batch = |lead_in| Batch {
            index: 1,
            first_frame: 5,
            frames: vec![ramp.clone(), ramp.clone()],
            lead_in,
        };

        let cold = coordinator.carve(batch(None)).unwrap();
        assert_eq!(row_of(&cold.frames[0], 0), [10, 20, 30, 40, 50, 60, 70]);

        let warm = coordinator.carve(batch(Some(before))).unwrap();
        assert_eq!(row_of(&warm.frames[0], 0), [0, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn a_lead_in_of_another_size_is_left_out() {
        let config = Config::new(7, 4);
        let events = RecordingSink::new();
        let coordinator = BatchCoordinator::new(&config, &events, Cancellation::new(), 1);
        let ramp = gray_ramp(8, 4, 10);
        let carved = coordinator
            .carve(Batch {
                index: 0,
                first_frame: 0,
                frames: vec![ramp],
                lead_in: Some(GrayImage::from_pixel(9, 4, Luma([255]))),
            })
            .unwrap();
        assert_eq!(row_of(&carved.frames[0], 0), [10, 20, 30, 40, 50, 60, 70]);
    }
}
