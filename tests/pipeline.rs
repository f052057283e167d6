// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use vidseam::compute::Acquired;
use vidseam::{
    select_provider, Cancellation, ComputeProvider, Config, ExecutionStatus, Frame, FrameSink,
    HostProvider, Level, LogProgress, MemorySink, MemorySource, NoProgress, ProgressObserver,
    RecordingSink, ResizeError, Result, Retargeter,
};

fn clip(count: usize, width: u32, height: u32) -> Vec<RgbImage> {
    (0..count)
        .map(|i| {
            RgbImage::from_fn(width, height, |x, y| {
                let v = ((x * 31 + y * 17) as usize + i * 7) % 256;
                Rgb([v as u8, (v / 3) as u8, (255 - v) as u8])
            })
        })
        .collect()
}

/// Hands out host contexts, the first `starved` of them with no memory
/// at all.
struct Starved {
    starved: usize,
    acquired: AtomicUsize,
}

impl Starved {
    fn new(starved: usize) -> Self {
        Starved {
            starved,
            acquired: AtomicUsize::new(0),
        }
    }

    fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

impl ComputeProvider for Starved {
    fn name(&self) -> &str {
        "starved"
    }

    fn acquire(&self) -> Result<Acquired> {
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        let budget = if n < self.starved { 0 } else { u64::max_value() };
        HostProvider::new(budget, 2).acquire()
    }
}

/// Pulls the plug as soon as the first batch is done.
struct CancelAfterFirstBatch(Cancellation);

impl ProgressObserver for CancelAfterFirstBatch {
    fn update(&self, _processed: usize, _total: usize) {
        self.0.cancel();
    }
}

struct BrokenSink;

impl FrameSink<Rgb<u8>> for BrokenSink {
    fn write(&mut self, _frames: &[Frame<Rgb<u8>>], _frame_rate: f64) -> Result<()> {
        Err(ResizeError::output("disk full"))
    }
}

#[test]
fn five_frames_lose_two_columns_each() {
    let provider = HostProvider::new(1 << 30, 4);
    let events = RecordingSink::new();
    let progress = LogProgress::new();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &progress, Cancellation::new())
        .with_provider(&provider);
    let mut source = MemorySource::new(clip(5, 10, 6), 29.97);
    let mut sink = MemorySink::new();
    let summary = retargeter.run(&mut source, &mut sink).unwrap();

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.seam_operations, 10);
    assert_eq!(summary.dimensions, (8, 6));
    assert_eq!(summary.status, ExecutionStatus::Native);
    assert_eq!(sink.writes, 1);
    assert_eq!(sink.frame_rate, Some(29.97));
    assert_eq!(sink.frames.len(), 5);
    assert!(sink.frames.iter().all(|f| f.dimensions() == (8, 6)));
}

#[test]
fn frames_keep_their_order_across_batches() {
    let frames: Vec<RgbImage> = (0..9u8)
        .map(|i| RgbImage::from_pixel(7, 5, Rgb([i * 20, 255 - i, i])))
        .collect();
    let mut config = Config::new(5, 6);
    config.batch_size = 4;
    let provider = HostProvider::new(1 << 30, 2);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(config, &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    let summary = retargeter
        .run(&mut MemorySource::new(frames, 30.0), &mut sink)
        .unwrap();

    assert_eq!(summary.batches, 3);
    for (i, frame) in sink.frames.iter().enumerate() {
        let i = i as u8;
        assert_eq!(frame.dimensions(), (5, 6));
        assert!(frame.pixels().all(|p| *p == Rgb([i * 20, 255 - i, i])));
    }
}

#[test]
fn a_starved_batch_is_retried_once() {
    let provider = Starved::new(1);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    let summary = retargeter
        .run(&mut MemorySource::new(clip(3, 10, 6), 30.0), &mut sink)
        .unwrap();

    assert_eq!(provider.acquired(), 2);
    assert_eq!(summary.frames, 3);
    assert_eq!(events.count(Level::Warning), 1);
    assert_eq!(sink.writes, 1);
}

#[test]
fn a_batch_over_budget_fails_after_one_retry() {
    let provider = Starved::new(usize::max_value());
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    let err = retargeter
        .run(&mut MemorySource::new(clip(3, 10, 6), 30.0), &mut sink)
        .unwrap_err();

    assert!(err.is_resource());
    assert_eq!(err.location().batch, Some(0));
    assert_eq!(provider.acquired(), 2);
    assert_eq!(sink.writes, 0);
    assert_eq!(events.count(Level::Error), 1);
}

#[test]
fn a_cancelled_run_delivers_nothing() {
    let provider = HostProvider::new(1 << 30, 2);
    let events = RecordingSink::new();
    let cancel = Cancellation::new();
    cancel.cancel();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &NoProgress, cancel)
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    let err = retargeter
        .run(&mut MemorySource::new(clip(3, 10, 6), 30.0), &mut sink)
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(sink.writes, 0);
}

#[test]
fn sink_failures_are_output_errors() {
    let provider = HostProvider::new(1 << 30, 2);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    match retargeter.run(&mut MemorySource::new(clip(2, 10, 6), 30.0), &mut BrokenSink) {
        Err(ResizeError::Output { .. }) => (),
        Err(other) => panic!("unexpected {:?}", other),
        Ok(_) => panic!("a broken sink accepted the frames"),
    }
}

#[test]
fn an_empty_source_is_an_input_error() {
    let provider = HostProvider::new(1 << 30, 2);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(Config::new(8, 6), &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    match retargeter.run(&mut MemorySource::<Rgb<u8>>::new(Vec::new(), 30.0), &mut sink) {
        Err(ResizeError::Input { .. }) => (),
        Err(other) => panic!("unexpected {:?}", other),
        Ok(_) => panic!("carved an empty clip"),
    }
    assert_eq!(sink.writes, 0);
}

#[test]
fn asking_for_an_accelerator_degrades_quietly() {
    let provider = select_provider(true, 1 << 30, 2);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(Config::new(9, 6), &events, &NoProgress, Cancellation::new())
        .with_provider(&provider);
    let mut sink = MemorySink::new();
    let summary = retargeter
        .run(&mut MemorySource::new(clip(7, 10, 6), 30.0), &mut sink)
        .unwrap();

    assert_eq!(summary.status, ExecutionStatus::DegradedToHost);
    assert_eq!(summary.batches, 2);
    let degraded = events
        .events()
        .iter()
        .filter(|e| e.message.contains("accelerator unavailable"))
        .count();
    assert_eq!(degraded, 1);
}

#[test]
fn distortion_is_reported_once_for_every_batch() {
    let mut config = Config::new(25, 6);
    config.batch_size = 3;
    config.distortion_ratio = Some(2.0);
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(config, &events, &NoProgress, Cancellation::new());
    let mut sink = MemorySink::new();
    let summary = retargeter
        .run(&mut MemorySource::new(clip(6, 10, 6), 30.0), &mut sink)
        .unwrap();

    assert_eq!(summary.batches, 2);
    let warned: Vec<_> = events
        .events()
        .into_iter()
        .filter(|e| e.message.contains("distortion"))
        .map(|e| e.batch)
        .collect();
    assert_eq!(warned, vec![Some(0), Some(1)]);
    assert!(sink.frames.iter().all(|f| f.dimensions() == (25, 6)));
}

#[test]
fn cancelling_between_batches_counts_the_finished_steps() {
    let cancel = Cancellation::new();
    let progress = CancelAfterFirstBatch(cancel.clone());
    let mut config = Config::new(8, 6);
    config.batch_size = 3;
    let events = RecordingSink::new();
    let retargeter = Retargeter::new(config, &events, &progress, cancel);
    let mut sink = MemorySink::new();
    let err = retargeter
        .run(&mut MemorySource::new(clip(6, 10, 6), 30.0), &mut sink)
        .unwrap_err();

    match err {
        ResizeError::Cancelled {
            location,
            completed_steps,
        } => {
            assert_eq!(completed_steps, 2);
            assert_eq!(location.batch, Some(1));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(sink.writes, 0);
}
