// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Events, progress, and cancellation
//!
//! The carving machinery never talks to a global logger or progress
//! bar.  It is handed an `EventSink` and a `ProgressObserver` when it
//! is built, and reports through those.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A leveled message, with the batch and frame it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub level: Level,
    pub message: String,
    pub batch: Option<usize>,
    pub frame: Option<usize>,
}

impl Event {
    pub fn new<S: Into<String>>(level: Level, message: S) -> Self {
        Event {
            level,
            message: message.into(),
            batch: None,
            frame: None,
        }
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Event::new(Level::Info, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> Self {
        Event::new(Level::Warning, message)
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Event::new(Level::Error, message)
    }

    pub fn batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn frame(mut self, frame: usize) -> Self {
        self.frame = Some(frame);
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(batch) = self.batch {
            write!(f, " batch={}", batch)?;
        }
        if let Some(frame) = self.frame {
            write!(f, " frame={}", frame)?;
        }
        Ok(())
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match event.level {
            Level::Info => log::info!(target: "vidseam", "{}", event),
            Level::Warning => log::warn!(target: "vidseam", "{}", event),
            Level::Error => log::error!(target: "vidseam", "{}", event),
        }
    }
}

/// Keeps every event, for inspection afterward.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.events().iter().filter(|e| e.level == level).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub trait ProgressObserver: Send + Sync {
    fn update(&self, processed: usize, total: usize);

    fn finish(&self) {}
}

/// Ignores progress altogether.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn update(&self, _processed: usize, _total: usize) {}
}

/// Logs a line every time another tenth of the frames is done.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_decile: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        LogProgress::default()
    }
}

impl ProgressObserver for LogProgress {
    fn update(&self, processed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let decile = processed * 10 / total;
        if self.last_decile.fetch_max(decile, Ordering::SeqCst) < decile {
            log::info!(
                target: "vidseam",
                "processing frames: {}/{} ({:.1}%)",
                processed,
                total,
                processed as f64 * 100.0 / total as f64
            );
        }
    }
}

/// A shared stop flag.  Clones all see the same flag.
#[derive(Debug, Default, Clone)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
