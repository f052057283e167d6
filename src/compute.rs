// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Compute resources
//!
//! Energy maps, cost tables and frame buffers live in memory that is
//! shared and limited.  A `ComputeProvider` is chosen once per run and
//! hands out one `ComputeContext` per batch; the context knows how much
//! memory the batch may use and how many lanes it may run on.  The
//! context is wrapped in a `BatchLease`, which gives it back on drop no
//! matter how the batch ends.

use crate::error::{ResizeError, Result};

/// How the work is actually going to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// On the device that was asked for.
    Native,
    /// An accelerator was asked for and is not there; running on the
    /// host instead.  Not an error.
    DegradedToHost,
}

pub trait ComputeContext: Send {
    /// Claim `bytes` of working memory.  Refuses anything that would
    /// take the context over its budget.
    fn allocate(&mut self, bytes: u64) -> Result<()>;

    /// Give back everything claimed so far.
    fn release(&mut self);

    /// How many frames (or row chunks) may be worked on at once.
    fn lanes(&self) -> usize;

    /// Bytes currently claimed.
    fn allocated(&self) -> u64;
}

pub struct Acquired {
    pub context: Box<dyn ComputeContext>,
    pub status: ExecutionStatus,
}

pub trait ComputeProvider: Send + Sync {
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<Acquired>;
}

/// Plain host memory and threads.
#[derive(Debug, Clone)]
pub struct HostProvider {
    budget: u64,
    lanes: usize,
    status: ExecutionStatus,
}

impl HostProvider {
    pub fn new(budget: u64, lanes: usize) -> Self {
        HostProvider {
            budget,
            lanes: lanes.max(1),
            status: ExecutionStatus::Native,
        }
    }

    /// A host provider standing in for an accelerator that could not
    /// be found.
    pub fn fallback(budget: u64, lanes: usize) -> Self {
        HostProvider {
            status: ExecutionStatus::DegradedToHost,
            ..HostProvider::new(budget, lanes)
        }
    }
}

impl ComputeProvider for HostProvider {
    fn name(&self) -> &str {
        "host"
    }

    fn acquire(&self) -> Result<Acquired> {
        Ok(Acquired {
            context: Box::new(HostContext {
                budget: self.budget,
                lanes: self.lanes,
                allocated: 0,
            }),
            status: self.status,
        })
    }
}

#[derive(Debug)]
struct HostContext {
    budget: u64,
    lanes: usize,
    allocated: u64,
}

impl ComputeContext for HostContext {
    fn allocate(&mut self, bytes: u64) -> Result<()> {
        let wanted = self.allocated.saturating_add(bytes);
        if wanted > self.budget {
            return Err(ResizeError::resource(format!(
                "batch needs {} bytes but the memory budget is {} bytes",
                wanted, self.budget
            )));
        }
        self.allocated = wanted;
        Ok(())
    }

    fn release(&mut self) {
        self.allocated = 0;
    }

    fn lanes(&self) -> usize {
        self.lanes
    }

    fn allocated(&self) -> u64 {
        self.allocated
    }
}

/// Pick the provider for the whole run.  No accelerator backend is
/// compiled in, so asking for one gets the host, flagged as degraded.
pub fn select_provider(prefer_accelerator: bool, budget: u64, lanes: usize) -> HostProvider {
    if prefer_accelerator {
        HostProvider::fallback(budget, lanes)
    } else {
        HostProvider::new(budget, lanes)
    }
}

/// A compute context held for the length of one batch.
pub struct BatchLease {
    context: Box<dyn ComputeContext>,
    pub status: ExecutionStatus,
}

impl BatchLease {
    pub fn acquire(provider: &dyn ComputeProvider) -> Result<Self> {
        let Acquired { context, status } = provider.acquire()?;
        Ok(BatchLease { context, status })
    }

    pub fn allocate(&mut self, bytes: u64) -> Result<()> {
        self.context.allocate(bytes)
    }

    pub fn lanes(&self) -> usize {
        self.context.lanes()
    }

    pub fn allocated(&self) -> u64 {
        self.context.allocated()
    }
}

impl Drop for BatchLease {
    fn drop(&mut self) {
        self.context.release();
    }
}

/// Working memory for one batch: every frame at its largest, plus the
/// spatial, temporal and combined maps and the cost table.
pub fn batch_footprint(
    frames: usize,
    source: (u32, u32),
    target: (u32, u32),
    bytes_per_pixel: usize,
) -> u64 {
    let cells = u64::from(source.0.max(target.0)) * u64::from(source.1.max(target.1));
    let per_cell = 2 * bytes_per_pixel as u64
        + 3 * std::mem::size_of::<f64>() as u64
        + std::mem::size_of::<crate::twodmap::EnergyAndBackPointer>() as u64;
    frames as u64 * cells * per_cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn budget_is_enforced() {
        let provider = HostProvider::new(1000, 2);
        let mut lease = BatchLease::acquire(&provider).unwrap();
        assert!(lease.allocate(600).is_ok());
        assert!(lease.allocate(600).unwrap_err().is_resource());
        assert_eq!(lease.allocated(), 600);
        assert_eq!(lease.lanes(), 2);
    }

    #[test]
    fn accelerator_request_degrades_to_host() {
        let provider = select_provider(true, 1 << 20, 1);
        assert_eq!(
            provider.acquire().unwrap().status,
            ExecutionStatus::DegradedToHost
        );
        let provider = select_provider(false, 1 << 20, 1);
        assert_eq!(provider.acquire().unwrap().status, ExecutionStatus::Native);
    }

    struct Tracked(Arc<AtomicU64>);

    impl ComputeContext for Tracked {
        fn allocate(&mut self, bytes: u64) -> Result<()> {
            self.0.fetch_add(bytes, Ordering::SeqCst);
            Ok(())
        }
        fn release(&mut self) {
            self.0.store(0, Ordering::SeqCst);
        }
        fn lanes(&self) -> usize {
            1
        }
        fn allocated(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn lease_releases_on_drop() {
        let held = Arc::new(AtomicU64::new(0));
        {
            let mut lease = BatchLease {
                context: Box::new(Tracked(held.clone())),
                status: ExecutionStatus::Native,
            };
            lease.allocate(42).unwrap();
            assert_eq!(held.load(Ordering::SeqCst), 42);
        }
        assert_eq!(held.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn footprint_uses_the_larger_dimensions() {
        let small = batch_footprint(1, (10, 10), (5, 5), 3);
        let large = batch_footprint(1, (10, 10), (20, 5), 3);
        assert_eq!(large, small * 2);
        assert_eq!(batch_footprint(5, (10, 10), (5, 5), 3), small * 5);
    }
}
