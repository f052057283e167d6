// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-frame lanes
//!
//! The frames of a batch are independent of one another inside a seam
//! step, so each step is a map over the frames.  With the `threaded`
//! feature the frames are dealt out to scoped threads in contiguous
//! runs; the call returns only when every lane has finished, and the
//! results come back in frame order.

use crate::error::Result;

/// Apply `f` to every item (with its index), on up to `lanes` threads.
/// The first error, in item order, wins.
#[cfg(feature = "threaded")]
pub fn map_lanes<T, R, F>(items: Vec<T>, lanes: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> Result<R> + Sync,
{
    use crate::error::ResizeError;
    use itertools::Itertools;

    if lanes < 2 || items.len() < 2 {
        return items.into_iter().enumerate().map(|(i, t)| f(i, t)).collect();
    }

    let per_lane = (items.len() + lanes - 1) / lanes;
    let chunks = items.into_iter().enumerate().chunks(per_lane);
    let groups: Vec<Vec<(usize, T)>> = (&chunks).into_iter().map(|c| c.collect()).collect();

    let f = &f;
    let joined = crossbeam::scope(|scope| {
        let handles: Vec<_> = groups
            .into_iter()
            .map(|group| {
                scope.spawn(move |_| {
                    group
                        .into_iter()
                        .map(|(i, t)| f(i, t))
                        .collect::<Result<Vec<R>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(ResizeError::algorithm("a frame lane panicked")))
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| ResizeError::algorithm("a frame lane panicked"))?;

    let mut results = Vec::new();
    for lane in joined {
        results.extend(lane?);
    }
    Ok(results)
}

#[cfg(not(feature = "threaded"))]
pub fn map_lanes<T, R, F>(items: Vec<T>, _lanes: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(usize, T) -> Result<R> + Sync,
{
    items.into_iter().enumerate().map(|(i, t)| f(i, t)).collect()
}
