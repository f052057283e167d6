// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find the cheapest seam through an energy map
//!
//! The classic dynamic program.  The first row of the cost table is
//! the first row of the energy map; every later cell is its own energy
//! plus the cheapest of the (up to) three cells touching it in the row
//! above.  The seam ends at the cheapest cell of the last row and is
//! read back up through the parent pointers.
//!
//! Ties always go to the smallest index, both when choosing a parent
//! and when choosing where the seam ends, so the same map always gives
//! the same seam.
//!
//! Horizontal seams are vertical seams through a flipped map.

use crate::error::{ResizeError, Result};
use crate::flipper::Flipper;
use crate::seam::{Orientation, Seam};
use crate::twodmap::{EnergyAndBackPointer, EnergyMap, Lattice, TwoDimensionalMap};

/// Rows narrower than this are not worth splitting across lanes.
pub const PARALLEL_ROW_WIDTH: u32 = 2048;

type CostTable = TwoDimensionalMap<EnergyAndBackPointer>;

/// This trait defines how we will get seams out of an energy map.
/// It's a primitive interface, just enough to make room for more than
/// one search strategy.
pub trait SeamFinder {
    fn find_seam(&self, energy: &EnergyMap, orientation: Orientation) -> Result<Seam>;
}

/// The straightforward Avidan & Shamir backward-energy search, with
/// each row of the cost table optionally split across `lanes` threads.
#[derive(Debug, Clone, Copy)]
pub struct DynamicProgramming {
    pub lanes: usize,
}

impl DynamicProgramming {
    pub fn new(lanes: usize) -> Self {
        DynamicProgramming {
            lanes: lanes.max(1),
        }
    }
}

impl Default for DynamicProgramming {
    fn default() -> Self {
        DynamicProgramming::new(1)
    }
}

impl SeamFinder for DynamicProgramming {
    fn find_seam(&self, energy: &EnergyMap, orientation: Orientation) -> Result<Seam> {
        let (width, height) = energy.dimensions();
        if width == 0 || height == 0 {
            return Err(ResizeError::input(format!(
                "cannot find a seam in a {}x{} energy map",
                width, height
            )));
        }
        let indices = match orientation {
            Orientation::Vertical => cost_to_seam(&calculate_cost(energy, self.lanes)?),
            Orientation::Horizontal => {
                cost_to_seam(&calculate_cost(&Flipper::new(energy), self.lanes)?)
            }
        };
        let seam = Seam::new(orientation, indices);
        seam.validate((width, height))?;
        Ok(seam)
    }
}

/// Find the minimum vertical or horizontal seam on a single lane.
pub fn find_minimum_seam(energy: &EnergyMap, orientation: Orientation) -> Result<Seam> {
    DynamicProgramming::default().find_seam(energy, orientation)
}

// One cell of the cost table, given the finished row above it.  The
// candidate parents are scanned left to right and only a strictly
// smaller cost displaces the current best, which is what makes the
// leftmost parent win a tie.
#[inline]
fn cost_cell<L>(energy: &L, above: &[EnergyAndBackPointer], x: u32, y: u32) -> EnergyAndBackPointer
where
    L: Lattice<Cell = f64>,
{
    let maxwidth = above.len() as u32 - 1;
    let first = x.saturating_sub(1);
    let parent = (first..=(x + 1).min(maxwidth)).fold(first, |best, candidate| {
        if above[candidate as usize].energy < above[best as usize].energy {
            candidate
        } else {
            best
        }
    });
    EnergyAndBackPointer {
        energy: energy.cell(x, y) + above[parent as usize].energy,
        parent,
    }
}

fn cost_row<L>(
    energy: &L,
    above: &[EnergyAndBackPointer],
    row: &mut [EnergyAndBackPointer],
    first_x: u32,
    y: u32,
) where
    L: Lattice<Cell = f64>,
{
    for (offset, target) in row.iter_mut().enumerate() {
        *target = cost_cell(energy, above, first_x + offset as u32, y);
    }
}

// Every cell of a row depends only on the row above, so the row can be
// broken into mut_chunks and each chunk filled on its own lane. A scope
// per row is the price of that dependency: no row can start before the
// one above is whole. Rows narrower than PARALLEL_ROW_WIDTH never spawn,
// and past it the spawn cost is small next to the row's own work.
#[cfg(feature = "threaded")]
fn fill_row<L>(
    energy: &L,
    above: &[EnergyAndBackPointer],
    row: &mut [EnergyAndBackPointer],
    y: u32,
    lanes: usize,
) -> Result<()>
where
    L: Lattice<Cell = f64> + Sync,
{
    if lanes < 2 || (row.len() as u32) < PARALLEL_ROW_WIDTH {
        cost_row(energy, above, row, 0, y);
        return Ok(());
    }
    let chunk = (row.len() + lanes - 1) / lanes;
    crossbeam::scope(|scope| {
        for (i, segment) in row.chunks_mut(chunk).enumerate() {
            scope.spawn(move |_| cost_row(energy, above, segment, (i * chunk) as u32, y));
        }
    })
    .map_err(|_| ResizeError::algorithm(format!("seam cost lane panicked on row {}", y)))
}

#[cfg(not(feature = "threaded"))]
fn fill_row<L>(
    energy: &L,
    above: &[EnergyAndBackPointer],
    row: &mut [EnergyAndBackPointer],
    y: u32,
    _lanes: usize,
) -> Result<()>
where
    L: Lattice<Cell = f64> + Sync,
{
    cost_row(energy, above, row, 0, y);
    Ok(())
}

fn calculate_cost<L>(energy: &L, lanes: usize) -> Result<CostTable>
where
    L: Lattice<Cell = f64> + Sync,
{
    let (width, height) = energy.dimensions();
    let mut table = CostTable::new(width, height);
    let w = width as usize;

    // Populate the first row with their native energies.
    for x in 0..width {
        table[(x, 0)].energy = energy.cell(x, 0);
    }

    // For every subsequent row, populate the target cell with the sum
    // of the *lowest adjacent upper energy* and the *x coordinate of
    // that energy*
    for y in 1..height {
        let (done, rest) = table.energy.split_at_mut(y as usize * w);
        let above = &done[(y as usize - 1) * w..];
        fill_row(energy, above, &mut rest[..w], y, lanes)?;
    }
    Ok(table)
}

// Find the x coordinate of the bottommost cell with the least cost,
// then work backwards through the parents, generating the vec of x
// coordinates that map to the seam.
fn cost_to_seam(cost: &CostTable) -> Vec<u32> {
    let (width, height) = cost.dimensions();
    let last = cost.row(height - 1);
    let mut seam_col = (0..width).fold(0, |best, x| {
        if last[x as usize].energy < last[best as usize].energy {
            x
        } else {
            best
        }
    });
    (0..height)
        .rev()
        .fold(Vec::<u32>::with_capacity(height as usize), |mut acc, y| {
            acc.push(seam_col);
            seam_col = cost[(seam_col, y)].parent;
            acc
        })
        .into_iter()
        .rev()
        .collect()
}
