// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-dimensional maps
//!
//! The energy maps, the temporal maps, and the seam cost tables are all
//! the same thing underneath: a dense, row-major field of values
//! addressed by (x, y).

use crate::error::{ResizeError, Result};
use std::ops::{Index, IndexMut};

/// Read-only (x, y) addressing.  Anything the seam finder walks over
/// implements this, which lets a transposed view stand in for the
/// real thing.
pub trait Lattice {
    /// The value stored at each address.
    type Cell: Copy;

    /// (width, height), as always.
    fn dimensions(&self) -> (u32, u32);

    /// The value at a single address.
    fn cell(&self, x: u32, y: u32) -> Self::Cell;
}

/// Defines the basic map: An addressable two-dimensional field
/// containing an object that represents one of several possible
/// objects during processing: an f64 for the energy map, or an
/// energy + parent address for the seam cost table.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoDimensionalMap<P: Default + Copy> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) energy: Vec<P>,
}

/// The per-pixel importance of a frame.
pub type EnergyMap = TwoDimensionalMap<f64>;

impl<P: Default + Copy> TwoDimensionalMap<P> {
    /// Define a new (abstract) map.  The content type must implement
    /// the Default trait.
    pub fn new(width: u32, height: u32) -> Self {
        TwoDimensionalMap {
            width,
            height,
            energy: vec![P::default(); width as usize * height as usize],
        }
    }

    /// Wrap an existing row-major vector.  The length must match the
    /// dimensions.
    pub fn from_vec(width: u32, height: u32, energy: Vec<P>) -> Result<Self> {
        if energy.len() != width as usize * height as usize {
            return Err(ResizeError::input(format!(
                "{} values cannot fill a {}x{} map",
                energy.len(),
                width,
                height
            )));
        }
        Ok(TwoDimensionalMap {
            width,
            height,
            energy,
        })
    }

    /// Build a map by calling `f` for every address in row-major order.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> P,
    {
        let mut energy = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                energy.push(f(x, y));
            }
        }
        TwoDimensionalMap {
            width,
            height,
            energy,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The raw row-major values.
    pub fn values(&self) -> &[P] {
        &self.energy
    }

    /// One row, as a slice.
    pub fn row(&self, y: u32) -> &[P] {
        let start = self.get_index(0, y);
        &self.energy[start..start + self.width as usize]
    }

    // Absolutely, the number one name of this game is keep the index
    // math in a singular location and never, ever mess with it.  This
    // particular variant is the same one used in image.rs.
    fn get_index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }
}

impl EnergyMap {
    /// Element-wise mean of several same-sized maps.
    pub fn mean(maps: &[&EnergyMap]) -> Result<EnergyMap> {
        let first = maps
            .first()
            .ok_or_else(|| ResizeError::input("cannot average an empty set of energy maps"))?;
        if let Some(odd) = maps.iter().find(|m| m.dimensions() != first.dimensions()) {
            return Err(ResizeError::resource(format!(
                "energy map dimension mismatch: {:?} vs {:?}",
                first.dimensions(),
                odd.dimensions()
            )));
        }
        let count = maps.len() as f64;
        let energy = (0..first.energy.len())
            .map(|i| maps.iter().map(|m| m.energy[i]).sum::<f64>() / count)
            .collect();
        Ok(TwoDimensionalMap {
            width: first.width,
            height: first.height,
            energy,
        })
    }
}

impl<P: Default + Copy> Lattice for TwoDimensionalMap<P> {
    type Cell = P;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn cell(&self, x: u32, y: u32) -> P {
        self.energy[self.get_index(x, y)]
    }
}

impl<P: Default + Copy> Index<(u32, u32)> for TwoDimensionalMap<P> {
    type Output = P;

    /// A convenience addressing mode for getting values.
    fn index(&self, (x, y): (u32, u32)) -> &P {
        let index = self.get_index(x, y);
        &self.energy[index]
    }
}

impl<P: Default + Copy> IndexMut<(u32, u32)> for TwoDimensionalMap<P> {
    /// A convenience addressing mode for setting values.
    fn index_mut(&mut self, (x, y): (u32, u32)) -> &mut P {
        let index = self.get_index(x, y);
        &mut self.energy[index]
    }
}

/// One cell of the seam cost table: the cumulative cost of the
/// cheapest path reaching this cell, and which cell of the previous
/// row it came from.
#[derive(Default, Debug, Copy, Clone, PartialEq)]
pub struct EnergyAndBackPointer {
    pub energy: f64,
    pub parent: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressing_is_row_major() {
        let map = TwoDimensionalMap::from_fn(3, 2, |x, y| x + 10 * y);
        assert_eq!(map.values(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(map[(2, 1)], 12);
        assert_eq!(map.cell(1, 1), 11);
        assert_eq!(map.row(1), &[10, 11, 12]);
    }

    #[test]
    fn from_vec_rejects_short_data() {
        assert!(TwoDimensionalMap::from_vec(3, 3, vec![0u32; 8]).is_err());
        assert!(TwoDimensionalMap::from_vec(3, 3, vec![0u32; 9]).is_ok());
    }

    #[test]
    fn mean_of_maps() {
        let a = EnergyMap::from_vec(2, 1, vec![1.0, 4.0]).unwrap();
        let b = EnergyMap::from_vec(2, 1, vec![3.0, 0.0]).unwrap();
        let m = EnergyMap::mean(&[&a, &b]).unwrap();
        assert_eq!(m.values(), &[2.0, 2.0]);
    }

    #[test]
    fn mean_rejects_mismatched_maps() {
        let a = EnergyMap::new(2, 2);
        let b = EnergyMap::new(3, 2);
        assert!(EnergyMap::mean(&[&a, &b]).unwrap_err().is_resource());
    }
}
