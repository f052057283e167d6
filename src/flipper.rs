// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Lattice dimensional flipper
//!
//! A proxy for any `Lattice` that maps the width to the original
//! height, and vice versa, as well as every x to y and vice versa.
//!
//! A horizontal seam through a map is a vertical seam through the
//! flipped map, so the seam finder only has to know one recurrence.
//! Nothing is copied; the flip is purely in the addressing.

use crate::twodmap::Lattice;

pub struct Flipper<'a, L: Lattice> {
    pub lattice: &'a L,
}

impl<'a, L: Lattice> Flipper<'a, L> {
    pub fn new(lattice: &'a L) -> Self {
        Flipper { lattice }
    }
}

impl<'a, L: Lattice> Lattice for Flipper<'a, L> {
    type Cell = L::Cell;

    fn dimensions(&self) -> (u32, u32) {
        let (x, y) = self.lattice.dimensions();
        (y, x)
    }

    fn cell(&self, x: u32, y: u32) -> L::Cell {
        self.lattice.cell(y, x)
    }
}
