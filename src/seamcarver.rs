// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Seam editing
//!
//! Cut one seam out of a frame, or stitch one in.  Either way the
//! result is a new frame exactly one pixel narrower, wider, shorter or
//! taller than the original; the frame passed in is never touched.
//! The same edit can be applied to any energy map, so maps that ride
//! along with a frame stay aligned with it.

use crate::energy;
use crate::error::{ResizeError, Result};
use crate::seam::{Orientation, Seam, SeamOp};
use crate::twodmap::{EnergyMap, TwoDimensionalMap};
use image::{GenericImageView, ImageBuffer, Pixel, Primitive};
use num_traits::cast;

// Where the value of an edited cell comes from, measured across the
// seam.  A removal only ever copies; an insertion also creates one new
// cell per row (or column) between two existing ones.
enum Source {
    Copy(u32),
    Between(u32, u32),
}

#[inline]
fn source_of(op: SeamOp, cross: u32, seam_at: u32) -> Source {
    match op {
        SeamOp::Remove if cross < seam_at => Source::Copy(cross),
        SeamOp::Remove => Source::Copy(cross + 1),
        SeamOp::Insert if cross < seam_at => Source::Copy(cross),
        SeamOp::Insert if cross == seam_at => Source::Between(seam_at.saturating_sub(1), seam_at),
        SeamOp::Insert => Source::Copy(cross - 1),
    }
}

// The value at (x, y) of the edited grid, in terms of the grid before
// the edit.
#[inline]
fn carved_cell<T, G, B>(seam: &Seam, op: SeamOp, x: u32, y: u32, get: &G, blend: &B) -> T
where
    G: Fn(u32, u32) -> T,
    B: Fn(T, T) -> T,
{
    let (cross, seam_at) = match seam.orientation {
        Orientation::Vertical => (x, seam.indices[y as usize]),
        Orientation::Horizontal => (y, seam.indices[x as usize]),
    };
    let at = |c: u32| match seam.orientation {
        Orientation::Vertical => get(c, y),
        Orientation::Horizontal => get(x, c),
    };
    match source_of(op, cross, seam_at) {
        Source::Copy(c) => at(c),
        Source::Between(a, b) => blend(at(a), at(b)),
    }
}

fn check_edit(seam: &Seam, op: SeamOp, dimensions: (u32, u32)) -> Result<(u32, u32)> {
    seam.validate(dimensions)?;
    let after = seam.dimensions_after(op, dimensions);
    if after.0 == 0 || after.1 == 0 {
        return Err(ResizeError::input(format!(
            "removing a {:?} seam would leave a {}x{} frame",
            seam.orientation, after.0, after.1
        )));
    }
    Ok(after)
}

#[inline]
fn midpoint<S: Primitive>(a: S, b: S) -> S {
    let (fa, fb): (f64, f64) = (cast(a).unwrap_or(0.0), cast(b).unwrap_or(0.0));
    cast((fa + fb) / 2.0).unwrap_or(a)
}

/// The pixel halfway between two others, channel by channel.  Integer
/// channels round down.
pub fn blend_pixels<P, S>(a: P, b: P) -> P
where
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    a.map2(&b, midpoint)
}

/// Apply one seam edit to a frame.
pub fn edit<I, P, S>(image: &I, seam: &Seam, op: SeamOp) -> Result<ImageBuffer<P, Vec<S>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    let (width, height) = check_edit(seam, op, image.dimensions())?;
    let get = |x: u32, y: u32| image.get_pixel(x, y);
    Ok(ImageBuffer::from_fn(width, height, |x, y| {
        carved_cell(seam, op, x, y, &get, &blend_pixels::<P, S>)
    }))
}

/// Drop the seam pixel from every row (vertical seam) or column
/// (horizontal seam), closing the gap.
pub fn remove_seam<I, P, S>(image: &I, seam: &Seam) -> Result<ImageBuffer<P, Vec<S>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    edit(image, seam, SeamOp::Remove)
}

/// Open a one-pixel gap at the seam in every row (or column) and fill
/// it with the average of the pixels on either side of it.  At index 0
/// there is no pixel before the gap, so the pixel after it is
/// repeated.
pub fn insert_seam<I, P, S>(image: &I, seam: &Seam) -> Result<ImageBuffer<P, Vec<S>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    edit(image, seam, SeamOp::Insert)
}

/// Apply the same seam edit to an energy map.  Inserted cells get the
/// mean of their neighbours.
pub fn carve_map(map: &EnergyMap, seam: &Seam, op: SeamOp) -> Result<EnergyMap> {
    let (width, height) = check_edit(seam, op, map.dimensions())?;
    let get = |x: u32, y: u32| map[(x, y)];
    let blend = |a: f64, b: f64| (a + b) / 2.0;
    Ok(TwoDimensionalMap::from_fn(width, height, |x, y| {
        carved_cell(seam, op, x, y, &get, &blend)
    }))
}

/// Add `amount` to both cells of a freshly inserted seam in a map that
/// has already been widened (or heightened) by it: the new cell at the
/// seam index and the original one pushed over beside it.
pub fn mark_insertion(map: &mut EnergyMap, seam: &Seam, amount: f64) {
    let (width, height) = map.dimensions();
    for (along, &at) in seam.indices.iter().enumerate() {
        let along = along as u32;
        for cross in at..=at + 1 {
            let cell = match seam.orientation {
                Orientation::Vertical => (cross, along),
                Orientation::Horizontal => (along, cross),
            };
            if cell.0 < width && cell.1 < height {
                map[cell] += amount;
            }
        }
    }
}

/// Bring a spatial energy map up to date with an edited frame.
pub fn update_energy<I, P, S>(
    energy: &EnergyMap,
    seam: &Seam,
    op: SeamOp,
    edited: &I,
    band: u32,
) -> Result<EnergyMap>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    energy::update_local(energy, seam, op, edited, band)
}
