// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calculate the energy of a frame
//!
//! Two signals go into the importance of a pixel.  The spatial energy
//! is the Sobel gradient magnitude of the frame's luminance; it is high
//! on edges and zero on flat color.  The temporal energy is the mean
//! absolute luminance change of the pixel across a window of frames;
//! it is high wherever something moves.  A seam that avoids both will
//! stay away from detail *and* stay put from one frame to the next.

use crate::error::{ResizeError, Result};
use crate::seam::{Orientation, Seam, SeamOp};
use crate::twodmap::{EnergyMap, TwoDimensionalMap};
use image::{GenericImageView, Pixel, Primitive};
use itertools::{iproduct, Itertools};
use num_traits::cast;

/// The luminance of a single pixel, in the pixel's own subpixel scale.
#[inline]
pub fn luminance<P, S>(p: &P) -> f64
where
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    cast(p.to_luma().0[0]).unwrap_or(0.0)
}

/// The luminance of every pixel of an image.
pub fn luma_plane<I, P, S>(image: &I) -> TwoDimensionalMap<f64>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    let (width, height) = image.dimensions();
    TwoDimensionalMap::from_fn(width, height, |x, y| luminance(&image.get_pixel(x, y)))
}

// The Sobel response at (x, y).  Addresses outside the frame are
// clamped to the nearest edge pixel, so the border behaves as if the
// edge were replicated outward and a flat frame stays at zero
// everywhere.
//
//      ⎡-1 0 1⎤        ⎡-1 -2 -1⎤
// Gx = ⎢-2 0 2⎥   Gy = ⎢ 0  0  0⎥   e(x,y) = √(Gx² + Gy²)
//      ⎣-1 0 1⎦        ⎣ 1  2  1⎦
#[inline]
fn sobel_at<F>(luma: F, (width, height): (u32, u32), x: u32, y: u32) -> f64
where
    F: Fn(u32, u32) -> f64,
{
    let (mw, mh) = (i64::from(width) - 1, i64::from(height) - 1);
    let at = |dx: i64, dy: i64| {
        let cx = (i64::from(x) + dx).max(0).min(mw) as u32;
        let cy = (i64::from(y) + dy).max(0).min(mh) as u32;
        luma(cx, cy)
    };
    let gx = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1)) - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
    let gy = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)) - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
    (gx * gx + gy * gy).sqrt()
}

/// Compute the spatial energy of every pixel in an image: the
/// gradient magnitude of its luminance.  Pure; the image is only read.
pub fn spatial_energy<I, P, S>(image: &I) -> EnergyMap
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    let plane = luma_plane(image);
    let dimensions = plane.dimensions();
    let (width, height) = dimensions;
    TwoDimensionalMap {
        width,
        height,
        energy: iproduct!(0..height, 0..width)
            .map(|(y, x)| sobel_at(|lx, ly| plane[(lx, ly)], dimensions, x, y))
            .collect(),
    }
}

/// The mean absolute luminance difference between each consecutive
/// pair of frames in the window.  A window of one frame has no motion
/// in it and yields zeros.
pub fn temporal_energy<I, P, S>(frames: &[&I]) -> Result<EnergyMap>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = S> + 'static,
    S: Primitive + 'static,
{
    let first = frames
        .first()
        .ok_or_else(|| ResizeError::input("temporal energy needs at least one frame"))?;
    let (width, height) = first.dimensions();
    if let Some(odd) = frames.iter().position(|f| f.dimensions() != (width, height)) {
        return Err(ResizeError::input(format!(
            "temporal window frame is {:?}, expected {:?}",
            frames[odd].dimensions(),
            (width, height)
        ))
        .in_frame(odd));
    }

    let mut temporal = EnergyMap::new(width, height);
    if frames.len() < 2 {
        return Ok(temporal);
    }

    let planes: Vec<_> = frames.iter().map(|f| luma_plane(*f)).collect();
    for (before, after) in planes.iter().tuple_windows() {
        for (t, (b, a)) in temporal
            .energy
            .iter_mut()
            .zip(before.values().iter().zip(after.values()))
        {
            *t += (a - b).abs();
        }
    }
    let pairs = (frames.len() - 1) as f64;
    temporal.energy.iter_mut().for_each(|t| *t /= pairs);
    Ok(temporal)
}

/// Blend the two signals: `weight·temporal + (1−weight)·spatial`.
pub fn combine(spatial: &EnergyMap, temporal: &EnergyMap, weight: f64) -> Result<EnergyMap> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(ResizeError::input(format!(
            "temporal weight {} is outside [0, 1]",
            weight
        )));
    }
    if spatial.dimensions() != temporal.dimensions() {
        return Err(ResizeError::resource(format!(
            "cannot combine a {:?} spatial map with a {:?} temporal map",
            spatial.dimensions(),
            temporal.dimensions()
        )));
    }
    Ok(TwoDimensionalMap {
        width: spatial.width,
        height: spatial.height,
        energy: spatial
            .values()
            .iter()
            .zip(temporal.values())
            .map(|(s, t)| weight * t + (1.0 - weight) * s)
            .collect(),
    })
}

// Where a cell of the edited map came from in the map before the edit,
// measured across the seam.  Only meaningful outside the band, where
// the cell is an unmodified pixel.
#[inline]
fn source_offset(op: SeamOp, cross: u32, seam_at: u32) -> u32 {
    match op {
        SeamOp::Remove if cross >= seam_at => cross + 1,
        SeamOp::Insert if cross > seam_at => cross - 1,
        _ => cross,
    }
}

/// After one seam edit, build the spatial energy map of the edited
/// frame from the map of the frame before the edit.  Only the cells
/// within `band` of the seam are recomputed; everything else is
/// shifted across from `energy`.
///
/// The Sobel kernel reaches one pixel in every direction and the seam
/// moves at most one pixel per row, so with `band >= 2` the result is
/// exactly what `spatial_energy(edited)` would give.  Narrower bands
/// are cheaper and approximate.
pub fn update_local<I, P, S>(
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
    seam.validate(energy.dimensions())?;
    let expected = seam.dimensions_after(op, energy.dimensions());
    let dimensions = edited.dimensions();
    if dimensions != expected {
        return Err(ResizeError::algorithm(format!(
            "edited frame is {:?}, expected {:?} after one {:?} seam",
            dimensions, expected, seam.orientation
        )));
    }

    let luma = |x: u32, y: u32| luminance(&edited.get_pixel(x, y));
    let (ew, eh) = dimensions;
    Ok(TwoDimensionalMap::from_fn(ew, eh, |x, y| {
        let (cross, seam_at) = match seam.orientation {
            Orientation::Vertical => (x, seam.indices[y as usize]),
            Orientation::Horizontal => (y, seam.indices[x as usize]),
        };
        if (i64::from(cross) - i64::from(seam_at)).abs() <= i64::from(band) {
            sobel_at(&luma, dimensions, x, y)
        } else {
            let from = source_offset(op, cross, seam_at);
            match seam.orientation {
                Orientation::Vertical => energy[(from, y)],
                Orientation::Horizontal => energy[(x, from)],
            }
        }
    }))
}
