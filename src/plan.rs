// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Resize plans
//!
//! How many seams to remove or insert on each axis to get from where a
//! batch is to where it needs to be.  Width first, then height.

use crate::error::{ResizeError, Result};
use crate::seam::{Axis, SeamOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStep {
    pub axis: Axis,
    pub op: SeamOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizePlan {
    pub source: (u32, u32),
    pub target_width: u32,
    pub target_height: u32,
    pub steps: Vec<PlanStep>,
}

fn axis_steps(axis: Axis, from: u32, to: u32) -> impl Iterator<Item = PlanStep> {
    let op = if from > to {
        SeamOp::Remove
    } else {
        SeamOp::Insert
    };
    let count = if from > to { from - to } else { to - from };
    (0..count).map(move |_| PlanStep { axis, op })
}

impl ResizePlan {
    pub fn new(source: (u32, u32), (target_width, target_height): (u32, u32)) -> Result<Self> {
        if source.0 == 0 || source.1 == 0 {
            return Err(ResizeError::input(format!(
                "source dimensions {}x{} are empty",
                source.0, source.1
            )));
        }
        if target_width == 0 || target_height == 0 {
            return Err(ResizeError::input(format!(
                "target dimensions {}x{} must both be positive",
                target_width, target_height
            )));
        }
        let steps = axis_steps(Axis::Width, source.0, target_width)
            .chain(axis_steps(Axis::Height, source.1, target_height))
            .collect();
        Ok(ResizePlan {
            source,
            target_width,
            target_height,
            steps,
        })
    }

    pub fn target(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// The steps for one axis, in order.
    pub fn steps_for(&self, axis: Axis) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(move |s| s.axis == axis)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The axes on which the target is more than `ratio` times the
    /// source, or the source more than `ratio` times the target.
    pub fn distorted_axes(&self, ratio: f64) -> Vec<Axis> {
        [Axis::Width, Axis::Height]
            .iter()
            .cloned()
            .filter(|&axis| {
                let from = f64::from(axis.of(self.source));
                let to = f64::from(axis.of(self.target()));
                to > ratio * from || from > ratio * to
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_steps_come_first() {
        let plan = ResizePlan::new((10, 6), (8, 9)).unwrap();
        assert_eq!(plan.len(), 5);
        assert!(plan.steps[..2]
            .iter()
            .all(|s| s.axis == Axis::Width && s.op == SeamOp::Remove));
        assert!(plan.steps[2..]
            .iter()
            .all(|s| s.axis == Axis::Height && s.op == SeamOp::Insert));
        assert_eq!(plan.steps_for(Axis::Height).count(), 3);
    }

    #[test]
    fn no_change_no_steps() {
        let plan = ResizePlan::new((10, 6), (10, 6)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn zero_targets_are_input_errors() {
        assert!(ResizePlan::new((10, 6), (0, 6)).is_err());
        assert!(ResizePlan::new((10, 6), (10, 0)).is_err());
    }

    #[test]
    fn distortion_is_symmetric() {
        let grow = ResizePlan::new((10, 10), (25, 10)).unwrap();
        assert_eq!(grow.distorted_axes(2.0), vec![Axis::Width]);
        let shrink = ResizePlan::new((10, 10), (10, 4)).unwrap();
        assert_eq!(shrink.distorted_axes(2.0), vec![Axis::Height]);
        assert!(shrink.distorted_axes(3.0).is_empty());
    }
}
