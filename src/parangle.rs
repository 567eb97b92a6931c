// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Detect when the parallactic angle has changed enough that new kernels are
//! needed.

use log::debug;

use crate::VisBatch;

/// Tracks the parallactic angle of the last batch that kernels were found for.
#[derive(Clone, Debug, PartialEq)]
pub struct ParAngleChangeDetector {
    tolerance_rad: f64,
    last_pa_rad: Option<f64>,
}

impl ParAngleChangeDetector {
    pub fn new(tolerance_rad: f64) -> Self {
        Self {
            tolerance_rad,
            last_pa_rad: None,
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance_rad
    }

    pub fn last_pa(&self) -> Option<f64> {
        self.last_pa_rad
    }

    /// Has the parallactic angle changed by more than the tolerance since the
    /// last [`ParAngleChangeDetector::update`]? This is always true before
    /// the first update.
    pub fn changed(&self, batch: &VisBatch) -> bool {
        match self.last_pa_rad {
            None => true,
            Some(last) => (batch.parallactic_angle() - last).abs() > self.tolerance_rad,
        }
    }

    /// Remember this batch's parallactic angle.
    pub fn update(&mut self, batch: &VisBatch) {
        let pa = batch.parallactic_angle();
        debug!(
            "Parallactic angle at {} is {:.3} deg",
            batch.timestamp,
            pa.to_degrees()
        );
        self.last_pa_rad = Some(pa);
    }

    pub fn reset(&mut self) {
        self.last_pa_rad = None;
    }
}
