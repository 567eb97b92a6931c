// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Antenna pointing offsets relative to the image phase centre.
//!
//! A pointing centre that differs from the phase centre shifts the primary
//! beam on the sky. In the uv domain this is a phase gradient across the
//! kernel, which is what kernel computers need.

use std::f64::consts::TAU;

use log::trace;

use crate::{ImageGeometry, RADec, VisBatch};

/// Resolves antenna pointing directions into pixel offsets and kernel phase
/// gradients.
#[derive(Clone, Copy, Debug)]
pub struct PointingOffsetResolver {
    /// The kernel oversampling factor.
    pub oversampling: usize,
}

impl PointingOffsetResolver {
    pub fn new(oversampling: usize) -> Self {
        Self { oversampling }
    }

    /// The offset of `pointing` from the image phase centre \[pixels\].
    pub fn pixel_offset(&self, image: &ImageGeometry, pointing: RADec) -> [f64; 2] {
        let [px, py] = image.world_to_pixel(pointing);
        let [cx, cy] = image.world_to_pixel(image.phase_centre);
        [px - cx, py - cy]
    }

    /// Convert a pixel offset into a phase gradient per oversampled kernel
    /// pixel \[radians/pixel\].
    pub fn phase_gradient(&self, image: &ImageGeometry, pixel_offset: [f64; 2]) -> [f64; 2] {
        let os = self.oversampling.max(1) as f64;
        [
            TAU * pixel_offset[0] / (image.nx as f64 * os),
            TAU * pixel_offset[1] / (image.ny as f64 * os),
        ]
    }

    /// The pointing phase gradient for a batch. The batch's pointing is that
    /// of the first antenna of its first row; an empty batch points at the
    /// phase centre.
    pub fn find_pointing_offset(&self, image: &ImageGeometry, batch: &VisBatch) -> [f64; 2] {
        let pointing = match batch.ant1.first() {
            Some(&ant) => batch.antenna_pointing(ant),
            None => image.phase_centre,
        };
        let offset = self.pixel_offset(image, pointing);
        trace!(
            "Pointing {pointing} is offset by ({:.3}, {:.3}) pixels from the phase centre",
            offset[0],
            offset[1]
        );
        self.phase_gradient(image, offset)
    }

    /// The pixel offset of every antenna in a batch.
    pub fn antenna_pixel_offsets(&self, image: &ImageGeometry, batch: &VisBatch) -> Vec<[f64; 2]> {
        (0..batch.num_ants())
            .map(|ant| self.pixel_offset(image, batch.antenna_pointing(ant)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hifitime::Epoch;

    use crate::UVW;

    fn setup() -> (ImageGeometry, VisBatch) {
        let phase_centre = RADec::from_degrees(60.0, -27.0);
        let image = ImageGeometry::new_square(512, (30.0_f64 / 3600.0).to_radians(), phase_centre, 150e6);
        let mut batch = VisBatch::new(Epoch::from_gpst_seconds(0.0), 1.0, -0.4, phase_centre);
        batch.push_row(0, 1, UVW::default());
        (image, batch)
    }

    #[test]
    fn test_no_offset_at_phase_centre() {
        let (image, batch) = setup();
        let resolver = PointingOffsetResolver::new(20);
        let grad = resolver.find_pointing_offset(&image, &batch);
        assert_abs_diff_eq!(grad[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_offset_of_a_few_pixels() {
        let (image, mut batch) = setup();
        let resolver = PointingOffsetResolver::new(20);
        // Point antenna 0 three pixels "up" the image.
        let pointing = image.pixel_to_world([256.0, 259.0]);
        batch.antenna_pointings = vec![pointing, image.phase_centre];

        let offset = resolver.pixel_offset(&image, pointing);
        assert_abs_diff_eq!(offset[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(offset[1], 3.0, epsilon = 1e-6);

        let grad = resolver.find_pointing_offset(&image, &batch);
        assert_abs_diff_eq!(grad[1], TAU * 3.0 / (512.0 * 20.0), epsilon = 1e-8);

        let offsets = resolver.antenna_pixel_offsets(&image, &batch);
        assert_eq!(offsets.len(), 2);
        assert_abs_diff_eq!(offsets[1][1], 0.0, epsilon = 1e-9);
    }
}
