// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The geometry of the sky image being made.
//!
//! Only the direction axes matter to the kernel cache; they use an
//! orthographic (SIN) projection about the image phase centre.

use crate::{RADec, LMN};

/// Describes the sky image (and therefore the uv grid) that visibilities are
/// being gridded for.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageGeometry {
    /// The number of pixels along the first direction axis.
    pub nx: usize,

    /// The number of pixels along the second direction axis.
    pub ny: usize,

    /// The number of polarisation planes.
    pub num_pols: usize,

    /// The number of channel planes.
    pub num_chans: usize,

    /// The angular size of a pixel along each direction axis \[radians\]. As
    /// with FITS images, the first increment is usually negative (RA
    /// increases to the left).
    pub increment_rad: [f64; 2],

    /// The direction at the reference pixel.
    pub phase_centre: RADec,

    /// The (0-indexed) pixel at which `phase_centre` lies. If this is `None`,
    /// the image centre (`nx / 2`, `ny / 2`) is used.
    pub ref_pixel: Option<[f64; 2]>,

    /// The reference frequency of the image \[Hz\].
    pub ref_freq_hz: f64,
}

impl ImageGeometry {
    /// A square image with a single polarisation and channel.
    pub fn new_square(n: usize, cell_size_rad: f64, phase_centre: RADec, ref_freq_hz: f64) -> Self {
        Self {
            nx: n,
            ny: n,
            num_pols: 1,
            num_chans: 1,
            increment_rad: [-cell_size_rad, cell_size_rad],
            phase_centre,
            ref_pixel: None,
            ref_freq_hz,
        }
    }

    /// The image shape `(nx, ny, num_pols, num_chans)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.nx, self.ny, self.num_pols, self.num_chans)
    }

    pub fn ref_pixel(&self) -> [f64; 2] {
        self.ref_pixel
            .unwrap_or([(self.nx / 2) as f64, (self.ny / 2) as f64])
    }

    /// Get the (fractional) pixel coordinates of a sky direction.
    pub fn world_to_pixel(&self, radec: RADec) -> [f64; 2] {
        let LMN { l, m, .. } = radec.to_lmn(self.phase_centre);
        let [ref_x, ref_y] = self.ref_pixel();
        [
            ref_x + l / self.increment_rad[0],
            ref_y + m / self.increment_rad[1],
        ]
    }

    /// Get the sky direction at (fractional) pixel coordinates.
    pub fn pixel_to_world(&self, pixel: [f64; 2]) -> RADec {
        let [ref_x, ref_y] = self.ref_pixel();
        let l = (pixel[0] - ref_x) * self.increment_rad[0];
        let m = (pixel[1] - ref_y) * self.increment_rad[1];
        RADec::from_lmn(LMN::from_lm(l, m), self.phase_centre)
    }

    /// The largest `w` that can sensibly be imaged with this pixel size
    /// \[wavelengths\].
    pub fn max_w(&self) -> f64 {
        0.25 / self.increment_rad[0].abs()
    }

    /// The size of a uv-grid cell along each axis \[wavelengths\].
    pub fn uv_cell_size(&self) -> [f64; 2] {
        [
            1.0 / (self.nx as f64 * self.increment_rad[0].abs()),
            1.0 / (self.ny as f64 * self.increment_rad[1].abs()),
        ]
    }
}
