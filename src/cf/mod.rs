// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to abstract convolution-function (kernel) computation.
//!
//! [`ConvFuncComputer`] is a trait detailing how kernels are made and stored
//! in a [`CfCache`]. Beam models are plugged in by implementing it; this crate
//! provides [`GaussianConvFunc`], an analytic model.

mod error;
mod gaussian;
pub mod support;

pub use error::ConvFuncError;
pub use gaussian::GaussianConvFunc;

use itertools::Itertools;
use log::trace;
use ndarray::prelude::*;

use crate::{
    antenna::baseline_type, c32, cache::CfCache, pointing::PointingOffsetResolver,
    CfBufferHandle, CfConfig, ImageGeometry, PolOuterProduct, VisBatch,
};

/// A summary of the frequency setup of a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisParams {
    /// Identifies the frequency band of the batch. Batches with the same band
    /// ID can share kernels.
    pub band_id: usize,

    /// The reference frequency of the image \[Hz\].
    pub ref_freq_hz: f64,

    /// The lowest and highest channel frequencies \[Hz\].
    pub freq_range_hz: (f64, f64),

    pub num_chans: usize,
}

/// A trait abstracting kernel computation.
pub trait ConvFuncComputer: Sync + Send {
    /// The settings used to make kernels.
    fn config(&self) -> &CfConfig;

    /// Summarise the frequency setup of a batch. The band ID is the index of
    /// the batch's lowest frequency in units of the configured frequency
    /// increment.
    fn get_vis_params(
        &self,
        batch: &VisBatch,
        image: &ImageGeometry,
    ) -> Result<VisParams, ConvFuncError> {
        let (min, max) = batch.freq_range_hz().ok_or(ConvFuncError::NoChannels)?;
        let freq_incr = self.config().freq_increment_hz;
        let band_id = if freq_incr > 0.0 {
            (min / freq_incr).floor() as usize
        } else {
            0
        };
        Ok(VisParams {
            band_id,
            ref_freq_hz: image.ref_freq_hz,
            freq_range_hz: (min, max),
            num_chans: batch.num_chans(),
        })
    }

    /// Make the gridding kernels (into `cfs`) and the weighting kernels (into
    /// `cfwts`) for every antenna-pair type in `batch`, at parallactic angle
    /// `pa`. Cache cells are found (or added) with `pa_increment` as the PA
    /// tolerance.
    ///
    /// `uv_scale` and `uv_offset` are those used to put visibilities on the
    /// grid (see [`crate::ResamplerParams`]). `freq_selection` restricts the
    /// channels kernels are made for; if it is `None`, all channels are used.
    ///
    /// If `fill` is false, only the buffers' axes and the cells' parameters
    /// are set up; no kernel values are computed.
    #[allow(clippy::too_many_arguments)]
    fn make_conv_function(
        &self,
        image: &ImageGeometry,
        batch: &VisBatch,
        w_planes: usize,
        pol: &PolOuterProduct,
        vis_pol_map: &[i32],
        pa: f64,
        pa_increment: f64,
        uv_scale: [f64; 3],
        uv_offset: [f64; 3],
        freq_selection: Option<&[usize]>,
        cfs: &mut CfCache,
        cfwts: &mut CfCache,
        fill: bool,
    ) -> Result<(), ConvFuncError>;

    /// Multiply `out` by the complex image-domain average response of the
    /// batch. If `reset` is true, `out` is set to 1 first. `out` has the
    /// image's shape `(nx, ny, num_pols, num_chans)`.
    fn make_average_response_complex(
        &self,
        batch: &VisBatch,
        image: &ImageGeometry,
        out: &mut Array4<c32>,
        reset: bool,
    ) -> Result<(), ConvFuncError>;

    /// As with [`ConvFuncComputer::make_average_response_complex`], but the
    /// result is normalised and made real with
    /// [`normalize_average_response`].
    fn make_average_response(
        &self,
        batch: &VisBatch,
        image: &ImageGeometry,
        out: &mut Array4<f32>,
        reset: bool,
    ) -> Result<(), ConvFuncError> {
        let mut response = out.mapv(|v| c32::new(v, 0.0));
        self.make_average_response_complex(batch, image, &mut response, reset)?;
        *out = normalize_average_response(response.view());
        Ok(())
    }

    /// Find the support radius of a kernel \[oversampled pixels\]. See
    /// [`support::find_support`].
    fn find_support(&self, kernel: ArrayView2<c32>, threshold: f32, origin: usize) -> Option<usize> {
        support::find_support(kernel, threshold, origin)
    }

    /// The pointing offset of the batch relative to the image phase centre,
    /// as a phase gradient per oversampled kernel pixel \[radians/pixel\].
    fn find_pointing_offset(&self, image: &ImageGeometry, batch: &VisBatch) -> [f64; 2] {
        PointingOffsetResolver::new(self.config().oversampling).find_pointing_offset(image, batch)
    }

    /// Work out which kernels the rows of a batch need that haven't been
    /// computed. `row_map` holds the buffer of each row, if one was found.
    /// The distinct antenna-pair types of rows without computed kernels are
    /// returned, in row order.
    fn prepare_conv_function(
        &self,
        batch: &VisBatch,
        row_map: &[Option<CfBufferHandle>],
    ) -> Vec<(i32, i32)> {
        let needed = batch
            .ant1
            .iter()
            .zip(batch.ant2.iter())
            .enumerate()
            .filter(|(row, _)| match row_map.get(*row) {
                Some(Some(handle)) => !handle.read().cells().any(|c| c.has_kernel()),
                _ => true,
            })
            .map(|(_, (&a1, &a2))| {
                baseline_type(
                    self.map_ant_id_to_ant_type(a1),
                    self.map_ant_id_to_ant_type(a2),
                )
            })
            .unique()
            .collect::<Vec<_>>();
        trace!("{} antenna-pair types need kernels", needed.len());
        needed
    }

    /// Map an antenna index to its antenna type. By default every antenna is
    /// its own type.
    fn map_ant_id_to_ant_type(&self, ant: usize) -> i32 {
        ant as i32
    }
}

/// Get the w scale for a number of w planes. w planes are spaced
/// quadratically up to the largest w the image can support; with one (or
/// zero) planes there's no W-projection and the scale is 0.
pub fn w_scale_for(w_planes: usize, image: &ImageGeometry) -> f64 {
    if w_planes <= 1 {
        return 0.0;
    }
    let n = (w_planes - 1) as f64;
    n * n / image.max_w()
}

/// The w value of each of `w_planes` planes \[wavelengths\]; `w_i = i^2 /
/// w_scale`.
pub fn make_w_values(w_scale: f64, w_planes: usize) -> Vec<f64> {
    if w_scale <= 0.0 {
        return vec![0.0];
    }
    (0..w_planes.max(1))
        .map(|i| (i * i) as f64 / w_scale)
        .collect()
}

/// The kernel frequencies needed to cover `freqs_hz`, spaced by `freq_incr_hz`
/// from the lowest frequency.
pub fn make_freq_values(freqs_hz: &[f64], freq_incr_hz: f64) -> Vec<f64> {
    let (min, max) = match freqs_hz.iter().copied().minmax().into_option() {
        Some(mm) => mm,
        None => return vec![],
    };
    if freq_incr_hz <= 0.0 {
        return vec![min];
    }
    let n = ((max - min) / freq_incr_hz).floor() as usize + 1;
    (0..n).map(|i| min + i as f64 * freq_incr_hz).collect()
}

/// Normalise an average response. Each polarisation plane of each channel is
/// divided by its peak magnitude, then every plane of the channel is set to
/// `sqrt(re(first * last))` of its first and last polarisation planes.
pub fn normalize_average_response(response: ArrayView4<c32>) -> Array4<f32> {
    let (nx, ny, num_pols, num_chans) = response.dim();
    let mut out = Array4::zeros((nx, ny, num_pols, num_chans));
    if num_pols == 0 {
        return out;
    }
    for (chan_response, mut chan_out) in response
        .axis_iter(Axis(3))
        .zip(out.axis_iter_mut(Axis(3)))
    {
        let peaks: Vec<f32> = chan_response
            .axis_iter(Axis(2))
            .map(|plane| plane.iter().map(|v| v.norm()).fold(0.0, f32::max))
            .collect();
        let first = chan_response.index_axis(Axis(2), 0);
        let last = chan_response.index_axis(Axis(2), num_pols - 1);
        let (p_first, p_last) = (peaks[0], peaks[num_pols - 1]);
        let combined = ndarray::Zip::from(&first).and(&last).map_collect(|&a, &b| {
            let a = if p_first > 0.0 { a / p_first } else { a };
            let b = if p_last > 0.0 { b / p_last } else { b };
            (a * b).re.max(0.0).sqrt()
        });
        for mut plane in chan_out.axis_iter_mut(Axis(2)) {
            plane.assign(&combined);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    use crate::RADec;

    #[test]
    fn test_w_values() {
        let image = ImageGeometry::new_square(256, 1e-3, RADec::default(), 150e6);
        assert_abs_diff_eq!(w_scale_for(1, &image), 0.0);
        assert_eq!(make_w_values(0.0, 1), vec![0.0]);

        let w_scale = w_scale_for(5, &image);
        assert_abs_diff_eq!(w_scale, 16.0 / 250.0);
        let w = make_w_values(w_scale, 5);
        assert_eq!(w.len(), 5);
        // The last plane is at the largest w.
        assert_abs_diff_eq!(w[4], 250.0, epsilon = 1e-9);
        assert_abs_diff_eq!(w[1], 250.0 / 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_freq_values() {
        assert!(make_freq_values(&[], 1e6).is_empty());
        assert_eq!(make_freq_values(&[150e6], 1e6), vec![150e6]);
        let f = make_freq_values(&[170e6, 150e6, 160e6, 172.5e6], 10e6);
        assert_eq!(f, vec![150e6, 160e6, 170e6]);
    }

    #[test]
    fn test_normalize_average_response() {
        let mut response = Array4::from_elem((4, 4, 2, 1), c32::new(2.0, 0.0));
        response[(1, 1, 0, 0)] = c32::new(4.0, 0.0);
        response[(1, 1, 1, 0)] = c32::new(4.0, 0.0);
        let out = normalize_average_response(response.view());
        assert_eq!(out.dim(), (4, 4, 2, 1));
        assert_abs_diff_eq!(out[(1, 1, 0, 0)], 1.0);
        assert_abs_diff_eq!(out[(1, 1, 1, 0)], 1.0);
        assert_abs_diff_eq!(out[(0, 0, 0, 0)], 0.5);
        assert_abs_diff_eq!(out[(3, 2, 1, 0)], 0.5);
    }
}
