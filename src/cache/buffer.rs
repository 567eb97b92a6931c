// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Kernel buffers: all of the kernels for one (parallactic angle,
//! antenna-pair type) cache cell, indexed by (frequency, w, Mueller element).

use std::ops::Deref;

use log::trace;
use ndarray::prelude::*;
use parking_lot::RwLockWriteGuard;

use crate::{
    c32,
    math::nint,
    polarisation::{MuellerElement, PolIndexMat, PolMat},
    VisBatch,
};

/// A single kernel and its metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CfCell {
    /// The kernel, if it has been computed. Kernels sized in a "dry run" have
    /// metadata but no values.
    pub(crate) kernel: Option<Array2<c32>>,

    /// The (oversampled) shape the kernel was, or will be, computed with.
    pub(crate) shape: [usize; 2],

    /// The oversampling factor of the kernel.
    pub(crate) sampling: f32,

    /// The support radius in un-oversampled grid pixels.
    pub(crate) x_support: i32,
    pub(crate) y_support: i32,

    /// The frequency this kernel was made for \[Hz\].
    pub(crate) freq_hz: f64,

    /// The w value this kernel was made for \[wavelengths\].
    pub(crate) w_value: f64,

    pub(crate) mueller_element: MuellerElement,

    /// The parallactic angle this kernel was made for \[radians\].
    pub(crate) pa_rad: f64,
}

impl CfCell {
    /// The kernel values, if they have been computed.
    pub fn kernel(&self) -> Option<ArrayView2<c32>> {
        self.kernel.as_ref().map(|k| k.view())
    }

    /// Has this cell been set up (whether or not its kernel is computed)?
    pub fn is_set_up(&self) -> bool {
        self.shape != [0, 0]
    }

    pub fn has_kernel(&self) -> bool {
        self.kernel.is_some()
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn sampling(&self) -> f32 {
        self.sampling
    }

    pub fn support(&self) -> [i32; 2] {
        [self.x_support, self.y_support]
    }

    /// The pixel of the kernel corresponding to zero offset.
    pub fn origin(&self) -> [usize; 2] {
        match &self.kernel {
            Some(k) => [k.dim().0 / 2, k.dim().1 / 2],
            None => [self.shape[0] / 2, self.shape[1] / 2],
        }
    }

    pub fn freq_hz(&self) -> f64 {
        self.freq_hz
    }

    pub fn w_value(&self) -> f64 {
        self.w_value
    }

    pub fn mueller_element(&self) -> MuellerElement {
        self.mueller_element
    }

    pub fn pa_rad(&self) -> f64 {
        self.pa_rad
    }

    /// The number of bytes used by this cell's kernel values.
    pub fn mem_usage(&self) -> usize {
        self.kernel
            .as_ref()
            .map(|k| k.len() * std::mem::size_of::<c32>())
            .unwrap_or(0)
    }
}

/// All of the kernels of one cache cell. The cells of the buffer are laid out
/// as `[frequency][w][Mueller element]`, where the Mueller axis is the
/// flattened polarisation matrix.
///
/// A buffer is only modified through a [`CfBufferFill`], which is only
/// available with exclusive access to the owning
/// [`CfCache`](super::CfCache).
#[derive(Clone, Debug)]
pub struct CfBuffer {
    pub(crate) cells: Array3<CfCell>,
    pub(crate) freq_values: Vec<f64>,
    pub(crate) w_values: Vec<f64>,
    pub(crate) w_scale: f64,
    pub(crate) freq_incr: f64,
    pub(crate) pol_mat: PolMat,
    pub(crate) pol_index_mat: PolIndexMat,
    pub(crate) conj_pol_mat: PolMat,
    pub(crate) conj_pol_index_mat: PolIndexMat,
    pub(crate) pointing_offset: [f64; 2],

    // Per-batch maps.
    pub(crate) freq_ndx_map: Vec<usize>,
    pub(crate) conj_freq_ndx_map: Vec<usize>,
    pub(crate) vis_pol_map: Vec<i32>,
    pub(crate) conj_vis_pol_map: Vec<i32>,
    pub(crate) max_x_support: Option<i32>,
}

impl Default for CfBuffer {
    fn default() -> Self {
        Self {
            cells: Array3::default((0, 0, 0)),
            freq_values: vec![],
            w_values: vec![],
            w_scale: 0.0,
            freq_incr: 0.0,
            pol_mat: vec![],
            pol_index_mat: vec![],
            conj_pol_mat: vec![],
            conj_pol_index_mat: vec![],
            pointing_offset: [0.0; 2],
            freq_ndx_map: vec![],
            conj_freq_ndx_map: vec![],
            vis_pol_map: vec![],
            conj_vis_pol_map: vec![],
            max_x_support: None,
        }
    }
}

impl CfBuffer {
    /// `(num_freqs, num_w, num_mueller)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.cells.dim()
    }

    /// A buffer that has never been resized holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn freq_values(&self) -> &[f64] {
        &self.freq_values
    }

    pub fn w_values(&self) -> &[f64] {
        &self.w_values
    }

    pub fn w_scale(&self) -> f64 {
        self.w_scale
    }

    pub fn freq_incr(&self) -> f64 {
        self.freq_incr
    }

    pub fn pol_mat(&self) -> &PolMat {
        &self.pol_mat
    }

    pub fn conj_pol_mat(&self) -> &PolMat {
        &self.conj_pol_mat
    }

    pub fn pol_index_mat(&self) -> &PolIndexMat {
        &self.pol_index_mat
    }

    pub fn conj_pol_index_mat(&self) -> &PolIndexMat {
        &self.conj_pol_index_mat
    }

    /// The pointing phase gradient the kernels were made with.
    pub fn pointing_offset(&self) -> [f64; 2] {
        self.pointing_offset
    }

    /// For each channel of the last batch given to
    /// [`CfBuffer::init_maps`], the frequency index of its kernels.
    pub fn freq_ndx_map(&self) -> &[usize] {
        &self.freq_ndx_map
    }

    /// As with [`CfBuffer::freq_ndx_map`], but for conjugate frequencies.
    pub fn conj_freq_ndx_map(&self) -> &[usize] {
        &self.conj_freq_ndx_map
    }

    pub fn vis_pol_map(&self) -> &[i32] {
        &self.vis_pol_map
    }

    pub fn conj_vis_pol_map(&self) -> &[i32] {
        &self.conj_vis_pol_map
    }

    /// The largest kernel support in this buffer, available after
    /// [`CfBuffer::prime`].
    pub fn max_x_support(&self) -> Option<i32> {
        self.max_x_support
    }

    pub fn cell(&self, ifreq: usize, iw: usize, imueller: usize) -> Option<&CfCell> {
        self.cells.get((ifreq, iw, imueller))
    }

    /// Iterate over every cell of the buffer.
    pub fn cells(&self) -> impl Iterator<Item = &CfCell> {
        self.cells.iter()
    }

    /// The index of the kernel frequency closest to `freq_hz`.
    pub fn nearest_freq_index(&self, freq_hz: f64) -> Option<usize> {
        self.freq_values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - freq_hz)
                    .abs()
                    .partial_cmp(&(*b - freq_hz).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// The index of the w plane for `w` \[wavelengths\]. w planes are spaced
    /// quadratically (`w_i = i^2 / w_scale`), so the index is
    /// `nint(sqrt(w_scale * |w|))`. [`None`] is returned if `w` is beyond the
    /// last plane.
    pub fn nearest_w_index(&self, w: f64) -> Option<usize> {
        if self.w_values.is_empty() {
            return None;
        }
        if self.w_scale <= 0.0 {
            return Some(0);
        }
        let iw = nint((self.w_scale * w.abs()).sqrt()) as usize;
        (iw < self.w_values.len()).then_some(iw)
    }

    /// The index of a Mueller element on this buffer's Mueller axis.
    pub fn mueller_index(&self, element: MuellerElement) -> Option<usize> {
        self.pol_mat.iter().flatten().position(|&e| e == element)
    }

    /// Get the cell nearest to a frequency and w value, for a Mueller element.
    pub fn get_cell(&self, freq_hz: f64, w: f64, element: MuellerElement) -> Option<&CfCell> {
        let ifreq = self.nearest_freq_index(freq_hz)?;
        let iw = self.nearest_w_index(w)?;
        let imueller = self.mueller_index(element)?;
        self.cell(ifreq, iw, imueller)
    }

    /// Precompute, for each channel of a batch, the frequency index of its
    /// kernels. Conjugate frequencies are reflected about the image reference
    /// frequency.
    pub fn init_maps(&mut self, batch: &VisBatch, im_ref_freq_hz: f64) {
        if self.freq_values.is_empty() {
            self.freq_ndx_map.clear();
            self.conj_freq_ndx_map.clear();
            return;
        }
        self.freq_ndx_map = batch
            .freqs_hz
            .iter()
            .map(|&f| self.nearest_freq_index(f).unwrap_or(0))
            .collect();
        self.conj_freq_ndx_map = batch
            .freqs_hz
            .iter()
            .map(|&f| self.nearest_freq_index(2.0 * im_ref_freq_hz - f).unwrap_or(0))
            .collect();
    }

    /// Set the visibility polarisation -> Mueller-axis maps.
    pub fn init_pol_maps(&mut self, pol_map: &[i32], conj_pol_map: &[i32]) {
        self.vis_pol_map = pol_map.to_vec();
        self.conj_vis_pol_map = conj_pol_map.to_vec();
    }

    /// Touch every cell ahead of gridding, caching the largest support.
    pub fn prime(&mut self) {
        self.max_x_support = self
            .cells
            .iter()
            .filter(|c| c.is_set_up())
            .map(|c| c.x_support)
            .max();
    }

    /// The number of bytes used by all kernel values of this buffer.
    pub fn mem_usage(&self) -> usize {
        self.cells.iter().map(|c| c.mem_usage()).sum()
    }
}

/// The parameters that describe one kernel of a [`CfBuffer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CfCellParams {
    /// The (oversampled) shape of the kernel.
    pub shape: [usize; 2],
    pub sampling: f32,
    /// Support radius in un-oversampled grid pixels.
    pub support: [i32; 2],
    pub freq_hz: f64,
    pub w_value: f64,
    pub mueller_element: MuellerElement,
    pub pa_rad: f64,
}

/// Exclusive write access to a [`CfBuffer`], for kernel computers. Obtained
/// with [`CfCache::fill`](super::CfCache::fill).
pub struct CfBufferFill<'a> {
    pub(crate) buffer: RwLockWriteGuard<'a, CfBuffer>,
}

impl CfBufferFill<'_> {
    /// Set up the axes of the buffer. All existing cells are discarded.
    #[allow(clippy::too_many_arguments)]
    pub fn resize(
        &mut self,
        w_scale: f64,
        freq_incr: f64,
        w_values: Vec<f64>,
        freq_values: Vec<f64>,
        pol_mat: PolMat,
        pol_index_mat: PolIndexMat,
        conj_pol_mat: PolMat,
        conj_pol_index_mat: PolIndexMat,
    ) {
        let num_mueller = pol_mat.iter().map(|row| row.len()).sum();
        let shape = (freq_values.len(), w_values.len(), num_mueller);
        trace!("Resizing kernel buffer to {shape:?}");
        let b = &mut self.buffer;
        b.cells = Array3::default(shape);
        b.w_scale = w_scale;
        b.freq_incr = freq_incr;
        b.w_values = w_values;
        b.freq_values = freq_values;
        b.pol_mat = pol_mat;
        b.pol_index_mat = pol_index_mat;
        b.conj_pol_mat = conj_pol_mat;
        b.conj_pol_index_mat = conj_pol_index_mat;
        b.max_x_support = None;
    }

    /// Set the parameters of one cell, discarding any kernel values it had.
    /// Returns `false` if the indices are outside the buffer.
    pub fn set_params(&mut self, ifreq: usize, iw: usize, imueller: usize, params: CfCellParams) -> bool {
        match self.buffer.cells.get_mut((ifreq, iw, imueller)) {
            Some(cell) => {
                *cell = CfCell {
                    kernel: None,
                    shape: params.shape,
                    sampling: params.sampling,
                    x_support: params.support[0],
                    y_support: params.support[1],
                    freq_hz: params.freq_hz,
                    w_value: params.w_value,
                    mueller_element: params.mueller_element,
                    pa_rad: params.pa_rad,
                };
                true
            }
            None => false,
        }
    }

    /// Store computed kernel values (already trimmed to their support) in a
    /// cell. Returns `false` if the indices are outside the buffer.
    pub fn set_kernel(
        &mut self,
        ifreq: usize,
        iw: usize,
        imueller: usize,
        kernel: Array2<c32>,
        support: [i32; 2],
    ) -> bool {
        match self.buffer.cells.get_mut((ifreq, iw, imueller)) {
            Some(cell) => {
                cell.x_support = support[0];
                cell.y_support = support[1];
                cell.kernel = Some(kernel);
                true
            }
            None => false,
        }
    }

    pub fn set_pointing_offset(&mut self, offset: [f64; 2]) {
        self.buffer.pointing_offset = offset;
    }
}

impl Deref for CfBufferFill<'_> {
    type Target = CfBuffer;

    fn deref(&self) -> &CfBuffer {
        &self.buffer
    }
}
