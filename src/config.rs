// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Settings shared by the kernel computer and the resampler.

use crate::constants::{
    DEFAULT_CONV_SIZE, DEFAULT_FREQ_INCREMENT_HZ, DEFAULT_OVERSAMPLING, DEFAULT_PA_TOLERANCE_RAD,
    SUPPORT_THRESHOLD_FRACTION,
};

/// Settings for making and looking up convolution functions. These are set
/// once per imaging setup.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CfConfig {
    /// The number of (oversampled) pixels on each side of a freshly computed
    /// kernel, before it is trimmed to its support.
    pub conv_size: usize,

    /// The kernel oversampling factor.
    pub oversampling: usize,

    /// The number of w planes. 0 or 1 disables W-projection.
    pub w_planes: usize,

    /// Cached kernels are re-used for any parallactic angle within this many
    /// radians of the angle they were computed for.
    pub pa_tolerance_rad: f64,

    /// Kernel magnitudes below this fraction of the peak are negligible.
    pub support_threshold: f32,

    /// Channel frequencies are binned into kernel frequency planes of this
    /// width \[Hz\].
    pub freq_increment_hz: f64,

    /// The number of extra (oversampled) pixels kept around the support when
    /// trimming kernels. If this is `None`, 1.5 times the oversampling is
    /// used.
    pub support_buffer: Option<usize>,

    /// Make kernels for every frequency plane spanned by the data, rather than
    /// only at the image reference frequency.
    pub wideband: bool,
}

impl Default for CfConfig {
    fn default() -> Self {
        Self {
            conv_size: DEFAULT_CONV_SIZE,
            oversampling: DEFAULT_OVERSAMPLING,
            w_planes: 1,
            pa_tolerance_rad: DEFAULT_PA_TOLERANCE_RAD,
            support_threshold: SUPPORT_THRESHOLD_FRACTION,
            freq_increment_hz: DEFAULT_FREQ_INCREMENT_HZ,
            support_buffer: None,
            wideband: false,
        }
    }
}

impl CfConfig {
    /// The support buffer to use when trimming kernels.
    pub fn support_buffer(&self) -> usize {
        self.support_buffer
            .unwrap_or((self.oversampling as f64 * 1.5) as usize)
    }
}
