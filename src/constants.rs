// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// Speed of light \[metres/second\]
pub const VEL_C: f64 = erfa::constants::ERFA_CMPS;

/// The default parallactic-angle tolerance used when matching cached
/// convolution functions \[radians\] (5 degrees).
pub const DEFAULT_PA_TOLERANCE_RAD: f64 = 5.0 * std::f64::consts::PI / 180.0;

/// Kernel magnitudes below this fraction of the kernel peak are considered
/// negligible when finding the support radius.
pub const SUPPORT_THRESHOLD_FRACTION: f32 = 1e-3;

/// The default number of pixels (in the un-oversampled grid) on each side of
/// a kernel.
pub const DEFAULT_CONV_SIZE: usize = 512;

/// The default kernel oversampling factor.
pub const DEFAULT_OVERSAMPLING: usize = 20;

/// The frequency increment used to bin channel frequencies into kernel
/// frequency planes \[Hz\].
pub const DEFAULT_FREQ_INCREMENT_HZ: f64 = 1e8;

/// The bytes at the start of every persisted kernel buffer file.
pub const CF_FILE_MAGIC: &[u8; 5] = b"CFBUF";

/// The version of the persisted kernel buffer file format.
pub const CF_FILE_VERSION: u32 = 1;
