// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with making convolution functions.

use thiserror::Error;

use crate::{batch::BatchError, cache::CfCacheError, polarisation::PolarisationError};

#[derive(Error, Debug)]
pub enum ConvFuncError {
    #[error("Convolution function is misbehaved; its support seems to be zero (threshold {threshold})")]
    ZeroSupport { threshold: f32 },

    #[error("Convolution function at {freq_hz} Hz has a bad area ({area}); it can't be normalised")]
    BadArea { area: f32, freq_hz: f64 },

    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    /// Error for bad array shape in provided argument
    BadArrayShape {
        /// The argument name within the function
        argument: String,
        /// The function name
        function: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },

    #[error("No channels were available to make convolution functions for")]
    NoChannels,

    #[error("Channel {chan} was selected, but the batch only has {num_chans} channels")]
    BadChannelSelection { chan: usize, num_chans: usize },

    #[error("Unsupported polarisation translation: {0}")]
    UnsupportedPolarisation(#[from] PolarisationError),

    #[error(transparent)]
    Cache(#[from] CfCacheError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}
