// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the kernel cache.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CfCacheError {
    /// No cached kernels exist for this key. This isn't fatal; the caller
    /// should compute the kernels, insert them, and look them up again.
    #[error("No kernels are cached for parallactic angle {pa} (tolerance {tolerance}) and antenna types ({ant1}, {ant2})")]
    NotCached {
        pa: f64,
        tolerance: f64,
        ant1: i32,
        ant2: i32,
    },

    #[error("Cache cell ({pa_index}, {ant_index}) is outside of the cache shape ({num_pa}, {num_ant})")]
    IndexOutOfRange {
        pa_index: usize,
        ant_index: usize,
        num_pa: usize,
        num_ant: usize,
    },

    #[error("The cache's {what} has length {received}, but {expected} was expected")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        received: usize,
    },

    #[error("Persisted kernel file {} is bad: {reason}", file.display())]
    BadPersistentFile { file: PathBuf, reason: String },

    #[error("{0}")]
    IO(#[from] std::io::Error),
}
