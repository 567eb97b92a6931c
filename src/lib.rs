// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convolution-function caching and visibility-to-grid mapping for
//! A/W-projection gridders.
//!
//! Kernels are expensive to compute, so they are cached in a [`CfCache`]
//! keyed by parallactic angle (matched within a tolerance) and antenna-pair
//! type. A [`VisResampler`] maps each row of a [`VisBatch`] to its cached
//! kernel buffer and computes where each visibility lands on the grid.
//! Kernel physics is plugged in through the [`ConvFuncComputer`] trait.

#[allow(non_camel_case_types)]
pub type c32 = num_complex::Complex<f32>;
#[allow(non_camel_case_types)]
pub type c64 = num_complex::Complex<f64>;

pub mod antenna;
pub mod batch;
pub mod cache;
pub mod cf;
pub mod config;
pub mod constants;
pub mod image;
pub mod math;
pub mod parangle;
pub mod pointing;
pub mod polarisation;
pub mod pos;
pub mod resampler;

// Re-exports.
pub use antenna::AntennaTypeMap;
pub use batch::VisBatch;
pub use cache::{CfBuffer, CfBufferHandle, CfCache, CfCacheError, CfCell, SharedCfCache};
pub use cf::{ConvFuncComputer, ConvFuncError, GaussianConvFunc, VisParams};
pub use config::CfConfig;
pub use image::ImageGeometry;
pub use parangle::ParAngleChangeDetector;
pub use polarisation::{MuellerElement, PolOuterProduct, PolType};
pub use pos::{hadec::HADec, lmn::LMN, radec::RADec, uvw::UVW};
pub use resampler::{sgrid, CfSource, GridLocation, ResamplerError, ResamplerParams, VisResampler};

pub use erfa;
pub use hifitime;
pub use ndarray;
pub use num_complex;
pub use num_complex::Complex;
pub use num_traits;
pub use rayon;
