// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Finding the support of a kernel and trimming it down to that support.

use std::f64::consts::TAU;

use itertools::Itertools;
use log::{trace, warn};
use ndarray::prelude::*;
use rayon::prelude::*;

use super::ConvFuncError;
use crate::c32;

/// Does any sample on a ring of radius `radius` (oversampled pixels) about
/// `origin` have a magnitude greater than `threshold`? The ring is sampled at
/// `90 * radius` points.
fn ring_exceeds(kernel: ArrayView2<c32>, threshold: f32, origin: usize, radius: usize) -> bool {
    let num_steps = 90 * radius;
    let (nx, ny) = kernel.dim();
    (0..num_steps).any(|step| {
        let (s, c) = (TAU * step as f64 / num_steps as f64).sin_cos();
        let x = (origin as f64 + radius as f64 * s) as isize;
        let y = (origin as f64 + radius as f64 * c) as isize;
        if x < 0 || y < 0 || x as usize >= nx || y as usize >= ny {
            return false;
        }
        kernel[(x as usize, y as usize)].norm() > threshold
    })
}

/// Find the support radius of a kernel \[oversampled pixels\]. Rings of
/// decreasing radius are scanned outwards-in, from `N/2 - 2` down to 2, and the
/// first (largest) ring with any sample above `threshold` gives the radius.
/// [`None`] is returned if no such ring exists.
pub fn find_support(kernel: ArrayView2<c32>, threshold: f32, origin: usize) -> Option<usize> {
    let conv_size = kernel.dim().0;
    let r1 = (conv_size / 2).checked_sub(2)?;
    (2..r1 + 1)
        .into_par_iter()
        .rev()
        .find_first(|&r| ring_exceeds(kernel, threshold, origin, r))
}

/// Get the support of a kernel in un-oversampled grid pixels. The threshold
/// is `threshold_fraction` of the magnitude of `peak`, or of the central pixel
/// if no peak is given.
///
/// The support is `int(0.5 + R / sampling) + 1`, where `R` comes from
/// [`find_support`]; it is limited so that it fits in the kernel.
pub fn set_up_cf_support(
    kernel: ArrayView2<c32>,
    sampling: usize,
    threshold_fraction: f32,
    peak: Option<c32>,
) -> Result<i32, ConvFuncError> {
    let origin = kernel.dim().0 / 2;
    let peak = match peak {
        Some(p) if p.norm() != 0.0 => p,
        _ => kernel.get((origin, origin)).copied().unwrap_or_default(),
    };
    let threshold = peak.norm() * threshold_fraction;
    let sampling = sampling.max(1);

    let mut support = match find_support(kernel, threshold, origin) {
        Some(r) => (0.5 + r as f32 / sampling as f32) as i32 + 1,
        None => -1,
    };
    if support > 0 && support as usize * sampling > origin {
        warn!(
            "Convolution function support size > N/2. Limiting it to N/2 (threshold = {threshold})"
        );
        support = (origin / sampling) as i32;
    }
    if support < 1 {
        return Err(ConvFuncError::ZeroSupport { threshold });
    }
    trace!("Kernel support is {support} pixels (threshold {threshold})");
    Ok(support)
}

/// Cut a kernel down to its support, keeping `support_buffer` extra
/// oversampled pixels on each side. The cut is clamped to the kernel, and the
/// kernel origin stays at the centre of the result.
pub fn trim_to_support(
    kernel: ArrayView2<c32>,
    support: i32,
    sampling: usize,
    support_buffer: usize,
) -> Array2<c32> {
    let n = kernel.dim().0;
    if n == 0 {
        return kernel.to_owned();
    }
    let origin = (n / 2) as isize;
    let half = sampling as isize * support as isize + support_buffer as isize;
    // Keep the cut symmetric about the origin.
    let half = half.min(origin).min(n as isize - 1 - origin);
    let bot = (origin - half) as usize;
    let top = (origin + half) as usize;
    kernel.slice(s![bot..=top, bot..=top]).to_owned()
}

/// The area of a kernel: the sum of its real part, sampled every `sampling`
/// oversampled pixels from its peak, over `[-support, support)` grid pixels
/// along each axis. The peak is the first sample with the largest magnitude.
/// Samples outside the kernel are skipped.
pub fn cf_area(kernel: ArrayView2<c32>, support: i32, sampling: usize) -> f32 {
    let Some(((px, py), _)) = kernel
        .indexed_iter()
        .min_by(|(_, a), (_, b)| b.norm().total_cmp(&a.norm()))
    else {
        return 0.0;
    };
    let sampling = sampling.max(1) as isize;
    let sample = |peak: usize, i: i32| -> Option<usize> {
        usize::try_from(peak as isize + i as isize * sampling).ok()
    };
    (-support..support)
        .cartesian_product(-support..support)
        .filter_map(|(ix, iy)| {
            let x = sample(px, ix)?;
            let y = sample(py, iy)?;
            kernel.get((x, y)).map(|v| v.re)
        })
        .sum()
}
