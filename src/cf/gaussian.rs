// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An analytic kernel model: elliptical Gaussian antenna beams with an
//! analytic w-term.
//!
//! In the image domain, the response of a baseline between antennas of types
//! 1 and 2 is the product of their beams, `exp(-l'^2 / (2 sigma_x^2) - m'^2 /
//! (2 sigma_y^2))` with `1/sigma^2 = 1/sigma_1^2 + 1/sigma_2^2` per axis, and
//! `(l', m')` rotated by the parallactic angle. The w-term `exp(i pi w (l^2 +
//! m^2))` is also Gaussian, so the kernel (the Fourier transform of their
//! product) is `exp(-pi^2 (u'^2 / a_x + v'^2 / a_y))` with the complex `a =
//! 1 / (2 sigma^2) - i pi w`. Weight kernels use the squared beam and no
//! w-term.

use std::f64::consts::PI;

use itertools::Itertools;
use log::{debug, trace};
use ndarray::prelude::*;
use ndarray::Zip;

use super::{
    make_freq_values, make_w_values,
    support::{cf_area, set_up_cf_support, trim_to_support},
    w_scale_for, ConvFuncComputer, ConvFuncError,
};
use crate::{
    antenna::make_baseline_type_list,
    c32, c64,
    cache::{CfBufferFill, CfCache, CfCellParams},
    AntennaTypeMap, CfConfig, ImageGeometry, MuellerElement, PolOuterProduct, VisBatch,
};

/// FWHM = `FWHM_FACTOR` * sigma for a Gaussian.
const FWHM_FACTOR: f64 = 2.35482004503;

/// Gaussian-beam kernels.
#[derive(Clone, Debug)]
pub struct GaussianConvFunc {
    config: CfConfig,

    /// Classifies antennas.
    ant_types: AntennaTypeMap,

    /// The beam sigma (along each beam axis) of antenna types without their
    /// own, at the image reference frequency \[radians\].
    default_sigma_rad: [f64; 2],

    /// Per-antenna-type beam sigmas \[radians\].
    type_sigmas_rad: Vec<(i32, [f64; 2])>,
}

/// Everything needed to evaluate the kernels of one buffer.
struct KernelSpec {
    sigma_rad: [f64; 2],
    ref_freq_hz: f64,
    pa_rad: f64,
    phase_gradient: [f64; 2],
    uv_scale: [f64; 2],
}

impl GaussianConvFunc {
    /// Make kernels for antennas with a circular beam of the given FWHM at the
    /// image reference frequency \[radians\]. Every antenna is its own type.
    pub fn new(config: CfConfig, fwhm_rad: f64) -> Self {
        Self {
            config,
            ant_types: AntennaTypeMap::identity(),
            default_sigma_rad: [fwhm_rad / FWHM_FACTOR; 2],
            type_sigmas_rad: vec![],
        }
    }

    pub fn with_ant_types(mut self, ant_types: AntennaTypeMap) -> Self {
        self.ant_types = ant_types;
        self
    }

    /// Give an antenna type its own (elliptical) beam FWHM along each beam
    /// axis \[radians\].
    pub fn with_type_fwhm(mut self, ant_type: i32, fwhm_rad: [f64; 2]) -> Self {
        let sigma = fwhm_rad.map(|f| f / FWHM_FACTOR);
        self.type_sigmas_rad.retain(|(t, _)| *t != ant_type);
        self.type_sigmas_rad.push((ant_type, sigma));
        self
    }

    fn sigma_for_type(&self, ant_type: i32) -> [f64; 2] {
        self.type_sigmas_rad
            .iter()
            .find(|(t, _)| *t == ant_type)
            .map(|(_, s)| *s)
            .unwrap_or(self.default_sigma_rad)
    }

    /// The sigma of the product of two antenna types' beams.
    fn pair_sigma(&self, type1: i32, type2: i32) -> [f64; 2] {
        let s1 = self.sigma_for_type(type1);
        let s2 = self.sigma_for_type(type2);
        [0, 1].map(|i| (1.0 / (1.0 / (s1[i] * s1[i]) + 1.0 / (s2[i] * s2[i]))).sqrt())
    }

    /// `1 / a` along each axis (see the module documentation).
    fn inv_a(sigma: [f64; 2], w: f64, weight: bool) -> [c64; 2] {
        sigma.map(|s| {
            let a = if weight {
                c64::new(1.0 / (s * s), 0.0)
            } else {
                c64::new(1.0 / (2.0 * s * s), -PI * w)
            };
            a.inv()
        })
    }

    /// Evaluate a kernel on the full, oversampled `conv_size` grid.
    fn kernel(&self, inv_a: [c64; 2], spec: &KernelSpec, weight: bool) -> Array2<c32> {
        let n = self.config.conv_size;
        let origin = (n / 2) as f64;
        let os = self.config.oversampling.max(1) as f64;
        let du = spec.uv_scale.map(|s| 1.0 / s.abs());
        let (s, c) = spec.pa_rad.sin_cos();
        let gradient = spec.phase_gradient;

        let mut kernel: Array2<c32> = Array2::zeros((n, n));
        Zip::indexed(&mut kernel).par_for_each(|(ix, iy), k| {
            let dx = ix as f64 - origin;
            let dy = iy as f64 - origin;
            let u = dx * du[0] / os;
            let v = dy * du[1] / os;
            let up = u * c + v * s;
            let vp = -u * s + v * c;
            let mut value = (-(PI * PI) * (up * up * inv_a[0] + vp * vp * inv_a[1])).exp();
            if !weight {
                value *= c64::from_polar(1.0, gradient[0] * dx + gradient[1] * dy);
            }
            *k = c32::new(value.re as f32, value.im as f32);
        });
        kernel
    }

    /// The support of a kernel without evaluating it \[grid pixels\]. Used
    /// for dry runs.
    fn estimate_support(&self, inv_a: [c64; 2], uv_scale: [f64; 2]) -> i32 {
        let os = self.config.oversampling.max(1);
        let c = inv_a[0].re.min(inv_a[1].re);
        let threshold = f64::from(self.config.support_threshold);
        let radius_wavelengths = (-threshold.ln() / (PI * PI * c)).sqrt();
        let pixels = radius_wavelengths * uv_scale[0].abs().max(uv_scale[1].abs());
        let limit = (self.config.conv_size / 2 / os) as i32;
        ((0.5 + pixels) as i32 + 1).min(limit).max(1)
    }

    /// Set up (and, if `compute` is true, fill) every cell of a buffer whose
    /// axes have already been set. Computed kernels are divided by the area
    /// (see [`cf_area`]) of their frequency's first w plane.
    fn fill_buffer(
        &self,
        fill: &mut CfBufferFill,
        spec: &KernelSpec,
        weight: bool,
        compute: bool,
    ) -> Result<(), ConvFuncError> {
        let os = self.config.oversampling.max(1);
        let conv_size = self.config.conv_size;
        let freqs = fill.freq_values().to_vec();
        let w_values = fill.w_values().to_vec();
        let elements: Vec<MuellerElement> = fill.pol_mat().iter().flatten().copied().collect();

        for (ifreq, &freq) in freqs.iter().enumerate() {
            // Beams get narrower with increasing frequency.
            let sigma = spec.sigma_rad.map(|s| s * spec.ref_freq_hz / freq);
            let mut area = 1.0_f32;
            for (iw, &w) in w_values.iter().enumerate() {
                let inv_a = Self::inv_a(sigma, w, weight);
                let (kernel, support) = if compute {
                    let kernel = self.kernel(inv_a, spec, weight);
                    let support =
                        set_up_cf_support(kernel.view(), os, self.config.support_threshold, None)?;
                    let mut trimmed =
                        trim_to_support(kernel.view(), support, os, self.config.support_buffer());
                    if iw == 0 {
                        area = cf_area(trimmed.view(), support, os);
                        if !area.is_normal() {
                            return Err(ConvFuncError::BadArea { area, freq_hz: freq });
                        }
                        trace!("Kernel area at {freq} Hz is {area}");
                    }
                    trimmed.mapv_inplace(|v| v / area);
                    (Some(trimmed), support)
                } else {
                    (None, self.estimate_support(inv_a, spec.uv_scale))
                };

                for (imueller, &element) in elements.iter().enumerate() {
                    fill.set_params(
                        ifreq,
                        iw,
                        imueller,
                        CfCellParams {
                            shape: [conv_size, conv_size],
                            sampling: os as f32,
                            support: [support, support],
                            freq_hz: freq,
                            w_value: w,
                            mueller_element: element,
                            pa_rad: spec.pa_rad,
                        },
                    );
                    if let Some(kernel) = &kernel {
                        fill.set_kernel(ifreq, iw, imueller, kernel.clone(), [support, support]);
                    }
                }
            }
        }
        Ok(())
    }

    /// The image-domain response of a baseline type at direction cosines
    /// `(l, m)`.
    fn response(&self, type1: i32, type2: i32, l: f64, m: f64, pa: f64) -> f64 {
        let sigma = self.pair_sigma(type1, type2);
        let (s, c) = pa.sin_cos();
        let lp = l * c + m * s;
        let mp = -l * s + m * c;
        (-(lp * lp / (2.0 * sigma[0] * sigma[0]) + mp * mp / (2.0 * sigma[1] * sigma[1]))).exp()
    }
}

impl ConvFuncComputer for GaussianConvFunc {
    fn config(&self) -> &CfConfig {
        &self.config
    }

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
    ) -> Result<(), ConvFuncError> {
        batch.validate()?;
        if uv_scale[0] == 0.0 || uv_scale[1] == 0.0 {
            return Err(ConvFuncError::BadArrayShape {
                argument: "uv_scale".to_string(),
                function: "GaussianConvFunc::make_conv_function".to_string(),
                expected: "non-zero u and v scales".to_string(),
                received: format!("{uv_scale:?}"),
            });
        }

        let num_chans = batch.num_chans();
        let chans: Vec<usize> = match freq_selection {
            Some(sel) => sel.to_vec(),
            None => (0..num_chans).collect(),
        };
        let chan_freqs = chans
            .iter()
            .map(|&chan| {
                batch
                    .freqs_hz
                    .get(chan)
                    .copied()
                    .ok_or(ConvFuncError::BadChannelSelection { chan, num_chans })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if chan_freqs.is_empty() {
            return Err(ConvFuncError::NoChannels);
        }

        let freq_incr = self.config.freq_increment_hz;
        let freq_values = if self.config.wideband {
            make_freq_values(&chan_freqs, freq_incr)
        } else {
            vec![image.ref_freq_hz]
        };
        let w_scale = w_scale_for(w_planes, image);
        let w_values = make_w_values(w_scale, w_planes);

        let pol_mat = pol.make_pol_mat(&batch.pols, vis_pol_map)?;
        let pol_index_mat = pol.make_pol2cf_mat(&batch.pols, vis_pol_map)?;
        let conj_pol_mat = pol.make_conj_pol_mat(&batch.pols, vis_pol_map)?;
        let conj_pol_index_mat = pol.make_conj_pol2cf_mat(&batch.pols, vis_pol_map)?;

        let unique_types: Vec<i32> = (0..batch.num_ants())
            .map(|ant| self.map_ant_id_to_ant_type(ant))
            .sorted()
            .dedup()
            .collect();
        let baseline_types = make_baseline_type_list(&unique_types);
        let phase_gradient = self.find_pointing_offset(image, batch);
        trace!(
            "uv scale {uv_scale:?}, uv offset {uv_offset:?}, pointing phase gradient {phase_gradient:?}"
        );

        for &(type1, type2) in &baseline_types {
            let spec = KernelSpec {
                sigma_rad: self.pair_sigma(type1, type2),
                ref_freq_hz: image.ref_freq_hz,
                pa_rad: pa,
                phase_gradient,
                uv_scale: [uv_scale[0], uv_scale[1]],
            };

            let (i, j) = cfs.resize(pa, pa_increment, type1, type2, true)?;
            {
                let mut buffer = cfs.fill(i, j)?;
                buffer.resize(
                    w_scale,
                    freq_incr,
                    w_values.clone(),
                    freq_values.clone(),
                    pol_mat.clone(),
                    pol_index_mat.clone(),
                    conj_pol_mat.clone(),
                    conj_pol_index_mat.clone(),
                );
                buffer.set_pointing_offset(phase_gradient);
                self.fill_buffer(&mut buffer, &spec, false, fill)?;
            }

            // Weights have no w-term, so they only need one w plane.
            let (i, j) = cfwts.resize(pa, pa_increment, type1, type2, true)?;
            {
                let mut buffer = cfwts.fill(i, j)?;
                buffer.resize(
                    0.0,
                    freq_incr,
                    vec![0.0],
                    freq_values.clone(),
                    pol_mat.clone(),
                    pol_index_mat.clone(),
                    conj_pol_mat.clone(),
                    conj_pol_index_mat.clone(),
                );
                buffer.set_pointing_offset(phase_gradient);
                self.fill_buffer(&mut buffer, &spec, true, fill)?;
            }
        }

        debug!(
            "{} kernels for {} antenna-pair types at PA {pa:.4} rad ({} frequencies, {} w planes)",
            if fill { "Made" } else { "Sized" },
            baseline_types.len(),
            freq_values.len(),
            w_values.len()
        );
        Ok(())
    }

    fn make_average_response_complex(
        &self,
        batch: &VisBatch,
        image: &ImageGeometry,
        out: &mut Array4<c32>,
        reset: bool,
    ) -> Result<(), ConvFuncError> {
        if out.dim() != image.shape() {
            return Err(ConvFuncError::BadArrayShape {
                argument: "out".to_string(),
                function: "GaussianConvFunc::make_average_response_complex".to_string(),
                expected: format!("{:?}", image.shape()),
                received: format!("{:?}", out.dim()),
            });
        }
        if reset {
            out.fill(c32::new(1.0, 0.0));
        }

        let mut pairs: Vec<(i32, i32)> = batch
            .ant1
            .iter()
            .zip(batch.ant2.iter())
            .map(|(&a1, &a2)| {
                (
                    self.map_ant_id_to_ant_type(a1),
                    self.map_ant_id_to_ant_type(a2),
                )
            })
            .unique()
            .collect();
        if pairs.is_empty() {
            let t = self.map_ant_id_to_ant_type(0);
            pairs.push((t, t));
        }

        let pa = batch.parallactic_angle();
        let [ref_x, ref_y] = image.ref_pixel();
        let [inc_x, inc_y] = image.increment_rad;
        let response = Array2::from_shape_fn((image.nx, image.ny), |(ix, iy)| {
            let l = (ix as f64 - ref_x) * inc_x;
            let m = (iy as f64 - ref_y) * inc_y;
            let sum: f64 = pairs
                .iter()
                .map(|&(t1, t2)| self.response(t1, t2, l, m, pa))
                .sum();
            (sum / pairs.len() as f64) as f32
        });

        for mut chan in out.axis_iter_mut(Axis(3)) {
            for mut plane in chan.axis_iter_mut(Axis(2)) {
                plane.zip_mut_with(&response, |o, &r| *o *= r);
            }
        }
        Ok(())
    }

    fn map_ant_id_to_ant_type(&self, ant: usize) -> i32 {
        self.ant_types.ant_type(ant)
    }
}
