// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Mapping visibilities onto the uv grid.
//!
//! For each batch, [`VisResampler::make_vb_row2cf_map`] finds the kernel
//! buffer of every row; [`sgrid`] gives the grid pixel, oversampled kernel
//! offset and phase-centre-shift phasor of each (row, channel).

use std::f64::consts::TAU;

use log::{debug, trace, warn};
use ndarray::prelude::*;
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    antenna::baseline_type,
    batch::BatchError,
    c64,
    cache::CfCacheError,
    cf::{w_scale_for, ConvFuncComputer, ConvFuncError},
    constants::VEL_C,
    math::nint,
    CfBufferHandle, CfCache, CfConfig, ImageGeometry, PolOuterProduct, SharedCfCache, VisBatch, LMN, UVW,
};

#[derive(Error, Debug)]
pub enum ResamplerError {
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

    #[error(transparent)]
    Cache(#[from] CfCacheError),

    #[error(transparent)]
    ConvFunc(#[from] ConvFuncError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Where the kernels for a batch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfSource {
    /// Every row's kernels were found in the cache.
    MemCache,

    /// At least one row's kernels aren't cached; they need to be computed and
    /// the lookup tried again.
    NotCached,
}

/// Where a visibility lands on the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridLocation {
    /// The nearest grid pixel along u and v, and the w plane.
    pub loc: [i32; 3],

    /// The offset into the oversampled kernel along u and v. The w offset is
    /// always 0.
    pub off: [i32; 3],

    /// The phase-centre-shift phasor.
    pub phasor: c64,
}

/// Get the grid location of a visibility.
///
/// Along u and v, `pos = scale * uvw * freq / c + offset`, the location is
/// `floor(pos + 0.5)` and the oversampled offset is `floor((loc - pos) *
/// oversampling + 0.5)`. The w plane is `floor(sqrt(|scale * w * freq / c|) +
/// offset + 0.5)`. The phasor is exactly 1 if `dphase` is 0, and `exp(-2 pi i
/// dphase freq / c)` otherwise.
///
/// No bounds checking is done.
pub fn sgrid(
    uvw: UVW,
    dphase: f64,
    freq_hz: f64,
    scale: [f64; 3],
    offset: [f64; 3],
    oversampling: [i32; 2],
) -> GridLocation {
    let freq_over_c = freq_hz / VEL_C;
    let mut loc = [0; 3];
    let mut off = [0; 3];
    for axis in 0..2 {
        let pos = scale[axis] * uvw.axis(axis) * freq_over_c + offset[axis];
        loc[axis] = nint(pos);
        off[axis] = nint((loc[axis] as f64 - pos) * oversampling[axis] as f64);
    }
    let pos = (scale[2] * uvw.w * freq_over_c).abs().sqrt() + offset[2];
    loc[2] = nint(pos);

    let phasor = if dphase == 0.0 {
        c64::new(1.0, 0.0)
    } else {
        c64::from_polar(1.0, -TAU * dphase * freq_over_c)
    };
    GridLocation { loc, off, phasor }
}

/// How visibilities are put on the grid. These are set once per imaging
/// setup.
#[derive(Clone, Debug, PartialEq)]
pub struct ResamplerParams {
    /// uv -> pixel scale for u and v, and the w-plane scale.
    pub uv_scale: [f64; 3],

    /// The pixel of uv = 0 along u and v, and the w-plane offset.
    pub uv_offset: [f64; 3],

    /// The image channel of each visibility channel; negative for channels
    /// that aren't gridded.
    pub chan_map: Vec<i32>,

    /// The image polarisation of each visibility polarisation; negative for
    /// polarisations that aren't gridded.
    pub pol_map: Vec<i32>,

    /// Shift the phase centre to this direction before gridding.
    pub phase_centre_shift: Option<LMN>,

    /// Kernel oversampling along u and v.
    pub oversampling: [i32; 2],

    /// The number of w planes computed kernels have.
    pub w_planes: usize,
}

impl ResamplerParams {
    /// Parameters for gridding onto an image's uv grid with `w_planes`
    /// w planes. Every visibility channel is gridded onto image channel 0,
    /// and visibility polarisations map one-to-one onto image polarisations.
    pub fn from_image(image: &ImageGeometry, w_planes: usize, oversampling: usize, num_vis_chans: usize) -> Self {
        Self {
            uv_scale: [
                image.nx as f64 * image.increment_rad[0],
                image.ny as f64 * image.increment_rad[1],
                w_scale_for(w_planes, image),
            ],
            uv_offset: [(image.nx / 2) as f64, (image.ny / 2) as f64, 0.0],
            chan_map: vec![0; num_vis_chans],
            pol_map: (0..image.num_pols as i32).collect(),
            phase_centre_shift: None,
            oversampling: [oversampling as i32; 2],
            w_planes,
        }
    }
}

/// Maps the rows of batches onto cached kernels and the grid.
#[derive(Debug)]
pub struct VisResampler {
    params: ResamplerParams,

    /// Cached kernels match a batch's parallactic angle within this many
    /// radians.
    pa_tolerance_rad: f64,

    /// The kernel buffer of each row of the last batch.
    row_map: Vec<CfBufferHandle>,

    pointing_offset: Option<[f64; 2]>,
}

impl VisResampler {
    pub fn new(params: ResamplerParams, pa_tolerance_rad: f64) -> Self {
        Self {
            params,
            pa_tolerance_rad,
            row_map: vec![],
            pointing_offset: None,
        }
    }

    /// A resampler for gridding onto `image`, with the w planes,
    /// oversampling and PA tolerance of `config`.
    pub fn from_config(config: &CfConfig, image: &ImageGeometry, num_vis_chans: usize) -> Self {
        let params = ResamplerParams::from_image(
            image,
            config.w_planes,
            config.oversampling,
            num_vis_chans,
        );
        Self::new(params, config.pa_tolerance_rad)
    }

    pub fn params(&self) -> &ResamplerParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ResamplerParams) {
        self.params = params;
    }

    pub fn pa_tolerance(&self) -> f64 {
        self.pa_tolerance_rad
    }

    /// The kernel buffer of each row of the last batch. This is empty if the
    /// last batch's kernels weren't all cached.
    pub fn row_map(&self) -> &[CfBufferHandle] {
        &self.row_map
    }

    /// The pointing offset recorded with the row map.
    pub fn pointing_offset(&self) -> Option<[f64; 2]> {
        self.pointing_offset
    }

    /// Find the cached kernel buffer of every row of `batch`. All rows use the
    /// batch's single parallactic angle; antennas are classified with
    /// `cf`. The kernels of a pair of antenna types don't depend on the order
    /// of the pair, so rows are looked up with the lower type first.
    ///
    /// If any row's kernels aren't cached, [`CfSource::NotCached`] is returned
    /// and the row map is left empty; the caller should compute the kernels
    /// (with [`ConvFuncComputer::make_conv_function`]) and try again. The map
    /// is never partially filled.
    pub fn make_vb_row2cf_map(
        &mut self,
        cfs: &CfCache,
        cf: &dyn ConvFuncComputer,
        batch: &VisBatch,
        pointing_offset: Option<[f64; 2]>,
    ) -> Result<CfSource, ResamplerError> {
        batch.validate()?;
        self.row_map.clear();
        self.pointing_offset = None;

        match self.find_row_buffers(cfs, cf, batch) {
            Ok(row_map) => {
                self.row_map = row_map;
                self.pointing_offset = pointing_offset;
                Ok(CfSource::MemCache)
            }
            Err(e @ CfCacheError::NotCached { .. }) => {
                warn!("{e}");
                Ok(CfSource::NotCached)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The cached buffer of every row of `batch`, or the first miss.
    fn find_row_buffers(
        &self,
        cfs: &CfCache,
        cf: &dyn ConvFuncComputer,
        batch: &VisBatch,
    ) -> Result<Vec<CfBufferHandle>, CfCacheError> {
        let pa = batch.parallactic_angle();
        batch
            .ant1
            .iter()
            .zip(batch.ant2.iter())
            .map(|(&ant1, &ant2)| {
                let (type1, type2) = baseline_type(
                    cf.map_ant_id_to_ant_type(ant1),
                    cf.map_ant_id_to_ant_type(ant2),
                );
                cfs.get_cf_buffer(pa, self.pa_tolerance_rad, type1, type2)
            })
            .collect()
    }

    /// Find the kernels for a batch, computing and caching them first if
    /// they aren't already cached. Gridding kernels go in `cfs`, weighting
    /// kernels in `cfwts`.
    ///
    /// Kernels are only computed once per PA, however many resamplers miss on
    /// it at the same time.
    pub fn find_conv_function(
        &mut self,
        cfs: &SharedCfCache,
        cfwts: &SharedCfCache,
        cf: &dyn ConvFuncComputer,
        image: &ImageGeometry,
        batch: &VisBatch,
        vis_pol_map: &[i32],
    ) -> Result<CfSource, ResamplerError> {
        let pointing_offset = Some(cf.find_pointing_offset(image, batch));
        let source = self.make_vb_row2cf_map(&cfs.read(), cf, batch, pointing_offset)?;
        if source == CfSource::MemCache {
            return Ok(source);
        }

        let pa = batch.parallactic_angle();
        debug!("Computing kernels for PA {:.3} deg", pa.to_degrees());
        {
            // Always lock the gridding cache first.
            let mut cfs = cfs.write();
            let mut cfwts = cfwts.write();
            // Another resampler may have filled the cache since our lookup.
            match self.find_row_buffers(&cfs, cf, batch) {
                Ok(row_map) => {
                    trace!("Kernels for PA {pa} were computed by another resampler");
                    self.row_map = row_map;
                    self.pointing_offset = pointing_offset;
                    return Ok(CfSource::MemCache);
                }
                Err(CfCacheError::NotCached { .. }) => (),
                Err(e) => return Err(e.into()),
            }
            cf.make_conv_function(
                image,
                batch,
                self.params.w_planes,
                &PolOuterProduct,
                vis_pol_map,
                pa,
                self.pa_tolerance_rad,
                self.params.uv_scale,
                self.params.uv_offset,
                None,
                &mut cfs,
                &mut cfwts,
                true,
            )?;
            for cache in [&mut *cfs, &mut *cfwts] {
                cache.init_maps(batch, image.ref_freq_hz);
                cache.init_pol_maps(&self.params.pol_map, &self.params.pol_map);
                cache.prime_the_cfb();
            }
        }

        let source = self.make_vb_row2cf_map(&cfs.read(), cf, batch, pointing_offset)?;
        if source == CfSource::NotCached {
            warn!("Kernels for PA {pa} are still not cached after computing them");
        }
        Ok(source)
    }

    /// Get the grid location of every (row, channel) of a batch. Channels that
    /// aren't gridded (negative channel map entries) have no location.
    pub fn grid_coords(&self, batch: &VisBatch) -> Result<Array2<Option<GridLocation>>, ResamplerError> {
        batch.validate()?;
        let num_chans = batch.num_chans();
        if self.params.chan_map.len() != num_chans {
            return Err(ResamplerError::BadArrayShape {
                argument: "chan_map".to_string(),
                function: "VisResampler::grid_coords".to_string(),
                expected: format!("({num_chans},)"),
                received: format!("({},)", self.params.chan_map.len()),
            });
        }

        let mut coords = Array2::from_elem((batch.num_rows(), num_chans), None);
        coords
            .outer_iter_mut()
            .into_par_iter()
            .zip(batch.uvws.par_iter())
            .for_each(|(mut row_coords, &uvw)| {
                let dphase = self
                    .params
                    .phase_centre_shift
                    .map(|lmn| lmn.path_difference(uvw))
                    .unwrap_or(0.0);
                for ((coord, &freq), &chan) in row_coords
                    .iter_mut()
                    .zip(batch.freqs_hz.iter())
                    .zip(self.params.chan_map.iter())
                {
                    if chan < 0 {
                        continue;
                    }
                    *coord = Some(sgrid(
                        uvw,
                        dphase,
                        freq,
                        self.params.uv_scale,
                        self.params.uv_offset,
                        self.params.oversampling,
                    ));
                }
            });
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use approx::assert_abs_diff_eq;
    use hifitime::Epoch;

    use crate::{c32, AntennaTypeMap, GaussianConvFunc, PolType, RADec};

    /// Gaussian kernels, counting how many times they're made.
    struct CountingConvFunc {
        inner: GaussianConvFunc,
        calls: AtomicUsize,
    }

    impl ConvFuncComputer for CountingConvFunc {
        fn config(&self) -> &CfConfig {
            self.inner.config()
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
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.make_conv_function(
                image,
                batch,
                w_planes,
                pol,
                vis_pol_map,
                pa,
                pa_increment,
                uv_scale,
                uv_offset,
                freq_selection,
                cfs,
                cfwts,
                fill,
            )
        }

        fn make_average_response_complex(
            &self,
            batch: &VisBatch,
            image: &ImageGeometry,
            out: &mut Array4<c32>,
            reset: bool,
        ) -> Result<(), ConvFuncError> {
            self.inner
                .make_average_response_complex(batch, image, out, reset)
        }

        fn map_ant_id_to_ant_type(&self, ant: usize) -> i32 {
            self.inner.map_ant_id_to_ant_type(ant)
        }
    }

    #[test]
    fn test_sgrid_rounds_half_up() {
        let g = sgrid(
            UVW::new(2.5, -2.5, 0.0),
            0.0,
            VEL_C,
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
            [1, 1],
        );
        assert_eq!(g.loc[0], 3);
        assert_eq!(g.loc[1], -2);
        // loc - pos is 0.5 on both axes, which also rounds up.
        assert_eq!(g.off, [1, 1, 0]);
        assert_eq!(g.phasor, c64::new(1.0, 0.0));
    }

    #[test]
    fn test_sgrid_offsets() {
        // pos = 10.3 -> loc 10, off = nint(-0.3 * 4) = nint(-1.2) = -1
        // pos = -3.6 -> loc -4, off = nint(-0.4 * 4) = nint(-1.6) = -2
        let g = sgrid(
            UVW::new(5.15, -1.8, 0.0),
            0.0,
            VEL_C,
            [2.0, 2.0, 0.0],
            [0.0, 0.0, 0.0],
            [4, 4],
        );
        assert_eq!(g.loc, [10, -4, 0]);
        assert_eq!(g.off, [-1, -2, 0]);

        // The offset shifts the grid origin.
        let g = sgrid(
            UVW::new(5.15, -1.8, 0.0),
            0.0,
            VEL_C,
            [2.0, 2.0, 0.0],
            [64.0, 64.0, 0.0],
            [4, 4],
        );
        assert_eq!(g.loc, [74, 60, 0]);
    }

    #[test]
    fn test_sgrid_w_plane() {
        // sqrt(|0.5 * -32|) = 4
        let g = sgrid(
            UVW::new(0.0, 0.0, -32.0),
            0.0,
            VEL_C,
            [1.0, 1.0, 0.5],
            [0.0, 0.0, 0.0],
            [1, 1],
        );
        assert_eq!(g.loc[2], 4);
        assert_eq!(g.off[2], 0);
    }

    #[test]
    fn test_sgrid_phasor_has_unit_magnitude() {
        for freq in [50e6, 150e6, 300e6] {
            for dphase in [-12.3, -0.001, 0.5, 7.0, 1234.5] {
                let g = sgrid(
                    UVW::new(1.0, 2.0, 3.0),
                    dphase,
                    freq,
                    [1.0, 1.0, 1.0],
                    [0.0; 3],
                    [20, 20],
                );
                assert_abs_diff_eq!(g.phasor.norm(), 1.0, epsilon = 1e-12);
            }
        }
        let g = sgrid(UVW::new(1.0, 0.0, 0.0), 0.25, VEL_C, [1.0; 3], [0.0; 3], [1, 1]);
        assert_abs_diff_eq!(g.phasor.re, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(g.phasor.im, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sgrid_is_deterministic() {
        let args = (UVW::new(-123.4, 56.7, 8.9), 0.3, 182.435e6, [1.117, -1.117, 0.14], [64.0, 64.0, 0.0], [20, 20]);
        let a = sgrid(args.0, args.1, args.2, args.3, args.4, args.5);
        let b = sgrid(args.0, args.1, args.2, args.3, args.4, args.5);
        assert_eq!(a.loc, b.loc);
        assert_eq!(a.off, b.off);
        assert_eq!(a.phasor.re.to_bits(), b.phasor.re.to_bits());
        assert_eq!(a.phasor.im.to_bits(), b.phasor.im.to_bits());
    }

    fn setup() -> (GaussianConvFunc, ImageGeometry, VisBatch) {
        let config = CfConfig {
            conv_size: 128,
            oversampling: 4,
            ..Default::default()
        };
        let cf = GaussianConvFunc::new(config, 20.0_f64.to_radians())
            .with_ant_types(AntennaTypeMap::homogeneous(4));
        let phase_centre = RADec::from_degrees(0.0, -27.0);
        let image = ImageGeometry::new_square(128, 0.5_f64.to_radians(), phase_centre, 150e6);
        let mut batch = VisBatch::new(Epoch::from_gpst_seconds(1065880128.0), 0.0, -0.47, phase_centre)
            .with_channels(150e6, 1e6, 2);
        batch.pols = vec![PolType::XX, PolType::YY];
        batch.parallactic_angle_rad = Some(0.1);
        batch.push_row(0, 1, UVW::new(10.0, 5.0, 0.0));
        batch.push_row(1, 2, UVW::new(-3.0, 8.0, 0.0));
        batch.push_row(2, 3, UVW::new(4.0, -2.0, 0.0));
        (cf, image, batch)
    }

    #[test]
    fn test_row_map_shares_one_handle() {
        let (cf, image, batch) = setup();
        let mut cfs = CfCache::new();
        cfs.resize(0.1, 0.05, 0, 0, true).unwrap();
        let params = ResamplerParams::from_image(&image, 1, 4, 2);
        let mut resampler = VisResampler::new(params, 0.05);

        let source = resampler
            .make_vb_row2cf_map(&cfs, &cf, &batch, Some([0.0, 0.0]))
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
        let map = resampler.row_map();
        assert_eq!(map.len(), 3);
        let cell = cfs.get_cf_buffer_at(0, 0).unwrap();
        assert!(map.iter().all(|h| std::sync::Arc::ptr_eq(h, &cell)));
        assert_eq!(resampler.pointing_offset(), Some([0.0, 0.0]));
    }

    #[test]
    fn test_row_map_is_all_or_nothing() {
        let (_, image, mut batch) = setup();
        // Identity antenna types; only (0, 1) and (1, 2) are cached.
        let cf = GaussianConvFunc::new(CfConfig::default(), 0.3);
        let mut cfs = CfCache::new();
        cfs.resize(0.1, 0.05, 0, 1, true).unwrap();
        cfs.resize(0.1, 0.05, 1, 2, true).unwrap();
        let mut resampler = VisResampler::new(ResamplerParams::from_image(&image, 1, 20, 2), 0.05);

        assert_eq!(
            resampler.make_vb_row2cf_map(&cfs, &cf, &batch, None).unwrap(),
            CfSource::NotCached
        );
        assert!(resampler.row_map().is_empty());

        // Drop the uncached row.
        batch.ant1.pop();
        batch.ant2.pop();
        batch.uvws.pop();
        assert_eq!(
            resampler.make_vb_row2cf_map(&cfs, &cf, &batch, None).unwrap(),
            CfSource::MemCache
        );
        assert_eq!(resampler.row_map().len(), 2);

        // A PA outside the tolerance misses, and the old map is discarded.
        batch.parallactic_angle_rad = Some(0.2);
        assert_eq!(
            resampler.make_vb_row2cf_map(&cfs, &cf, &batch, None).unwrap(),
            CfSource::NotCached
        );
        assert!(resampler.row_map().is_empty());
    }

    #[test]
    fn test_empty_batch_is_served_from_cache() {
        let (cf, image, _) = setup();
        let batch = VisBatch::new(Epoch::from_gpst_seconds(0.0), 0.0, 0.0, image.phase_centre);
        let cfs = CfCache::new();
        let mut resampler = VisResampler::new(ResamplerParams::from_image(&image, 1, 4, 0), 0.05);
        assert_eq!(
            resampler.make_vb_row2cf_map(&cfs, &cf, &batch, None).unwrap(),
            CfSource::MemCache
        );
        assert!(resampler.row_map().is_empty());
    }

    #[test]
    fn test_ragged_batch_is_an_error() {
        let (cf, image, mut batch) = setup();
        batch.uvws.pop();
        let cfs = CfCache::new();
        let mut resampler = VisResampler::new(ResamplerParams::from_image(&image, 1, 4, 2), 0.05);
        let result = resampler.make_vb_row2cf_map(&cfs, &cf, &batch, None);
        assert!(matches!(result, Err(ResamplerError::Batch(_))));
    }

    #[test]
    fn test_find_conv_function_computes_then_serves() {
        let (cf, image, batch) = setup();
        let cfs = CfCache::new().into_shared();
        let cfwts = CfCache::new().into_shared();
        let mut params = ResamplerParams::from_image(&image, 1, 4, 2);
        params.pol_map = vec![0, 1];
        let mut resampler = VisResampler::new(params, 0.05);

        let source = resampler
            .find_conv_function(&cfs, &cfwts, &cf, &image, &batch, &[0, 1])
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
        assert_eq!(resampler.row_map().len(), 3);
        assert_eq!(cfs.read().shape(), (1, 1));
        assert!(cfs.read().mem_usage() > 0);
        let handle = cfs.read().get_cf_buffer_at(0, 0).unwrap();
        assert_eq!(handle.read().freq_ndx_map(), &[0, 0]);
        assert!(handle.read().max_x_support().unwrap() > 0);

        // A nearby PA is served without computing anything new.
        let mut batch = batch;
        batch.parallactic_angle_rad = Some(0.12);
        let mem_usage = cfs.read().mem_usage();
        let source = resampler
            .find_conv_function(&cfs, &cfwts, &cf, &image, &batch, &[0, 1])
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
        assert_eq!(cfs.read().mem_usage(), mem_usage);
    }

    #[test]
    fn test_find_conv_function_with_unordered_types() {
        let (cf, image, batch) = setup();
        // Rows (0, 1) and (2, 3) have their higher type first.
        let cf = cf.with_ant_types(AntennaTypeMap::from_types(vec![9, 7, 7, 9]));
        let cfs = CfCache::new().into_shared();
        let cfwts = CfCache::new().into_shared();
        let mut params = ResamplerParams::from_image(&image, 1, 4, 2);
        params.pol_map = vec![0, 1];
        let mut resampler = VisResampler::new(params, 0.05);

        let source = resampler
            .find_conv_function(&cfs, &cfwts, &cf, &image, &batch, &[0, 1])
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
        assert_eq!(cfs.read().ant_pair_list(), vec![(7, 7), (7, 9), (9, 9)]);

        // (9, 7) and (7, 9) share a buffer.
        let map = resampler.row_map();
        assert_eq!(map.len(), 3);
        assert!(Arc::ptr_eq(&map[0], &map[2]));
        assert!(!Arc::ptr_eq(&map[0], &map[1]));
        let cell = cfs.read().get_cf_buffer(0.1, 0.05, 7, 9).unwrap();
        assert!(Arc::ptr_eq(&map[0], &cell));
    }

    #[test]
    fn test_concurrent_misses_compute_once() {
        let (cf, image, batch) = setup();
        let cf = CountingConvFunc {
            inner: cf,
            calls: AtomicUsize::new(0),
        };
        let cfs = CfCache::new().into_shared();
        let cfwts = CfCache::new().into_shared();
        let mut params = ResamplerParams::from_image(&image, 1, 4, 2);
        params.pol_map = vec![0, 1];

        let maps: Vec<Vec<CfBufferHandle>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..2)
                .map(|_| {
                    let mut resampler = VisResampler::new(params.clone(), 0.05);
                    let (cfs, cfwts, cf, image, batch) = (&cfs, &cfwts, &cf, &image, &batch);
                    scope.spawn(move || {
                        let source = resampler
                            .find_conv_function(cfs, cfwts, cf, image, batch, &[0, 1])
                            .unwrap();
                        assert_eq!(source, CfSource::MemCache);
                        resampler.row_map().to_vec()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(cf.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cfs.read().shape(), (1, 1));
        let cell = cfs.read().get_cf_buffer_at(0, 0).unwrap();
        for map in maps {
            assert_eq!(map.len(), 3);
            assert!(map.iter().all(|h| Arc::ptr_eq(h, &cell)));
        }
    }

    #[test]
    fn test_from_config() {
        let (cf, image, batch) = setup();
        let config = CfConfig {
            w_planes: 3,
            oversampling: 4,
            pa_tolerance_rad: 0.07,
            conv_size: 128,
            ..Default::default()
        };
        let mut resampler = VisResampler::from_config(&config, &image, 2);
        assert_abs_diff_eq!(resampler.pa_tolerance(), 0.07);
        assert_eq!(resampler.params().oversampling, [4, 4]);
        assert_eq!(resampler.params().w_planes, 3);
        assert_abs_diff_eq!(resampler.params().uv_scale[2], w_scale_for(3, &image));

        let cfs = CfCache::new().into_shared();
        let cfwts = CfCache::new().into_shared();
        let source = resampler
            .find_conv_function(&cfs, &cfwts, &cf, &image, &batch, &[0, 1])
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
        let handle = cfs.read().get_cf_buffer_at(0, 0).unwrap();
        assert_eq!(handle.read().w_values().len(), 3);

        // The configured tolerance is used for lookups.
        let mut batch = batch;
        batch.parallactic_angle_rad = Some(0.165);
        let source = resampler
            .make_vb_row2cf_map(&cfs.read(), &cf, &batch, None)
            .unwrap();
        assert_eq!(source, CfSource::MemCache);
    }

    #[test]
    fn test_grid_coords() {
        let (_, image, mut batch) = setup();
        let mut params = ResamplerParams::from_image(&image, 1, 4, 2);
        params.chan_map = vec![0, -1];
        let resampler = VisResampler::new(params.clone(), 0.05);
        let coords = resampler.grid_coords(&batch).unwrap();
        assert_eq!(coords.dim(), (3, 2));
        assert!(coords.column(1).iter().all(|c| c.is_none()));
        let expected = sgrid(
            batch.uvws[1],
            0.0,
            batch.freqs_hz[0],
            params.uv_scale,
            params.uv_offset,
            params.oversampling,
        );
        assert_eq!(coords[(1, 0)], Some(expected));

        // With a phase-centre shift, phasors are no longer 1.
        let mut params = params;
        params.phase_centre_shift = Some(LMN::from_lm(0.01, 0.02));
        let resampler = VisResampler::new(params, 0.05);
        let coords = resampler.grid_coords(&batch).unwrap();
        let phasor = coords[(0, 0)].unwrap().phasor;
        assert!((phasor - c64::new(1.0, 0.0)).norm() > 1e-6);
        assert_abs_diff_eq!(phasor.norm(), 1.0, epsilon = 1e-12);

        // The channel map must match the batch.
        batch.freqs_hz.push(152e6);
        assert!(matches!(
            resampler.grid_coords(&batch),
            Err(ResamplerError::BadArrayShape { .. })
        ));
    }
}
