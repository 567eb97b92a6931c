// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The convolution-function cache.
//!
//! Kernels are keyed by two independent axes: the parallactic angle (PA) they
//! were computed for, and the (type1, type2) antenna-pair type of the
//! baselines that use them. A PA matches a stored PA if they differ by no more
//! than a tolerance; the first match in storage order is used, not the
//! nearest. Antenna-pair types must match exactly.
//!
//! The cache is a rectangular table of kernel buffers, with one row per
//! stored PA and one column per stored antenna-pair type. Every slot of the
//! table holds a (possibly empty) buffer; growing either axis re-dimensions
//! the whole table.
//!
//! Workers share a cache through a [`SharedCfCache`]. Lookups only need a
//! read lock; growing and filling the cache needs the write lock.

mod buffer;
mod error;
mod persist;

pub use buffer::{CfBuffer, CfBufferFill, CfCell, CfCellParams};
pub use error::CfCacheError;

use std::{path::Path, sync::Arc};

use log::{debug, trace};
use ndarray::prelude::*;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::VisBatch;
use persist::CellKey;

/// A handle on one cell of a [`CfCache`]. Row maps hold clones of these; the
/// buffer itself is owned by the cache slot.
pub type CfBufferHandle = Arc<RwLock<CfBuffer>>;

/// A [`CfCache`] shared between gridding workers.
pub type SharedCfCache = Arc<RwLock<CfCache>>;

fn new_handle() -> CfBufferHandle {
    Arc::new(RwLock::new(CfBuffer::default()))
}

/// Kernel buffers keyed by parallactic angle and antenna-pair type.
#[derive(Debug)]
pub struct CfCache {
    /// The PA of each table row \[radians\].
    pa: Vec<f64>,

    /// The first antenna type of each table column.
    ant1: Vec<i32>,

    /// The second antenna type of each table column.
    ant2: Vec<i32>,

    /// `(num_pa, num_ant_pair)`
    cells: Array2<CfBufferHandle>,
}

impl Default for CfCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CfCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            pa: vec![],
            ant1: vec![],
            ant2: vec![],
            cells: Array2::from_shape_fn((0, 0), |_| new_handle()),
        }
    }

    /// Wrap this cache so it can be shared between workers.
    pub fn into_shared(self) -> SharedCfCache {
        Arc::new(RwLock::new(self))
    }

    /// `(num_pa, num_ant_pair)`
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The stored parallactic angles, in storage order \[radians\].
    pub fn pa_list(&self) -> &[f64] {
        &self.pa
    }

    /// The stored antenna-pair types, in storage order.
    pub fn ant_pair_list(&self) -> Vec<(i32, i32)> {
        self.ant1.iter().copied().zip(self.ant2.iter().copied()).collect()
    }

    /// The index of the first stored PA within `tolerance` of `pa`.
    pub fn nearest_pa(&self, pa: f64, tolerance: f64) -> Option<usize> {
        self.pa.iter().position(|&p| (p - pa).abs() <= tolerance)
    }

    fn ant_pair_index(&self, ant1: i32, ant2: i32) -> Option<usize> {
        self.ant1
            .iter()
            .zip(self.ant2.iter())
            .position(|(&a1, &a2)| a1 == ant1 && a2 == ant2)
    }

    /// Find the table indices for a key without modifying the cache. Each
    /// axis is looked up independently.
    pub fn find(&self, pa: f64, tolerance: f64, ant1: i32, ant2: i32) -> (Option<usize>, Option<usize>) {
        (
            self.nearest_pa(pa, tolerance),
            self.ant_pair_index(ant1, ant2),
        )
    }

    /// Append slots on the axes that `found` says are missing, and
    /// re-dimension the table. If `retain` is false, every slot gets a fresh
    /// buffer.
    fn insert(
        &mut self,
        found: (Option<usize>, Option<usize>),
        pa: f64,
        ant1: i32,
        ant2: i32,
        retain: bool,
    ) -> Result<(usize, usize), CfCacheError> {
        self.check_dims()?;
        let (old_num_pa, old_num_ant) = self.shape();

        let pa_index = match found.0 {
            Some(i) => i,
            None => {
                self.pa.push(pa);
                old_num_pa
            }
        };
        let ant_index = match found.1 {
            Some(i) => i,
            None => {
                self.ant1.push(ant1);
                self.ant2.push(ant2);
                old_num_ant
            }
        };

        let new_shape = (self.pa.len(), self.ant1.len());
        if new_shape != (old_num_pa, old_num_ant) || !retain {
            debug!(
                "Resizing the kernel cache from {:?} to {new_shape:?}",
                (old_num_pa, old_num_ant)
            );
            let cells = Array2::from_shape_fn(new_shape, |(i, j)| {
                if retain && i < old_num_pa && j < old_num_ant {
                    Arc::clone(&self.cells[(i, j)])
                } else {
                    new_handle()
                }
            });
            self.cells = cells;
        }

        Ok((pa_index, ant_index))
    }

    /// Get the table indices for a key, adding a PA row and/or an
    /// antenna-pair column if either is not already present. The cell at the
    /// returned indices always exists, although its buffer may be empty.
    ///
    /// With `retain` true, existing cells keep their buffers.
    pub fn resize(
        &mut self,
        pa: f64,
        tolerance: f64,
        ant1: i32,
        ant2: i32,
        retain: bool,
    ) -> Result<(usize, usize), CfCacheError> {
        let found = self.find(pa, tolerance, ant1, ant2);
        let indices = self.insert(found, pa, ant1, ant2, retain)?;
        trace!("Kernel cache key (pa {pa}, ants ({ant1}, {ant2})) is cell {indices:?}");
        Ok(indices)
    }

    /// Get the buffer for a key. This never modifies the cache; if either
    /// axis has no match, [`CfCacheError::NotCached`] is returned.
    pub fn get_cf_buffer(
        &self,
        pa: f64,
        tolerance: f64,
        ant1: i32,
        ant2: i32,
    ) -> Result<CfBufferHandle, CfCacheError> {
        match self.find(pa, tolerance, ant1, ant2) {
            (Some(i), Some(j)) => Ok(Arc::clone(&self.cells[(i, j)])),
            _ => Err(CfCacheError::NotCached {
                pa,
                tolerance,
                ant1,
                ant2,
            }),
        }
    }

    /// Get the buffer at table indices.
    pub fn get_cf_buffer_at(&self, pa_index: usize, ant_index: usize) -> Result<CfBufferHandle, CfCacheError> {
        self.cells
            .get((pa_index, ant_index))
            .map(Arc::clone)
            .ok_or_else(|| self.out_of_range(pa_index, ant_index))
    }

    /// Get the key `(pa, ant1, ant2)` of the cell at table indices.
    pub fn get_params(&self, pa_index: usize, ant_index: usize) -> Result<(f64, i32, i32), CfCacheError> {
        match (
            self.pa.get(pa_index),
            self.ant1.get(ant_index),
            self.ant2.get(ant_index),
        ) {
            (Some(&pa), Some(&ant1), Some(&ant2)) => Ok((pa, ant1, ant2)),
            _ => Err(self.out_of_range(pa_index, ant_index)),
        }
    }

    /// Get write access to the buffer at table indices, for filling it with
    /// kernels.
    pub fn fill(&mut self, pa_index: usize, ant_index: usize) -> Result<CfBufferFill<'_>, CfCacheError> {
        let err = self.out_of_range(pa_index, ant_index);
        let handle = self.cells.get((pa_index, ant_index)).ok_or(err)?;
        Ok(CfBufferFill {
            buffer: handle.write(),
        })
    }

    fn out_of_range(&self, pa_index: usize, ant_index: usize) -> CfCacheError {
        let (num_pa, num_ant) = self.shape();
        CfCacheError::IndexOutOfRange {
            pa_index,
            ant_index,
            num_pa,
            num_ant,
        }
    }

    /// The key vectors and the table axes must always agree.
    fn check_dims(&self) -> Result<(), CfCacheError> {
        let (num_pa, num_ant) = self.shape();
        for (what, expected, received) in [
            ("PA list", num_pa, self.pa.len()),
            ("first antenna-type list", num_ant, self.ant1.len()),
            ("second antenna-type list", num_ant, self.ant2.len()),
        ] {
            if expected != received {
                return Err(CfCacheError::DimensionMismatch {
                    what,
                    expected,
                    received,
                });
            }
        }
        Ok(())
    }

    /// Remove every cell and key.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Precompute every buffer's channel -> kernel frequency maps for a
    /// batch.
    pub fn init_maps(&mut self, batch: &VisBatch, im_ref_freq_hz: f64) {
        self.cells
            .iter()
            .for_each(|h| h.write().init_maps(batch, im_ref_freq_hz));
    }

    /// Set every buffer's visibility polarisation maps.
    pub fn init_pol_maps(&mut self, pol_map: &[i32], conj_pol_map: &[i32]) {
        self.cells
            .iter()
            .for_each(|h| h.write().init_pol_maps(pol_map, conj_pol_map));
    }

    /// Touch every buffer ahead of gridding.
    pub fn prime_the_cfb(&mut self) {
        self.cells.iter().for_each(|h| h.write().prime());
    }

    /// The number of bytes used by all kernel values in the cache.
    pub fn mem_usage(&self) -> usize {
        self.cells.iter().map(|h| h.read().mem_usage()).sum()
    }

    /// Write every cell to `dir`, one file per cell, named
    /// `{qualifier}CFS_{pa_index}_{ant_index}`.
    pub fn make_persistent<P: AsRef<Path>>(&self, dir: P, qualifier: &str) -> Result<(), CfCacheError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.check_dims()?;
        self.cells
            .indexed_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .try_for_each(|((i, j), handle)| {
                let key = CellKey {
                    pa: self.pa[i],
                    ant1: self.ant1[j],
                    ant2: self.ant2[j],
                };
                let file = dir.join(persist::cf_file_name(qualifier, i, j));
                persist::write(&file, key, &handle.read())
            })?;
        debug!(
            "Wrote {} kernel buffers to {}",
            self.cells.len(),
            dir.display()
        );
        Ok(())
    }

    /// Read a cache written by [`CfCache::make_persistent`] with the same
    /// qualifier. Cells without a file are left empty.
    pub fn load_persistent<P: AsRef<Path>>(dir: P, qualifier: &str) -> Result<CfCache, CfCacheError> {
        let dir = dir.as_ref();
        let mut found = vec![];
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(indices) = name.to_str().and_then(|n| persist::parse_cf_file_name(n, qualifier)) {
                found.push((indices, entry.path()));
            }
        }

        let num_pa = found.iter().map(|((i, _), _)| i + 1).max().unwrap_or(0);
        let num_ant = found.iter().map(|((_, j), _)| j + 1).max().unwrap_or(0);
        let mut pa: Vec<Option<f64>> = vec![None; num_pa];
        let mut ants: Vec<Option<(i32, i32)>> = vec![None; num_ant];
        let mut cells = Array2::from_shape_fn((num_pa, num_ant), |_| new_handle());

        let read = found
            .into_par_iter()
            .map(|(indices, path)| persist::read(&path).map(|r| (indices, path, r)))
            .collect::<Result<Vec<_>, CfCacheError>>()?;
        for ((i, j), path, (key, buffer)) in read {
            let bad = |reason: String| CfCacheError::BadPersistentFile {
                file: path.clone(),
                reason,
            };
            if let Some(p) = pa[i].filter(|&p| p != key.pa) {
                return Err(bad(format!(
                    "its PA {} disagrees with other files' PA {p}",
                    key.pa
                )));
            }
            pa[i] = Some(key.pa);
            if let Some(a) = ants[j].filter(|&a| a != (key.ant1, key.ant2)) {
                return Err(bad(format!(
                    "its antenna types ({}, {}) disagree with other files' types {a:?}",
                    key.ant1, key.ant2
                )));
            }
            ants[j] = Some((key.ant1, key.ant2));
            cells[(i, j)] = Arc::new(RwLock::new(buffer));
        }

        // Every row and column needs at least one file to give it a key.
        let pa = pa
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                p.ok_or_else(|| CfCacheError::BadPersistentFile {
                    file: dir.join(persist::cf_file_name(qualifier, i, 0)),
                    reason: format!("no file gives the PA of row {i}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ants = ants
            .into_iter()
            .enumerate()
            .map(|(j, a)| {
                a.ok_or_else(|| CfCacheError::BadPersistentFile {
                    file: dir.join(persist::cf_file_name(qualifier, 0, j)),
                    reason: format!("no file gives the antenna types of column {j}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cache = CfCache {
            pa,
            ant1: ants.iter().map(|a| a.0).collect(),
            ant2: ants.iter().map(|a| a.1).collect(),
            cells,
        };
        cache.check_dims()?;
        debug!(
            "Read a {:?} kernel cache from {}",
            cache.shape(),
            dir.display()
        );
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    use crate::{c32, polarisation::MuellerElement};

    fn fill_one(cache: &mut CfCache, indices: (usize, usize), value: f32) {
        let mut fill = cache.fill(indices.0, indices.1).unwrap();
        fill.resize(
            0.0,
            1e8,
            vec![0.0],
            vec![150e6],
            vec![vec![MuellerElement::new(0, 0)]],
            vec![vec![0]],
            vec![vec![MuellerElement::new(0, 0)]],
            vec![vec![0]],
        );
        fill.set_params(
            0,
            0,
            0,
            CfCellParams {
                shape: [16, 16],
                sampling: 4.0,
                support: [2, 2],
                freq_hz: 150e6,
                w_value: 0.0,
                mueller_element: MuellerElement::new(0, 0),
                pa_rad: 0.1,
            },
        );
        fill.set_kernel(0, 0, 0, Array2::from_elem((5, 5), c32::new(value, -value)), [2, 2]);
    }

    #[test]
    fn test_resize_end_to_end() {
        let mut cache = CfCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.resize(0.10, 0.05, 1, 2, true).unwrap(), (0, 0));
        // Within tolerance; reused.
        assert_eq!(cache.resize(0.12, 0.05, 1, 2, true).unwrap(), (0, 0));
        // New antenna-pair column, same PA row.
        assert_eq!(cache.resize(0.10, 0.05, 3, 4, true).unwrap(), (0, 1));
        // New PA row.
        assert_eq!(cache.resize(5.0, 0.05, 1, 2, true).unwrap(), (1, 0));

        assert_eq!(cache.shape(), (2, 2));
        assert_eq!(cache.pa_list(), &[0.10, 5.0]);
        assert_eq!(cache.ant_pair_list(), vec![(1, 2), (3, 4)]);
        // The cell nobody asked for exists, and is empty.
        let cell = cache.get_cf_buffer_at(1, 1).unwrap();
        assert!(cell.read().is_empty());
        let (pa, ant1, ant2) = cache.get_params(1, 1).unwrap();
        assert_abs_diff_eq!(pa, 5.0);
        assert_eq!((ant1, ant2), (3, 4));
    }

    #[test]
    fn test_pa_outside_tolerance_gets_a_new_row() {
        let mut cache = CfCache::new();
        assert_eq!(cache.resize(0.10, 0.05, 0, 0, true).unwrap(), (0, 0));
        assert_eq!(cache.resize(0.16, 0.05, 0, 0, true).unwrap(), (1, 0));
        assert_eq!(cache.resize(0.04, 0.05, 0, 0, true).unwrap(), (2, 0));
        assert_eq!(cache.shape(), (3, 1));
    }

    #[test]
    fn test_first_match_in_storage_order() {
        let mut cache = CfCache::new();
        cache.resize(0.0, 0.05, 0, 0, true).unwrap();
        cache.resize(0.08, 0.05, 0, 0, true).unwrap();
        // 0.05 is within tolerance of both rows, and closer to the second,
        // but the first row wins.
        assert_eq!(cache.nearest_pa(0.05, 0.05), Some(0));
        assert_eq!(cache.nearest_pa(0.2, 0.05), None);
    }

    #[test]
    fn test_find_is_pure() {
        let mut cache = CfCache::new();
        cache.resize(1.0, 0.1, 1, 1, true).unwrap();
        assert_eq!(cache.find(1.05, 0.1, 1, 1), (Some(0), Some(0)));
        assert_eq!(cache.find(2.0, 0.1, 1, 1), (None, Some(0)));
        assert_eq!(cache.find(1.0, 0.1, 1, 2), (Some(0), None));
        assert_eq!(cache.shape(), (1, 1));
    }

    #[test]
    fn test_empty_cache_is_never_cached() {
        let cache = CfCache::new();
        let result = cache.get_cf_buffer(0.0, 0.1, 0, 0);
        assert!(matches!(
            result,
            Err(CfCacheError::NotCached {
                ant1: 0,
                ant2: 0,
                ..
            })
        ));
        assert!(matches!(
            cache.get_cf_buffer_at(0, 0),
            Err(CfCacheError::IndexOutOfRange { .. })
        ));
        assert!(cache.get_params(0, 0).is_err());
    }

    #[test]
    fn test_miss_on_either_axis() {
        let mut cache = CfCache::new();
        cache.resize(0.5, 0.01, 1, 2, true).unwrap();
        assert!(cache.get_cf_buffer(0.5, 0.01, 1, 2).is_ok());
        // Unregistered antenna-pair types always miss.
        assert!(matches!(
            cache.get_cf_buffer(0.5, 0.01, 2, 1),
            Err(CfCacheError::NotCached { .. })
        ));
        assert!(matches!(
            cache.get_cf_buffer(0.6, 0.01, 1, 2),
            Err(CfCacheError::NotCached { .. })
        ));
    }

    #[test]
    fn test_retain_preserves_cells() {
        let mut cache = CfCache::new();
        let indices = cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        fill_one(&mut cache, indices, 0.5);
        let before = cache.get_cf_buffer_at(0, 0).unwrap();

        // Grow the antenna-pair axis.
        assert_eq!(cache.resize(0.1, 0.05, 1, 2, true).unwrap(), (0, 1));
        let after = cache.get_cf_buffer_at(0, 0).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        let after = after.read();
        let kernel = after.cell(0, 0, 0).unwrap().kernel().unwrap();
        assert_abs_diff_eq!(kernel[(2, 2)].re, 0.5);
        assert_abs_diff_eq!(kernel[(2, 2)].im, -0.5);
    }

    #[test]
    fn test_no_retain_discards_cells() {
        let mut cache = CfCache::new();
        let indices = cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        fill_one(&mut cache, indices, 0.5);
        assert_eq!(cache.resize(0.1, 0.05, 1, 2, false).unwrap(), (0, 1));
        assert!(cache.get_cf_buffer_at(0, 0).unwrap().read().is_empty());
        assert_eq!(cache.mem_usage(), 0);
    }

    #[test]
    fn test_mem_usage() {
        let mut cache = CfCache::new();
        let a = cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        let b = cache.resize(0.1, 0.05, 1, 2, true).unwrap();
        fill_one(&mut cache, a, 1.0);
        fill_one(&mut cache, b, 1.0);
        assert_eq!(cache.mem_usage(), 2 * 25 * std::mem::size_of::<c32>());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.mem_usage(), 0);
    }

    #[test]
    fn test_fill_out_of_range() {
        let mut cache = CfCache::new();
        cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        assert!(matches!(
            cache.fill(0, 1),
            Err(CfCacheError::IndexOutOfRange {
                pa_index: 0,
                ant_index: 1,
                num_pa: 1,
                num_ant: 1
            })
        ));
    }

    #[test]
    fn test_persistence_round_trip() {
        let mut cache = CfCache::new();
        let a = cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        let b = cache.resize(0.7, 0.05, 1, 3, true).unwrap();
        fill_one(&mut cache, a, 0.25);
        fill_one(&mut cache, b, 0.75);
        {
            let mut fill = cache.fill(b.0, b.1).unwrap();
            fill.set_pointing_offset([1e-3, -2e-3]);
        }

        let dir = tempfile::tempdir().unwrap();
        cache.make_persistent(dir.path(), "").unwrap();
        cache.make_persistent(dir.path(), "WT").unwrap();
        assert!(dir.path().join("CFS_0_0").exists());
        assert!(dir.path().join("CFS_1_1").exists());
        assert!(dir.path().join("WTCFS_1_0").exists());

        let loaded = CfCache::load_persistent(dir.path(), "").unwrap();
        assert_eq!(loaded.shape(), (2, 2));
        assert_eq!(loaded.pa_list(), cache.pa_list());
        assert_eq!(loaded.ant_pair_list(), cache.ant_pair_list());
        assert_eq!(loaded.mem_usage(), cache.mem_usage());

        let buffer = loaded.get_cf_buffer(0.7, 0.05, 1, 3).unwrap();
        let buffer = buffer.read();
        assert_eq!(buffer.pointing_offset(), [1e-3, -2e-3]);
        let cell = buffer.cell(0, 0, 0).unwrap();
        assert_eq!(cell.support(), [2, 2]);
        assert_abs_diff_eq!(cell.sampling(), 4.0);
        assert_abs_diff_eq!(cell.freq_hz(), 150e6);
        assert_eq!(cell.kernel().unwrap()[(0, 0)], c32::new(0.75, -0.75));

        // The unfilled cells come back empty.
        assert!(loaded.get_cf_buffer_at(0, 1).unwrap().read().is_empty());
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CfCache::load_persistent(dir.path(), "").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_lookups() {
        let mut cache = CfCache::new();
        for i in 0..4 {
            cache.resize(i as f64, 0.1, 0, 0, true).unwrap();
        }
        let shared = cache.into_shared();
        let found: Vec<_> = (0..400)
            .into_par_iter()
            .map(|i| {
                let cache = shared.read();
                let pa = (i % 4) as f64 + 0.05;
                let handle = cache.get_cf_buffer(pa, 0.1, 0, 0).unwrap();
                let expected = cache.get_cf_buffer_at(i % 4, 0).unwrap();
                Arc::ptr_eq(&handle, &expected)
            })
            .collect();
        assert!(found.into_iter().all(|b| b));
    }

    #[test]
    fn test_batch_maps_delegate_to_cells() {
        use hifitime::Epoch;

        let mut cache = CfCache::new();
        let a = cache.resize(0.1, 0.05, 1, 1, true).unwrap();
        fill_one(&mut cache, a, 1.0);
        cache.resize(0.1, 0.05, 1, 2, true).unwrap();

        let batch = VisBatch::new(Epoch::from_gpst_seconds(0.0), 0.0, 0.0, crate::RADec::default())
            .with_channels(140e6, 10e6, 3);
        cache.init_maps(&batch, 150e6);
        cache.init_pol_maps(&[0], &[0]);
        cache.prime_the_cfb();

        let filled = cache.get_cf_buffer_at(0, 0).unwrap();
        let filled = filled.read();
        assert_eq!(filled.freq_ndx_map(), &[0, 0, 0]);
        assert_eq!(filled.vis_pol_map(), &[0]);
        assert_eq!(filled.max_x_support(), Some(2));

        // Empty buffers have nothing to map.
        let empty = cache.get_cf_buffer_at(0, 1).unwrap();
        assert!(empty.read().freq_ndx_map().is_empty());
        assert_eq!(empty.read().max_x_support(), None);
    }
}
