// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A batch of visibility rows to be gridded together.

use hifitime::Epoch;
use itertools::{izip, Itertools};
use thiserror::Error;

use crate::{PolType, RADec, UVW};

#[derive(Error, Debug)]
pub enum BatchError {
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
}

/// A lightweight container for a batch of visibility metadata. The
/// visibilities themselves aren't needed to select kernels or grid positions.
///
/// All rows of a batch share a single timestamp (and therefore a single
/// parallactic angle); finer time resolution requires splitting batches
/// upstream.
#[derive(Clone, Debug)]
pub struct VisBatch {
    /// The (centroid) timestamp of the batch.
    pub timestamp: Epoch,

    /// The local apparent sidereal time at `timestamp` \[radians\].
    pub lst_rad: f64,

    /// The latitude of the array \[radians\].
    pub array_latitude_rad: f64,

    /// The phase centre of the visibilities.
    pub phase_centre: RADec,

    /// The first antenna index of each row.
    pub ant1: Vec<usize>,

    /// The second antenna index of each row.
    pub ant2: Vec<usize>,

    /// The UVW of each row \[metres\].
    pub uvws: Vec<UVW>,

    /// The centre frequency of each channel \[Hz\].
    pub freqs_hz: Vec<f64>,

    /// The correlation type of each polarisation of the visibilities.
    pub pols: Vec<PolType>,

    /// The pointing centre of each antenna, indexed by antenna index. If this
    /// is empty, all antennas point at the phase centre.
    pub antenna_pointings: Vec<RADec>,

    /// If this is set, it is used as the batch's parallactic angle rather than
    /// computing one from the phase centre \[radians\].
    pub parallactic_angle_rad: Option<f64>,
}

impl VisBatch {
    /// Make an empty batch for a phase centre and time.
    pub fn new(
        timestamp: Epoch,
        lst_rad: f64,
        array_latitude_rad: f64,
        phase_centre: RADec,
    ) -> Self {
        Self {
            timestamp,
            lst_rad,
            array_latitude_rad,
            phase_centre,
            ant1: vec![],
            ant2: vec![],
            uvws: vec![],
            freqs_hz: vec![],
            pols: vec![],
            antenna_pointings: vec![],
            parallactic_angle_rad: None,
        }
    }

    /// Set the channel frequencies from a start frequency and a channel width.
    pub fn with_channels(mut self, start_freq_hz: f64, freq_resolution_hz: f64, num_chans: usize) -> Self {
        self.freqs_hz = (0..num_chans)
            .map(|i| start_freq_hz + i as f64 * freq_resolution_hz)
            .collect();
        self
    }

    /// Append a row.
    pub fn push_row(&mut self, ant1: usize, ant2: usize, uvw: UVW) {
        self.ant1.push(ant1);
        self.ant2.push(ant2);
        self.uvws.push(uvw);
    }

    pub fn num_rows(&self) -> usize {
        self.ant1.len()
    }

    pub fn num_chans(&self) -> usize {
        self.freqs_hz.len()
    }

    /// The number of antennas referred to by this batch.
    pub fn num_ants(&self) -> usize {
        let max_row_ant = izip!(&self.ant1, &self.ant2)
            .map(|(&a1, &a2)| a1.max(a2) + 1)
            .max()
            .unwrap_or(0);
        max_row_ant.max(self.antenna_pointings.len())
    }

    /// The lowest and highest channel frequencies \[Hz\].
    pub fn freq_range_hz(&self) -> Option<(f64, f64)> {
        self.freqs_hz.iter().copied().minmax().into_option()
    }

    /// The single parallactic angle representing this batch \[radians\].
    pub fn parallactic_angle(&self) -> f64 {
        match self.parallactic_angle_rad {
            Some(pa) => pa,
            None => self
                .phase_centre
                .to_hadec(self.lst_rad)
                .get_parallactic_angle(self.array_latitude_rad),
        }
    }

    /// The pointing centre of an antenna.
    pub fn antenna_pointing(&self, ant: usize) -> RADec {
        self.antenna_pointings
            .get(ant)
            .copied()
            .unwrap_or(self.phase_centre)
    }

    /// Check that the per-row vectors agree in length.
    pub fn validate(&self) -> Result<(), BatchError> {
        let num_rows = self.ant1.len();
        for (argument, len) in [("ant2", self.ant2.len()), ("uvws", self.uvws.len())] {
            if len != num_rows {
                return Err(BatchError::BadArrayShape {
                    argument: argument.to_string(),
                    function: "VisBatch::validate".to_string(),
                    expected: format!("({num_rows},)"),
                    received: format!("({len},)"),
                });
            }
        }
        Ok(())
    }
}
