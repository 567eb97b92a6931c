// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Polarisation products and the "Mueller" (polarisation outer-product)
//! elements that index kernels within a kernel buffer.
//!
//! The outer product of two antennas' feeds has 16 elements; for the
//! diagonally-dominant case handled here, each visibility correlation only
//! needs the diagonal element for itself. The physical definition of the
//! elements is Eq. 4 in A&A 487, 419-429 (2008).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolarisationError {
    #[error("Visibility correlations mix linear and circular feeds ({first} and {second}); this can't be translated into kernel polarisation products")]
    MixedFeeds { first: PolType, second: PolType },

    #[error("The polarisation map has {map} entries, but there are {num_pols} visibility correlations")]
    MapLength { map: usize, num_pols: usize },
}

/// A visibility correlation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub enum PolType {
    XX,
    XY,
    YX,
    YY,
    RR,
    RL,
    LR,
    LL,
}

impl PolType {
    pub fn is_circular(self) -> bool {
        matches!(self, PolType::RR | PolType::RL | PolType::LR | PolType::LL)
    }

    /// The position of this correlation within its feed basis' outer product
    /// (e.g. XX => 0, XY => 1, YX => 2, YY => 3).
    pub fn outer_product_index(self) -> i32 {
        match self {
            PolType::XX | PolType::RR => 0,
            PolType::XY | PolType::RL => 1,
            PolType::YX | PolType::LR => 2,
            PolType::YY | PolType::LL => 3,
        }
    }

    /// The correlation that this one becomes when the visibility is
    /// conjugated. Conjugation swaps the antennas; for circular feeds it also
    /// swaps the handedness.
    pub fn conjugate(self) -> PolType {
        match self {
            PolType::XX => PolType::XX,
            PolType::XY => PolType::YX,
            PolType::YX => PolType::XY,
            PolType::YY => PolType::YY,
            PolType::RR => PolType::LL,
            PolType::RL => PolType::LR,
            PolType::LR => PolType::RL,
            PolType::LL => PolType::RR,
        }
    }
}

impl std::fmt::Display for PolType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            PolType::XX => "XX",
            PolType::XY => "XY",
            PolType::YX => "YX",
            PolType::YY => "YY",
            PolType::RR => "RR",
            PolType::RL => "RL",
            PolType::LR => "LR",
            PolType::LL => "LL",
        };
        write!(f, "{s}")
    }
}

/// A (row, column) element of the polarisation outer-product matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MuellerElement {
    pub row: i32,
    pub col: i32,
}

impl MuellerElement {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    fn diagonal(pol: PolType) -> Self {
        let i = pol.outer_product_index();
        Self { row: i, col: i }
    }
}

/// For each visibility correlation in use, the Mueller elements needed to
/// grid it. Unused correlations have no entry.
pub type PolMat = Vec<Vec<MuellerElement>>;

/// For each visibility correlation in use, the indices of its kernels within
/// a kernel buffer's Mueller axis.
pub type PolIndexMat = Vec<Vec<usize>>;

/// Builds Mueller element maps from a batch's correlation types and a
/// visibility polarisation map (`-1` for correlations not being imaged).
#[derive(Clone, Debug, Default)]
pub struct PolOuterProduct;

impl PolOuterProduct {
    fn check(vis_pols: &[PolType], pol_map: &[i32]) -> Result<(), PolarisationError> {
        if vis_pols.len() != pol_map.len() {
            return Err(PolarisationError::MapLength {
                map: pol_map.len(),
                num_pols: vis_pols.len(),
            });
        }
        if let Some(&first) = vis_pols.first() {
            if let Some(&second) = vis_pols
                .iter()
                .find(|p| p.is_circular() != first.is_circular())
            {
                return Err(PolarisationError::MixedFeeds { first, second });
            }
        }
        Ok(())
    }

    fn used<'a>(
        vis_pols: &'a [PolType],
        pol_map: &'a [i32],
    ) -> impl Iterator<Item = PolType> + 'a {
        vis_pols
            .iter()
            .zip(pol_map.iter())
            .filter(|(_, m)| **m >= 0)
            .map(|(&p, _)| p)
    }

    /// The Mueller elements for each used correlation.
    pub fn make_pol_mat(
        &self,
        vis_pols: &[PolType],
        pol_map: &[i32],
    ) -> Result<PolMat, PolarisationError> {
        Self::check(vis_pols, pol_map)?;
        Ok(Self::used(vis_pols, pol_map)
            .map(|p| vec![MuellerElement::diagonal(p)])
            .collect())
    }

    /// The Mueller elements for each used correlation when its visibility is
    /// conjugated.
    pub fn make_conj_pol_mat(
        &self,
        vis_pols: &[PolType],
        pol_map: &[i32],
    ) -> Result<PolMat, PolarisationError> {
        Self::check(vis_pols, pol_map)?;
        Ok(Self::used(vis_pols, pol_map)
            .map(|p| vec![MuellerElement::diagonal(p.conjugate())])
            .collect())
    }

    /// The position of each element of [`PolOuterProduct::make_pol_mat`] on a
    /// kernel buffer's (flattened) Mueller axis.
    pub fn make_pol2cf_mat(
        &self,
        vis_pols: &[PolType],
        pol_map: &[i32],
    ) -> Result<PolIndexMat, PolarisationError> {
        let pol_mat = self.make_pol_mat(vis_pols, pol_map)?;
        Ok(index_mat(&pol_mat))
    }

    /// The position of each element of
    /// [`PolOuterProduct::make_conj_pol_mat`] on a kernel buffer's Mueller
    /// axis. Conjugate elements are found amongst the non-conjugate elements;
    /// an element with no counterpart gets the index of its own row.
    pub fn make_conj_pol2cf_mat(
        &self,
        vis_pols: &[PolType],
        pol_map: &[i32],
    ) -> Result<PolIndexMat, PolarisationError> {
        let pol_mat = self.make_pol_mat(vis_pols, pol_map)?;
        let conj_mat = self.make_conj_pol_mat(vis_pols, pol_map)?;
        let flat: Vec<MuellerElement> = pol_mat.iter().flatten().copied().collect();
        let direct = index_mat(&pol_mat);
        Ok(conj_mat
            .iter()
            .zip(direct.iter())
            .map(|(row, direct_row)| {
                row.iter()
                    .zip(direct_row.iter())
                    .map(|(e, &own)| flat.iter().position(|f| f == e).unwrap_or(own))
                    .collect()
            })
            .collect())
    }
}

fn index_mat(pol_mat: &PolMat) -> PolIndexMat {
    let mut next = 0;
    pol_mat
        .iter()
        .map(|row| {
            row.iter()
                .map(|_| {
                    let i = next;
                    next += 1;
                    i
                })
                .collect()
        })
        .collect()
}
