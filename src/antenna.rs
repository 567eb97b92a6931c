// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Classify antennas into types.
//!
//! Baselines between antennas of the same two types see the same beam, and so
//! share kernels. For a homogeneous array every antenna is its own "type"
//! (the identity map) unless a classification is supplied.

use itertools::Itertools;

use crate::math::{baseline_to_pair, num_baselines_with_autos};

/// Maps antenna indices to antenna type codes.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntennaTypeMap {
    /// The type of each antenna, indexed by antenna index. If this is `None`,
    /// the map is the identity.
    types: Option<Vec<i32>>,
}

impl AntennaTypeMap {
    /// The identity map; an antenna's type is its index.
    pub fn identity() -> Self {
        Self { types: None }
    }

    /// Use the supplied type for each antenna (indexed by antenna index).
    pub fn from_types(types: Vec<i32>) -> Self {
        Self { types: Some(types) }
    }

    /// Every one of `num_ants` antennas has the same type (0).
    pub fn homogeneous(num_ants: usize) -> Self {
        Self::from_types(vec![0; num_ants])
    }

    /// Get the type of an antenna. Antennas beyond the end of the supplied
    /// classification fall back to the identity.
    pub fn ant_type(&self, ant: usize) -> i32 {
        match &self.types {
            Some(types) => types.get(ant).copied().unwrap_or(ant as i32),
            None => ant as i32,
        }
    }

    /// The distinct antenna types, in ascending order. With the identity map
    /// this needs to know how many antennas there are.
    pub fn unique_types(&self, num_ants: usize) -> Vec<i32> {
        match &self.types {
            Some(types) => types.iter().copied().sorted().dedup().collect(),
            None => (0..num_ants as i32).collect(),
        }
    }
}

/// The antenna-pair type of a baseline between antennas of `type1` and
/// `type2`, lower type first. A pair's kernels are the same either way round.
pub fn baseline_type(type1: i32, type2: i32) -> (i32, i32) {
    if type1 <= type2 {
        (type1, type2)
    } else {
        (type2, type1)
    }
}

/// All distinct (type1, type2) pairs with `type1 <= type2`, including pairs
/// of the same type. Each pair is a distinct kernel-cache column.
pub fn make_baseline_type_list(unique_types: &[i32]) -> Vec<(i32, i32)> {
    let n = unique_types.len();
    (0..num_baselines_with_autos(n))
        .map(|bl| {
            let (i1, i2) = baseline_to_pair(n, bl);
            (unique_types[i1], unique_types[i2])
        })
        .collect()
}
