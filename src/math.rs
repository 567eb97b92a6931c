// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.

/// Round to the nearest integer, with halves always rounded up (towards
/// positive infinity). This is `floor(x + 0.5)`, which is *not* the same as
/// [`f64::round`] for negative halves; e.g. `nint(-2.5) == -2`.
#[inline]
pub fn nint(x: f64) -> i32 {
    (x + 0.5).floor() as i32
}

/// The number of baselines (including auto-correlations) that can be formed
/// from `n` distinct antenna types.
#[inline]
pub fn num_baselines_with_autos(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Convert a baseline index into its constituent indices (where the baseline
/// indices include auto-correlations as baselines). Baseline 0 is between 0
/// and 0.
// Courtesy Brian Crosse.
#[inline]
pub fn baseline_to_pair(total_num: usize, baseline: usize) -> (usize, usize) {
    let n = total_num as f64;
    let bl = baseline as f64;
    let i1 = (-0.5 * (4.0 * n * (n + 1.0) - 8.0 * bl + 1.0).sqrt() + n + 0.5).floor();
    let i2 = bl - i1 * (n - (i1 + 1.0) / 2.0);
    (i1 as usize, i2 as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nint_rounds_half_up() {
        assert_eq!(nint(2.5), 3);
        assert_eq!(nint(-2.5), -2);
        assert_eq!(nint(-2.6), -3);
        assert_eq!(nint(0.49999), 0);
        assert_eq!(nint(-0.5), 0);
        assert_eq!(nint(-0.50001), -1);
    }

    #[test]
    fn test_baseline_to_pair() {
        for n in [1, 2, 5, 16] {
            let mut bl_index = 0;
            for i1 in 0..n {
                for i2 in i1..n {
                    let (t1, t2) = baseline_to_pair(n, bl_index);
                    assert_eq!(i1, t1, "Expected i1 = {i1}, got {t1}. bl = {bl_index}");
                    assert_eq!(i2, t2, "Expected i2 = {i2}, got {t2}. bl = {bl_index}");
                    bl_index += 1;
                }
            }
            assert_eq!(bl_index, num_baselines_with_autos(n));
        }
    }
}
