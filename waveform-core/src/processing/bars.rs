//! Bar bucketing and normalization shared by both extraction paths.

use crate::models::config::BAR_COUNT;

/// Per-bar energy totals collected while scanning an asset.
///
/// `energy_sum[i]` holds accumulated absolute sample magnitude and
/// `sample_count[i]` the number of samples that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarAccumulator {
    energy_sum: [u64; BAR_COUNT],
    sample_count: [u64; BAR_COUNT],
}

impl Default for BarAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl BarAccumulator {
    pub fn new() -> Self {
        Self {
            energy_sum: [0; BAR_COUNT],
            sample_count: [0; BAR_COUNT],
        }
    }

    /// Add `energy` over `samples` samples to bar `index`.
    ///
    /// Returns `false` and leaves the accumulator untouched when `index` is
    /// out of range.
    pub fn add(&mut self, index: i64, energy: u64, samples: u64) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        if index >= BAR_COUNT {
            return false;
        }
        self.energy_sum[index] += energy;
        self.sample_count[index] += samples;
        true
    }

    pub fn energy_sum(&self, index: usize) -> u64 {
        self.energy_sum[index]
    }

    pub fn sample_count(&self, index: usize) -> u64 {
        self.sample_count[index]
    }

    /// Mean magnitude per bar; bars without samples average to 0.
    pub fn averages(&self) -> [f64; BAR_COUNT] {
        let mut averages = [0.0; BAR_COUNT];
        for (i, average) in averages.iter_mut().enumerate() {
            if self.sample_count[i] > 0 {
                *average = self.energy_sum[i] as f64 / self.sample_count[i] as f64;
            }
        }
        averages
    }

    pub fn normalize(&self) -> [u8; BAR_COUNT] {
        normalize_averages(&self.averages())
    }
}

/// Bar index for a position within a total span: `floor(BAR_COUNT * position / total)`.
///
/// Computed in 128-bit arithmetic so large microsecond timestamps cannot
/// overflow. `total` must be non-zero.
pub fn bar_index(position: i64, total: u64, resolution: u64) -> i64 {
    let scaled = (resolution as i128) * (BAR_COUNT as i128) * (position as i128);
    scaled.div_euclid(total as i128) as i64
}

/// Scale bar averages so that the loudest bar becomes 255.
///
/// Each output is `trunc(255 * average / max)`. When every average is zero
/// the result is all zeros.
pub fn normalize_averages(averages: &[f64; BAR_COUNT]) -> [u8; BAR_COUNT] {
    let max = averages.iter().copied().fold(0.0f64, f64::max);
    let mut bars = [0u8; BAR_COUNT];
    if max <= 0.0 {
        return bars;
    }
    for (bar, &average) in bars.iter_mut().zip(averages.iter()) {
        *bar = (255.0 * average / max) as u8;
    }
    bars
}

/// Mean absolute value of `samples`, or 0 for an empty slice.
pub fn mean_magnitude(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&s| s.unsigned_abs() as u64).sum();
    sum as f64 / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_accumulator_normalizes_to_zero() {
        let bars = BarAccumulator::new().normalize();
        assert_eq!(bars, [0u8; BAR_COUNT]);
    }

    #[test]
    fn out_of_range_indices_are_discarded() {
        let mut acc = BarAccumulator::new();
        assert!(!acc.add(-1, 100, 1));
        assert!(!acc.add(BAR_COUNT as i64, 100, 1));
        assert!(acc.add(0, 100, 4));
        assert_eq!(acc.energy_sum(0), 100);
        assert_eq!(acc.sample_count(0), 4);
        assert_eq!(acc.sample_count(BAR_COUNT - 1), 0);
    }

    #[test]
    fn averages_divide_energy_by_count() {
        let mut acc = BarAccumulator::new();
        acc.add(3, 300, 4);
        acc.add(3, 100, 4);
        let averages = acc.averages();
        assert_relative_eq!(averages[3], 50.0);
        assert_relative_eq!(averages[4], 0.0);
    }

    #[test]
    fn loudest_bar_maps_to_255() {
        let mut averages = [0.0; BAR_COUNT];
        averages[0] = 10.0;
        averages[1] = 40.0;
        averages[2] = 20.0;
        let bars = normalize_averages(&averages);
        assert_eq!(bars[1], 255);
        assert_eq!(bars[0], 63); // trunc(255 * 0.25)
        assert_eq!(bars[2], 127); // trunc(255 * 0.5)
        assert!(bars[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn equal_nonzero_bars_are_all_full_scale() {
        let bars = normalize_averages(&[7.5; BAR_COUNT]);
        assert!(bars.iter().all(|&b| b == 255));
    }

    #[test]
    fn bar_index_floors_and_scales() {
        assert_eq!(bar_index(0, 1_000_000, 1), 0);
        assert_eq!(bar_index(999_999, 1_000_000, 1), 45);
        assert_eq!(bar_index(1_000_000, 1_000_000, 1), 46);
        assert_eq!(bar_index(500_000, 1_000_000, 4), 92);
        assert_eq!(bar_index(-1, 1_000_000, 1), -1);
    }

    #[test]
    fn bar_index_handles_long_assets() {
        let ten_hours = 36_000_000_000u64;
        assert_eq!(bar_index(ten_hours as i64 - 1, ten_hours, 4), 4 * 46 - 1);
    }

    #[test]
    fn mean_magnitude_handles_min_sample() {
        assert_relative_eq!(mean_magnitude(&[i16::MIN, 0]), 16384.0);
        assert_relative_eq!(mean_magnitude(&[]), 0.0);
    }
}
