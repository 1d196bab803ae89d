//! Hotspot statistics of a field: how much of the integrated value comes from
//! how few k-points.

use ndarray::{Array1, ArrayBase, Data, Dimension};
use ndarray_stats::QuantileExt;
use serde::Serialize;

use crate::error::SliceError;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    #[test]
    fn colour_limit_uses_magnitude() {
        let values = array![[1.0, -9.0], [3.0, 0.0]];
        assert_abs_diff_eq!(colour_limit(&values, 3.0).unwrap(), 3.0);
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(colour_limit(&empty, 3.0).unwrap_err(), SliceError::EmptyField);
    }

    #[test]
    fn profile_thresholds_span_to_maximum() {
        let values = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| ((i * 16 + j * 4 + k) as f64).powi(2));
        let profile = contribution_profile(&values, None, 50).unwrap();
        assert_eq!(profile.thresholds.len(), 50);
        assert_abs_diff_eq!(profile.thresholds[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(profile.thresholds[49], 63.0 * 63.0, epsilon = 1e-6);
        for w in profile.point_fraction.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn profile_fractions_below_threshold() {
        let values = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| ((i * 16 + j * 4 + k) as f64).powi(2));
        let profile = contribution_profile(&values, Some(1000.0), 20).unwrap();
        // 31^2 = 961 is the largest square below 1000
        assert_abs_diff_eq!(profile.point_fraction[19], 0.5, epsilon = 1e-12);
        let below: f64 = (0..32).map(|i| (i * i) as f64).sum();
        let total: f64 = (0..64).map(|i| (i * i) as f64).sum();
        assert_abs_diff_eq!(profile.sum_fraction[19], below / total, epsilon = 1e-12);
        // nothing lies below 10 except 0, 1, 4 and 9
        assert_abs_diff_eq!(profile.point_fraction[0], 4.0 / 64.0, epsilon = 1e-12);
    }

    #[test]
    fn histogram_accumulates() {
        let values = array![0.0, 1.0, 1.0, 2.0, -4.0];
        let hist = weighted_histogram(&values, 4).unwrap();
        assert_eq!(hist.counts, vec![1, 2, 1, 1]);
        assert_eq!(hist.centres, vec![0.5, 1.5, 2.5, 3.5]);
        assert_eq!(hist.weights, vec![0.5, 3.0, 2.5, 3.5]);
        assert_eq!(hist.below, vec![0.0, 0.5, 3.5, 6.0]);
        assert_eq!(hist.above, vec![9.5, 9.0, 6.0, 3.5]);
        assert_eq!(weighted_histogram(&values, 0).unwrap_err(), SliceError::BadResolution);
    }

    #[test]
    fn histogram_of_constant_field() {
        let values = array![2.0, 2.0, -2.0];
        let hist = weighted_histogram(&values, 3).unwrap();
        assert_eq!(hist.counts.iter().sum::<usize>(), 3);
        assert_eq!(hist.counts[0], 3);
    }
}

fn magnitudes<S, D>(values: &ArrayBase<S, D>) -> Result<Array1<f64>, SliceError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if values.is_empty() {
        return Err(SliceError::EmptyField);
    }
    Ok(values.iter().map(|v| v.abs()).collect())
}

/// Colour scale limit `max|X| / vmax_sf` for plane plots.
pub fn colour_limit<S, D>(values: &ArrayBase<S, D>, vmax_sf: f64) -> Result<f64, SliceError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let abs = magnitudes(values)?;
    let max = abs.max().map_err(|_| SliceError::EmptyField)?;
    Ok(*max / vmax_sf)
}

/// Share of the total sum, and of the points, lying below each threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionProfile {
    pub thresholds: Vec<f64>,
    pub sum_fraction: Vec<f64>,
    pub point_fraction: Vec<f64>,
}

/// Thresholds run logarithmically from 10 up to `max_threshold`, or `max|X|` if not given.
pub fn contribution_profile<S, D>(
    values: &ArrayBase<S, D>,
    max_threshold: Option<f64>,
    n: usize,
) -> Result<ContributionProfile, SliceError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if n == 0 {
        return Err(SliceError::BadResolution);
    }
    let abs = magnitudes(values)?;
    let max_threshold = match max_threshold {
        Some(t) => t,
        None => *abs.max().map_err(|_| SliceError::EmptyField)?,
    };
    let thresholds = Array1::logspace(10.0, 1.0, max_threshold.log10(), n);

    let total_sum: f64 = values.sum();
    let total_points = abs.len() as f64;

    let mut sum_fraction = Vec::with_capacity(n);
    let mut point_fraction = Vec::with_capacity(n);
    for &t in thresholds.iter() {
        let (sum, count) = values
            .iter()
            .zip(abs.iter())
            .filter(|(_, a)| **a < t)
            .fold((0.0, 0usize), |(s, c), (v, _)| (s + v, c + 1));
        sum_fraction.push(sum / total_sum);
        point_fraction.push(count as f64 / total_points);
    }

    Ok(ContributionProfile {
        thresholds: thresholds.to_vec(),
        sum_fraction,
        point_fraction,
    })
}

/// Histogram of `|X|` with each bin weighted by its centre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedHistogram {
    pub edges: Vec<f64>,
    pub centres: Vec<f64>,
    pub counts: Vec<usize>,
    /// `centre * count` per bin
    pub weights: Vec<f64>,
    /// total weight of all bins strictly below each bin
    pub below: Vec<f64>,
    /// total weight of each bin and all bins above it
    pub above: Vec<f64>,
}

/// Uniform bins over `[min|X|, max|X|]`; the last bin is closed on the right.
pub fn weighted_histogram<S, D>(
    values: &ArrayBase<S, D>,
    bins: usize,
) -> Result<WeightedHistogram, SliceError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if bins == 0 {
        return Err(SliceError::BadResolution);
    }
    let abs = magnitudes(values)?;
    let lo = *abs.min().map_err(|_| SliceError::EmptyField)?;
    let hi = *abs.max().map_err(|_| SliceError::EmptyField)?;
    let width = if hi > lo { (hi - lo) / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for &a in abs.iter() {
        let i = (((a - lo) / width) as usize).min(bins - 1);
        counts[i] += 1;
    }

    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let centres: Vec<f64> = edges.windows(2).map(|e| e[0] + (e[1] - e[0]) / 2.0).collect();
    let weights: Vec<f64> = centres
        .iter()
        .zip(counts.iter())
        .map(|(c, &n)| c * n as f64)
        .collect();
    let below: Vec<f64> = (0..bins).map(|i| weights[..i].iter().sum::<f64>()).collect();
    let above: Vec<f64> = (0..bins).map(|i| weights[i..].iter().sum::<f64>()).collect();

    Ok(WeightedHistogram {
        edges,
        centres,
        counts,
        weights,
        below,
        above,
    })
}
