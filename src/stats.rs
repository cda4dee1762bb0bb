use serde::Serialize;
use std::collections::BTreeMap;

/// Mass above which an index counts as part of the visible support.
pub const SUPPORT_THRESHOLD: f64 = 1e-4;
pub const HISTOGRAM_BINS: usize = 30;
/// Percentiles reported for every distribution, in percent.
pub const REPORTED_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionStats {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Percent → pulls.
    pub percentiles: BTreeMap<u8, usize>,
    pub min: usize,
    pub max: usize,
    pub histogram: Vec<HistogramBin>,
}

impl DistributionStats {
    pub fn from_distribution(dist: &[f64], cdf: &[f64]) -> Self {
        let (mean, variance) = mean_variance(dist);
        let (min, max) = support_bounds(dist);
        let percentiles = REPORTED_PERCENTILES
            .iter()
            .map(|&p| (p, percentile(cdf, p as f64 / 100.0)))
            .collect();
        DistributionStats {
            mean,
            variance,
            std_dev: variance.sqrt(),
            percentiles,
            min,
            max,
            histogram: histogram(dist, min, max, HISTOGRAM_BINS),
        }
    }

    pub fn percentile(&self, percent: u8) -> usize {
        self.percentiles.get(&percent).copied().unwrap_or(0)
    }
}

/// Rescales to total mass 1 when the sum has drifted. Returns the sum before scaling.
pub fn normalize(dist: &mut [f64]) -> f64 {
    let sum: f64 = dist.iter().sum();
    if sum > 0.0 && (sum - 1.0).abs() > 1e-8 {
        dist.iter_mut().for_each(|p| *p /= sum);
    }
    sum
}

pub fn cdf(dist: &[f64]) -> Vec<f64> {
    dist.iter()
        .scan(0.0, |acc, &p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

/// Smallest index whose CDF reaches `p`; the last index if none does.
pub fn percentile(cdf: &[f64], p: f64) -> usize {
    cdf.iter()
        .position(|&c| c >= p)
        .unwrap_or_else(|| cdf.len().saturating_sub(1))
}

pub fn mean_variance(dist: &[f64]) -> (f64, f64) {
    let mean: f64 = dist.iter().enumerate().skip(1).map(|(k, &p)| k as f64 * p).sum();
    let variance: f64 = dist
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, &p)| p * (k as f64 - mean).powi(2))
        .sum();
    (mean, variance)
}

pub fn support_bounds(dist: &[f64]) -> (usize, usize) {
    let last = dist.len().saturating_sub(1);
    let min = (1..dist.len()).find(|&k| dist[k] > SUPPORT_THRESHOLD).unwrap_or(1);
    let max = (1..dist.len()).rev().find(|&k| dist[k] > SUPPORT_THRESHOLD).unwrap_or(last);
    (min, max)
}

/// Equal-width bins over `[min, max]`, mass as a percentage.
pub fn histogram(dist: &[f64], min: usize, max: usize, bins: usize) -> Vec<HistogramBin> {
    if dist.len() < 2 || max < min || bins == 0 {
        return Vec::new();
    }
    let range = max - min + 1;
    let bin_size = range.div_ceil(bins).max(1);
    (0..bins)
        .map(|i| min + i * bin_size)
        .take_while(|&start| start <= max)
        .map(|start| {
            let end = (start + bin_size).min(max + 1);
            let mass: f64 = dist[start..end.min(dist.len())].iter().sum();
            HistogramBin {
                start,
                end,
                percent: mass * 100.0,
            }
        })
        .collect()
}
