//! Residual statistics — pure functions over an ordered series of reals.
//!
//! Moments use the sample standard deviation (denominator `n - 1`) for
//! standardisation, while skewness and kurtosis average over `n`. Degenerate
//! inputs (too few points, zero spread) return `0.0` rather than `NaN`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Two-sided 95% normal critical value used for ACF bands and factor intervals.
pub const Z_95: f64 = 1.96;

/// Arithmetic mean. `0.0` for an empty series.
pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Sample standard deviation. `0.0` when fewer than two values.
pub fn std_dev(x: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(x);
    let var = x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

fn standardized_moment(x: &[f64], power: i32, min_len: usize) -> Option<f64> {
    if x.len() < min_len {
        return None;
    }
    let sd = std_dev(x);
    if sd == 0.0 {
        return None;
    }
    let m = mean(x);
    let sum: f64 = x.iter().map(|v| ((v - m) / sd).powi(power)).sum();
    Some(sum / x.len() as f64)
}

/// Third standardized moment. `0.0` if `n < 3` or zero spread.
pub fn skewness(x: &[f64]) -> f64 {
    standardized_moment(x, 3, 3).unwrap_or(0.0)
}

/// Excess kurtosis (fourth standardized moment minus 3). `0.0` if `n < 4` or zero spread.
pub fn kurtosis(x: &[f64]) -> f64 {
    standardized_moment(x, 4, 4).map_or(0.0, |k| k - 3.0)
}

// ─── Autocorrelation ─────────────────────────────────────────────────

/// One lag of the autocorrelation function with its confidence band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcfPoint {
    pub lag: usize,
    pub value: f64,
    pub ci_upper: f64,
    pub ci_lower: f64,
}

impl AcfPoint {
    /// Whether the coefficient lies strictly inside its band.
    pub fn within_band(&self) -> bool {
        self.value.abs() < self.ci_upper
    }
}

/// Autocorrelation for lags `0..=max_lag`.
///
/// Empty for an empty series. A constant series yields `max_lag + 1` zero
/// coefficients with a zero band. Lags at or beyond `n` are not emitted.
pub fn acf(x: &[f64], max_lag: usize) -> Vec<AcfPoint> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }

    let m = mean(x);
    let denom: f64 = x.iter().map(|v| (v - m).powi(2)).sum();
    if denom == 0.0 {
        return (0..=max_lag)
            .map(|lag| AcfPoint {
                lag,
                value: 0.0,
                ci_upper: 0.0,
                ci_lower: 0.0,
            })
            .collect();
    }

    let band = Z_95 / (n as f64).sqrt();
    (0..=max_lag)
        .take_while(|&k| k < n)
        .map(|k| {
            let num: f64 = (0..n - k).map(|i| (x[i] - m) * (x[i + k] - m)).sum();
            AcfPoint {
                lag: k,
                value: num / denom,
                ci_upper: band,
                ci_lower: -band,
            }
        })
        .collect()
}

// ─── Distribution views ──────────────────────────────────────────────

/// Equal-width histogram bin over `[lower, upper)`; the last bin also holds the maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mid_point: f64,
}

fn min_max(x: &[f64]) -> (f64, f64) {
    x.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Bin `x` into `num_bins` equal-width bins over `[min, max]`.
pub fn histogram_bins(x: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    if x.is_empty() || num_bins == 0 {
        return Vec::new();
    }

    let (min, max) = min_max(x);
    let range = max - min;
    if range == 0.0 {
        return vec![HistogramBin {
            label: format!("{min:.2}"),
            lower: min,
            upper: max,
            count: x.len(),
            mid_point: min,
        }];
    }

    let width = range / num_bins as f64;
    let mut counts = vec![0usize; num_bins];
    for &v in x {
        let idx = (((v - min) / width).floor() as usize).min(num_bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = min + i as f64 * width;
            let upper = lower + width;
            HistogramBin {
                label: format!("{lower:.2} - {upper:.2}"),
                lower,
                upper,
                count,
                mid_point: lower + width / 2.0,
            }
        })
        .collect()
}

/// Pair of sorted observation and its reference quantile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QqPoint {
    pub theoretical: f64,
    pub observed: f64,
}

/// Q-Q plot data.
///
/// The reference quantile for rank `i` is a linear interpolation across the
/// observed `[min, max]` at `i / (n - 1)`. This is a visual aid only, not an
/// inverse normal CDF, so a perfectly straight line means "evenly spread",
/// not "normally distributed". A single value maps to itself.
pub fn qq_plot_data(x: &[f64]) -> Vec<QqPoint> {
    let mut sorted = x.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![QqPoint {
            theoretical: sorted[0],
            observed: sorted[0],
        }];
    }

    let min = sorted[0];
    let range = sorted[n - 1] - min;
    sorted
        .iter()
        .enumerate()
        .map(|(i, &observed)| QqPoint {
            theoretical: min + (i as f64 / (n - 1) as f64) * range,
            observed,
        })
        .collect()
}

// ─── Residual diagnostics ────────────────────────────────────────────

/// Summary statistics of a residual set, as shown alongside a prediction check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidualDiagnostics {
    pub sample_size: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub acf: Vec<AcfPoint>,
}

/// Residual mean below this magnitude counts as unbiased.
pub const UNBIASED_MEAN_TOLERANCE: f64 = 0.1;
/// Skewness below this magnitude counts as symmetric.
pub const SYMMETRIC_SKEW_TOLERANCE: f64 = 0.5;
/// Excess kurtosis below this magnitude counts as normal-tailed.
pub const NORMAL_KURTOSIS_TOLERANCE: f64 = 1.0;

impl ResidualDiagnostics {
    pub fn compute(residuals: &[f64], max_lag: usize) -> Self {
        Self {
            sample_size: residuals.len(),
            mean: mean(residuals),
            std_dev: std_dev(residuals),
            skewness: skewness(residuals),
            kurtosis: kurtosis(residuals),
            acf: acf(residuals, max_lag),
        }
    }

    pub fn mean_near_zero(&self) -> bool {
        self.mean.abs() < UNBIASED_MEAN_TOLERANCE
    }

    pub fn near_symmetric(&self) -> bool {
        self.skewness.abs() < SYMMETRIC_SKEW_TOLERANCE
            && self.kurtosis.abs() < NORMAL_KURTOSIS_TOLERANCE
    }

    /// `None` with fewer than two residuals or when lag 1 was not computed.
    pub fn lag1_independent(&self) -> Option<bool> {
        if self.sample_size < 2 {
            return None;
        }
        self.acf.get(1).map(AcfPoint::within_band)
    }

    /// One-line human summary of the three checks.
    pub fn summary(&self) -> String {
        let bias = if self.mean_near_zero() {
            "mean near zero"
        } else {
            "biased mean"
        };
        let shape = if self.near_symmetric() {
            "near-symmetric"
        } else {
            "skewed or heavy-tailed"
        };
        let independence = match self.lag1_independent() {
            Some(true) => "lag-1 independent",
            Some(false) => "lag-1 autocorrelated",
            None => "lag-1 n/a",
        };
        format!("{bias}, {shape}, {independence}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[1.0, 2.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn std_dev_uses_sample_denominator() {
        // Σ(x-μ)² = 32, n-1 = 7
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&x) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn skewness_degenerate_cases() {
        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0, 3.0]), 0.0);
        assert!(skewness(&[1.0, 2.0, 3.0]).abs() < 1e-12);
    }

    #[test]
    fn skewness_sign_follows_tail() {
        assert!(skewness(&[1.0, 1.0, 1.0, 1.0, 10.0]) > 0.0);
        assert!(skewness(&[10.0, 10.0, 10.0, 10.0, 1.0]) < 0.0);
    }

    #[test]
    fn kurtosis_needs_four_points() {
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), 0.0);
        assert_ne!(kurtosis(&[1.0, 2.0, 3.0, 10.0]), 0.0);
    }

    #[test]
    fn acf_lag_zero_is_one() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
        let a = acf(&x, 3);
        assert_eq!(a.len(), 4);
        assert!((a[0].value - 1.0).abs() < 1e-12);
        let band = 1.96 / (6.0_f64).sqrt();
        assert!((a[2].ci_upper - band).abs() < 1e-12);
        assert!((a[2].ci_lower + band).abs() < 1e-12);
    }

    #[test]
    fn acf_stops_at_series_length() {
        let a = acf(&[1.0, 2.0, 4.0], 7);
        assert_eq!(a.len(), 3);
        assert_eq!(a.last().unwrap().lag, 2);
    }

    #[test]
    fn acf_constant_series_is_all_zero() {
        let a = acf(&[2.0, 2.0, 2.0], 4);
        assert_eq!(a.len(), 5);
        assert!(a.iter().all(|p| p.value == 0.0 && p.ci_upper == 0.0));
        assert_eq!(a[4].lag, 4);
    }

    #[test]
    fn acf_empty_series() {
        assert!(acf(&[], 5).is_empty());
    }

    #[test]
    fn histogram_counts_sum_to_n() {
        let x = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 10.0];
        let bins = histogram_bins(&x, 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), x.len());
        // maximum lands in the last bin
        assert!(bins[3].count >= 1);
        assert_eq!(bins[0].label, "0.00 - 2.50");
        assert!((bins[0].mid_point - 1.25).abs() < 1e-12);
    }

    #[test]
    fn histogram_constant_series_single_bin() {
        let bins = histogram_bins(&[4.0, 4.0, 4.0], 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
        assert_eq!(bins[0].label, "4.00");
    }

    #[test]
    fn histogram_degenerate_inputs() {
        assert!(histogram_bins(&[], 10).is_empty());
        assert!(histogram_bins(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn qq_interpolates_between_extremes() {
        let qq = qq_plot_data(&[3.0, 1.0, 2.0, 5.0]);
        assert_eq!(qq.len(), 4);
        assert_eq!(qq[0].observed, 1.0);
        assert_eq!(qq[0].theoretical, 1.0);
        assert_eq!(qq[3].theoretical, 5.0);
        assert!((qq[1].theoretical - (1.0 + 4.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn qq_single_and_empty() {
        assert!(qq_plot_data(&[]).is_empty());
        let one = qq_plot_data(&[2.5]);
        assert_eq!(one, vec![QqPoint { theoretical: 2.5, observed: 2.5 }]);
    }

    #[test]
    fn diagnostics_flags() {
        let residuals = [0.05, -0.04, 0.02, -0.03, 0.01, -0.02, 0.03, -0.01];
        let d = ResidualDiagnostics::compute(&residuals, 1);
        assert!(d.mean_near_zero());
        assert_eq!(d.sample_size, 8);
        assert!(d.lag1_independent().is_some());
        assert!(d.summary().starts_with("mean near zero"));
    }

    #[test]
    fn diagnostics_lag1_unavailable_for_single_residual() {
        let d = ResidualDiagnostics::compute(&[0.3], 1);
        assert_eq!(d.lag1_independent(), None);
    }
}
