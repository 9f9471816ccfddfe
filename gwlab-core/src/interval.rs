//! Bootstrap prediction intervals with a factor-based tail.
//!
//! Near-term steps get empirical bounds from resampled residuals: each trial
//! walks the first `bootstrap_step` forecast steps, accumulating one randomly
//! drawn (bias-corrected) residual per step, so uncertainty compounds with
//! the horizon. Steps from `bootstrap_step` onwards use a closed-form band
//! `forecast ± 1.96 · σ · √(i + 1)`.
//!
//! Every trial is independent and the engine is seeded, so a given
//! `(residuals, forecasts, step, config)` always produces the same bounds.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::{mean, std_dev, Z_95};

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for the bootstrap engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of independent simulation trials (default 1000).
    pub n_simulations: usize,
    /// Two-sided confidence level (default 0.95).
    pub confidence_level: f64,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            confidence_level: 0.95,
            seed: 42,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Interval bound pair for one forecast step. `None` means "not computable".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IntervalBound {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl IntervalBound {
    pub const UNKNOWN: IntervalBound = IntervalBound {
        lower: None,
        upper: None,
    };

    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    pub fn is_known(&self) -> bool {
        self.lower.is_some() && self.upper.is_some()
    }

    pub fn width(&self) -> Option<f64> {
        Some(self.upper? - self.lower?)
    }
}

// ─── Bootstrap ───────────────────────────────────────────────────────

/// Residuals shifted to zero mean.
pub fn centered_residuals(residuals: &[f64]) -> Vec<f64> {
    let m = mean(residuals);
    residuals.iter().map(|r| r - m).collect()
}

/// Lower and upper indices into a sorted sample of `len` values.
///
/// `floor(len · α/2)` and `ceil(len · (1 − α/2)) − 1`, clamped into range.
fn percentile_indices(len: usize, confidence_level: f64) -> (usize, usize) {
    let alpha = 1.0 - confidence_level;
    let lower_pct = alpha / 2.0 * 100.0;
    let upper_pct = (1.0 - alpha / 2.0) * 100.0;
    let last = len.saturating_sub(1);

    let lower = ((len as f64 * lower_pct / 100.0).floor() as usize).min(last);
    let upper = ((len as f64 * upper_pct / 100.0).ceil() as usize)
        .saturating_sub(1)
        .min(last);
    (lower, upper.max(lower))
}

/// Empirical bootstrap bounds for every forecast step.
///
/// Steps `< bootstrap_step` get percentile bounds from the simulated paths;
/// later steps (and every step when there are no residuals or no trials)
/// are `IntervalBound::UNKNOWN`. `bootstrap_step` is clamped to the horizon.
pub fn bootstrap_bounds<R: Rng>(
    residuals: &[f64],
    point_forecasts: &[f64],
    bootstrap_step: usize,
    config: &BootstrapConfig,
    rng: &mut R,
) -> Vec<IntervalBound> {
    let horizon = point_forecasts.len();
    let mut bounds = vec![IntervalBound::UNKNOWN; horizon];
    if residuals.is_empty() || horizon == 0 {
        return bounds;
    }

    let step = bootstrap_step.min(horizon);
    let centered = centered_residuals(residuals);
    let mut paths: Vec<Vec<f64>> = vec![Vec::with_capacity(config.n_simulations); step];

    for _ in 0..config.n_simulations {
        let mut cumulative_error = 0.0;
        for (s, path) in paths.iter_mut().enumerate() {
            cumulative_error += centered[rng.gen_range(0..centered.len())];
            path.push(point_forecasts[s] + cumulative_error);
        }
    }

    for (s, mut values) in paths.into_iter().enumerate() {
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let (lo, hi) = percentile_indices(values.len(), config.confidence_level);
        bounds[s] = IntervalBound::new(values[lo], values[hi]);
    }

    bounds
}

/// Closed-form band for step `i`: `forecast ± 1.96 · σ · √(i + 1)`.
pub fn factor_bound(forecast: f64, step_index: usize, sigma: f64) -> IntervalBound {
    let half_width = Z_95 * sigma * ((step_index + 1) as f64).sqrt();
    IntervalBound::new(forecast - half_width, forecast + half_width)
}

/// Hybrid intervals: bootstrap for steps `< bootstrap_step`, factor-based after.
///
/// Empty forecasts give an empty result; empty residuals give all-unknown
/// bounds. Seeds its own RNG from `config.seed`.
pub fn hybrid_intervals(
    residuals: &[f64],
    point_forecasts: &[f64],
    bootstrap_step: usize,
    config: &BootstrapConfig,
) -> Vec<IntervalBound> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    hybrid_intervals_with_rng(residuals, point_forecasts, bootstrap_step, config, &mut rng)
}

/// [`hybrid_intervals`] with a caller-supplied RNG.
pub fn hybrid_intervals_with_rng<R: Rng>(
    residuals: &[f64],
    point_forecasts: &[f64],
    bootstrap_step: usize,
    config: &BootstrapConfig,
    rng: &mut R,
) -> Vec<IntervalBound> {
    if point_forecasts.is_empty() {
        return Vec::new();
    }
    if residuals.is_empty() {
        return vec![IntervalBound::UNKNOWN; point_forecasts.len()];
    }

    let step = bootstrap_step.min(point_forecasts.len());
    let bootstrap = bootstrap_bounds(residuals, point_forecasts, step, config, rng);
    let sigma = std_dev(residuals);
    debug!(
        residuals = residuals.len(),
        horizon = point_forecasts.len(),
        bootstrap_step = step,
        sigma,
        "computed hybrid prediction intervals"
    );

    point_forecasts
        .iter()
        .enumerate()
        .map(|(i, &forecast)| {
            if i < step {
                bootstrap[i]
            } else {
                factor_bound(forecast, i, sigma)
            }
        })
        .collect()
}
