//! Rolling backtest — one-step-ahead evaluation against held-out history.
//!
//! For each evaluated GWL observation `i`, every series is truncated to data
//! strictly before `timestamp[i]`, the forecaster runs on that window, and only
//! its first value is compared with the actual level. Points that cannot be
//! evaluated are skipped and logged; the loop never aborts on them.
//!
//! Indices are evaluated in parallel and then ordered by timestamp, so the
//! report is identical regardless of scheduling.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use gwlab_core::data::WellSeries;
use gwlab_core::forecast::{Forecaster, DEFAULT_HORIZON};
use gwlab_core::metrics::MetricSet;

// ─── Configuration ───────────────────────────────────────────────────

/// Which GWL observations the backtest evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartOffset {
    /// Evaluate from this index to the end.
    Index(usize),
    /// Evaluate the last `n` observations.
    Trailing(usize),
}

impl StartOffset {
    fn resolve(self, len: usize) -> usize {
        match self {
            Self::Index(i) => i.min(len),
            Self::Trailing(n) => len.saturating_sub(n),
        }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start: StartOffset,
    /// Horizon requested from the forecaster (only the first value is scored).
    pub horizon: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start: StartOffset::Index(0),
            horizon: DEFAULT_HORIZON,
        }
    }
}

impl BacktestConfig {
    /// Evaluate only the most recent `leading_period` observations.
    pub fn trailing(leading_period: usize, horizon: usize) -> Self {
        Self {
            start: StartOffset::Trailing(leading_period),
            horizon,
        }
    }

    /// Evaluate the whole history.
    pub fn full_history(horizon: usize) -> Self {
        Self {
            start: StartOffset::Index(0),
            horizon,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One scored point: `error = predicted - actual`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionError {
    #[serde(with = "gwlab_core::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    pub predicted: f64,
    pub actual: f64,
    pub error: f64,
}

/// Why a point was not scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Nothing earlier in the GWL series to forecast from.
    NoHistory,
    /// The forecaster returned an error.
    ForecastFailed(String),
    /// The forecaster returned nothing, or a non-finite first value.
    InvalidOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedPoint {
    #[serde(with = "gwlab_core::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    pub reason: SkipReason,
}

/// Outcome of a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Scored points, ascending by timestamp.
    pub errors: Vec<PredictionError>,
    pub skipped: Vec<SkippedPoint>,
    pub metrics: MetricSet,
}

impl BacktestReport {
    pub fn residuals(&self) -> Vec<f64> {
        self.errors.iter().map(|e| e.error).collect()
    }

    pub fn predictions(&self) -> Vec<f64> {
        self.errors.iter().map(|e| e.predicted).collect()
    }

    pub fn actuals(&self) -> Vec<f64> {
        self.errors.iter().map(|e| e.actual).collect()
    }

    /// Σ|error| over scored points.
    pub fn total_absolute_error(&self) -> f64 {
        self.errors.iter().map(|e| e.error.abs()).sum()
    }
}

// ─── Loop ────────────────────────────────────────────────────────────

fn score_point(
    series: &WellSeries,
    index: usize,
    forecaster: &dyn Forecaster,
    horizon: usize,
) -> Result<PredictionError, SkippedPoint> {
    let actual = &series.groundwater[index];
    let skip = |reason| SkippedPoint {
        timestamp: actual.timestamp,
        reason,
    };

    let window = series.window_before(actual.timestamp);
    if window.groundwater.is_empty() {
        return Err(skip(SkipReason::NoHistory));
    }

    let values = forecaster
        .forecast(&window, horizon)
        .map_err(|e| skip(SkipReason::ForecastFailed(e.to_string())))?;

    match values.first() {
        Some(&predicted) if predicted.is_finite() => Ok(PredictionError {
            timestamp: actual.timestamp,
            predicted,
            actual: actual.gwl,
            error: predicted - actual.gwl,
        }),
        _ => Err(skip(SkipReason::InvalidOutput)),
    }
}

/// Run the rolling one-step-ahead backtest over one well.
pub fn run_backtest(
    series: &WellSeries,
    forecaster: &dyn Forecaster,
    config: &BacktestConfig,
) -> BacktestReport {
    let len = series.groundwater.len();
    let start = config.start.resolve(len);

    let outcomes: Vec<Result<PredictionError, SkippedPoint>> = (start..len)
        .into_par_iter()
        .map(|i| score_point(series, i, forecaster, config.horizon))
        .collect();

    let mut errors = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(e) => errors.push(e),
            Err(s) => {
                warn!(
                    well = %series.well_id,
                    timestamp = %s.timestamp,
                    reason = ?s.reason,
                    "skipping backtest point"
                );
                skipped.push(s);
            }
        }
    }
    errors.sort_by_key(|e| e.timestamp);
    skipped.sort_by_key(|s| s.timestamp);

    let predictions: Vec<f64> = errors.iter().map(|e| e.predicted).collect();
    let actuals: Vec<f64> = errors.iter().map(|e| e.actual).collect();
    let metrics = MetricSet::compute(&predictions, &actuals);

    debug!(
        well = %series.well_id,
        scored = errors.len(),
        skipped = skipped.len(),
        rmse = metrics.rmse,
        "backtest complete"
    );

    BacktestReport {
        errors,
        skipped,
        metrics,
    }
}
