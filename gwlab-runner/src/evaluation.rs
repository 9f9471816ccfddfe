//! Prediction check — backtest, diagnostics, forecast and intervals for a well.
//!
//! A check runs the trailing-window backtest, summarises its residuals, asks
//! the forecaster for the next `horizon` levels on the full history, enforces
//! the output shape, and wraps the forecast in hybrid prediction intervals.
//! Any failure surfaces as an [`EvaluationError`]; callers clear the well's
//! forecast and keep the model's last-known-good state.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use gwlab_core::data::{WellDataset, WellSeries};
use gwlab_core::domain::WellId;
use gwlab_core::forecast::{forecast_checked, ForecastError, Forecaster, DEFAULT_HORIZON};
use gwlab_core::interval::{hybrid_intervals_with_rng, BootstrapConfig, IntervalBound};
use gwlab_core::metrics::MetricSet;
use gwlab_core::rng::{RngHierarchy, PURPOSE_INTERVALS};
use gwlab_core::stats::{acf, histogram_bins, qq_plot_data, AcfPoint, HistogramBin, QqPoint};
use gwlab_core::stats::ResidualDiagnostics;

use crate::backtest::{run_backtest, BacktestConfig, BacktestReport, PredictionError};

// ─── Configuration ───────────────────────────────────────────────────

/// Parameters shared by every check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Forecast horizon N (default 7).
    pub horizon: usize,
    /// Number of most recent observations scored by the check (default 7).
    pub leading_period: usize,
    pub bootstrap: BootstrapConfig,
    /// Lags computed for residual ACF in the full statistical analysis (default 7).
    pub acf_lags: usize,
    /// Histogram bins in the full statistical analysis (default 10).
    pub histogram_bins: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            leading_period: 7,
            bootstrap: BootstrapConfig::default(),
            acf_lags: 7,
            histogram_bins: 10,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Everything a successful check produces for one well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellForecast {
    pub predictions: Vec<f64>,
    pub dates: Vec<NaiveDate>,
    pub errors: Vec<PredictionError>,
    pub metrics: MetricSet,
    #[serde(rename = "futureCiBounds")]
    pub intervals: Vec<IntervalBound>,
    pub bootstrap_start_step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ResidualDiagnostics>,
}

impl WellForecast {
    /// Empty forecast left behind after a failed check, keeping the step setting.
    pub fn cleared(bootstrap_start_step: usize) -> Self {
        Self {
            predictions: Vec::new(),
            dates: Vec::new(),
            errors: Vec::new(),
            metrics: MetricSet::unavailable(),
            intervals: Vec::new(),
            bootstrap_start_step,
            diagnostics: None,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Errors from a prediction check.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("no groundwater data for well {well}")]
    NoData { well: WellId },

    #[error("forecast for well {well} failed: {source}")]
    Forecast {
        well: WellId,
        #[source]
        source: ForecastError,
    },
}

impl EvaluationError {
    pub fn well(&self) -> &WellId {
        match self {
            Self::NoData { well } | Self::Forecast { well, .. } => well,
        }
    }
}

/// `N` calendar dates following `last`.
pub fn forecast_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64).map(|d| last + Duration::days(d)).collect()
}

// ─── Check ───────────────────────────────────────────────────────────

/// Forecast the next `horizon` levels from the full history, without scoring.
///
/// Used right after a new program is installed, before any check has run:
/// the intervals are all unknown because there are no residuals yet.
pub fn initial_forecast(
    series: &WellSeries,
    forecaster: &dyn Forecaster,
    horizon: usize,
    bootstrap_start_step: usize,
) -> Result<WellForecast, EvaluationError> {
    let last = series.last_timestamp().ok_or_else(|| EvaluationError::NoData {
        well: series.well_id.clone(),
    })?;
    let predictions =
        forecast_checked(forecaster, &series.full_window(), horizon).map_err(|source| {
            EvaluationError::Forecast {
                well: series.well_id.clone(),
                source,
            }
        })?;

    Ok(WellForecast {
        dates: forecast_dates(last.date(), horizon),
        intervals: vec![IntervalBound::UNKNOWN; predictions.len()],
        predictions,
        errors: Vec::new(),
        metrics: MetricSet::unavailable(),
        bootstrap_start_step,
        diagnostics: None,
    })
}

/// Run the full prediction check for one well.
///
/// `iteration` selects the RNG stream so re-running the same check is
/// reproducible while successive iterations draw fresh trials.
pub fn check_well(
    series: &WellSeries,
    forecaster: &dyn Forecaster,
    bootstrap_start_step: usize,
    config: &CheckConfig,
    rng: &RngHierarchy,
    iteration: u64,
) -> Result<WellForecast, EvaluationError> {
    let last = series.last_timestamp().ok_or_else(|| EvaluationError::NoData {
        well: series.well_id.clone(),
    })?;

    let report = run_backtest(
        series,
        forecaster,
        &BacktestConfig::trailing(config.leading_period, config.horizon),
    );
    let residuals = report.residuals();
    let diagnostics = ResidualDiagnostics::compute(&residuals, 1);

    let predictions = forecast_checked(forecaster, &series.full_window(), config.horizon)
        .map_err(|source| EvaluationError::Forecast {
            well: series.well_id.clone(),
            source,
        })?;

    let step = bootstrap_start_step.min(config.horizon);
    let mut stream = rng.rng_for(&series.well_id, PURPOSE_INTERVALS, iteration);
    let intervals =
        hybrid_intervals_with_rng(&residuals, &predictions, step, &config.bootstrap, &mut stream);

    info!(
        well = %series.well_id,
        scored = report.errors.len(),
        rmse = report.metrics.rmse,
        diagnostics = %diagnostics.summary(),
        "prediction check complete"
    );

    Ok(WellForecast {
        predictions,
        dates: forecast_dates(last.date(), config.horizon),
        errors: report.errors,
        metrics: report.metrics,
        intervals,
        bootstrap_start_step: step,
        diagnostics: Some(diagnostics),
    })
}

/// Check many wells in parallel. Results come back in `wells` order.
pub fn check_all_wells(
    dataset: &WellDataset,
    wells: &[WellId],
    forecaster: &dyn Forecaster,
    steps: &BTreeMap<WellId, usize>,
    config: &CheckConfig,
    rng: &RngHierarchy,
    iteration: u64,
) -> Vec<(WellId, Result<WellForecast, EvaluationError>)> {
    wells
        .par_iter()
        .map(|id| {
            let series = dataset.for_well(id);
            let step = steps.get(id).copied().unwrap_or(0);
            let outcome = check_well(&series, forecaster, step, config, rng, iteration);
            if let Err(e) = &outcome {
                warn!(well = %id, error = %e, "prediction check failed");
            }
            (id.clone(), outcome)
        })
        .collect()
}

// ─── Statistical analysis ────────────────────────────────────────────

/// Full-history residual analysis for one well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalAnalysis {
    pub backtest: BacktestReport,
    pub residuals: ResidualDiagnostics,
    pub raw_gwl_acf: Vec<AcfPoint>,
    pub qq: Vec<QqPoint>,
    pub histogram: Vec<HistogramBin>,
}

/// Backtest the whole history and describe the resulting residuals.
pub fn statistical_analysis(
    series: &WellSeries,
    forecaster: &dyn Forecaster,
    config: &CheckConfig,
) -> Result<StatisticalAnalysis, EvaluationError> {
    if series.groundwater.is_empty() {
        return Err(EvaluationError::NoData {
            well: series.well_id.clone(),
        });
    }

    let backtest = run_backtest(series, forecaster, &BacktestConfig::full_history(config.horizon));
    let residuals = backtest.residuals();

    Ok(StatisticalAnalysis {
        residuals: ResidualDiagnostics::compute(&residuals, config.acf_lags),
        raw_gwl_acf: acf(&series.gwl_values(), config.acf_lags),
        qq: qq_plot_data(&residuals),
        histogram: histogram_bins(&residuals, config.histogram_bins),
        backtest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwlab_core::data::HistoricalWindow;
    use gwlab_core::domain::{parse_timestamp, GroundwaterReading};
    use gwlab_core::forecast::ForecastProgram;

    fn series(values: &[f64]) -> WellSeries {
        let start = parse_timestamp("2024-03-01").unwrap();
        let mut s = WellSeries::empty(WellId::from("W1"));
        s.groundwater = values
            .iter()
            .enumerate()
            .map(|(i, &gwl)| GroundwaterReading {
                well_id: WellId::from("W1"),
                timestamp: start + Duration::days(i as i64),
                gwl,
                ec: None,
            })
            .collect();
        s
    }

    fn short_output(_: &HistoricalWindow<'_>, _: usize) -> Result<Vec<f64>, ForecastError> {
        Ok(vec![1.0, 2.0])
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n).map(|i| 12.0 + (i as f64 * 0.9).sin() * 0.4).collect()
    }

    #[test]
    fn forecast_dates_follow_last_observation() {
        let d = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        let dates = forecast_dates(d, 3);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
    }

    #[test]
    fn check_produces_full_forecast() {
        let s = series(&wavy(30));
        let f = check_well(
            &s,
            &ForecastProgram::default(),
            3,
            &CheckConfig::default(),
            &RngHierarchy::new(42),
            1,
        )
        .unwrap();

        assert_eq!(f.predictions.len(), 7);
        assert_eq!(f.intervals.len(), 7);
        assert_eq!(f.dates.len(), 7);
        assert_eq!(f.errors.len(), 7);
        assert_eq!(f.bootstrap_start_step, 3);
        assert!(f.metrics.rmse.is_finite());
        assert!(f.intervals.iter().all(|b| b.is_known()));
        assert_eq!(f.dates[0], NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn check_is_reproducible_for_same_iteration() {
        let s = series(&wavy(30));
        let cfg = CheckConfig::default();
        let rng = RngHierarchy::new(42);
        let a = check_well(&s, &ForecastProgram::default(), 5, &cfg, &rng, 2).unwrap();
        let b = check_well(&s, &ForecastProgram::default(), 5, &cfg, &rng, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn check_without_data_fails() {
        let s = WellSeries::empty(WellId::from("W9"));
        let err = check_well(
            &s,
            &ForecastProgram::default(),
            0,
            &CheckConfig::default(),
            &RngHierarchy::new(1),
            0,
        )
        .unwrap_err();
        assert_eq!(err, EvaluationError::NoData { well: WellId::from("W9") });
    }

    #[test]
    fn shape_violation_fails_check() {
        let s = series(&wavy(10));
        let rng = RngHierarchy::new(1);
        let err = check_well(&s, &short_output, 0, &CheckConfig::default(), &rng, 0).unwrap_err();
        match err {
            EvaluationError::Forecast { source, .. } => assert!(source.is_shape_violation()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn step_is_clamped_to_horizon() {
        let s = series(&wavy(20));
        let f = check_well(
            &s,
            &ForecastProgram::default(),
            50,
            &CheckConfig::default(),
            &RngHierarchy::new(1),
            0,
        )
        .unwrap();
        assert_eq!(f.bootstrap_start_step, 7);
    }

    #[test]
    fn initial_forecast_has_unknown_intervals() {
        let s = series(&[10.0, 10.5]);
        let f = initial_forecast(&s, &ForecastProgram::default(), 7, 2).unwrap();
        assert_eq!(f.predictions, vec![10.5; 7]);
        assert!(f.intervals.iter().all(|b| !b.is_known()));
        assert!(f.errors.is_empty());
        assert_eq!(f.bootstrap_start_step, 2);
    }

    #[test]
    fn initial_forecast_without_history_is_no_data() {
        let s = series(&[]);
        let err = initial_forecast(&s, &ForecastProgram::default(), 7, 0).unwrap_err();
        assert!(matches!(err, EvaluationError::NoData { .. }));
    }

    #[test]
    fn statistical_analysis_covers_full_history() {
        let s = series(&wavy(40));
        let a = statistical_analysis(&s, &ForecastProgram::default(), &CheckConfig::default())
            .unwrap();
        assert_eq!(a.backtest.errors.len(), 39);
        assert_eq!(a.residuals.acf.len(), 8);
        assert_eq!(a.raw_gwl_acf.len(), 8);
        assert_eq!(a.qq.len(), 39);
        assert_eq!(a.histogram.iter().map(|b| b.count).sum::<usize>(), 39);
    }

    #[test]
    fn cleared_forecast_keeps_step() {
        let f = WellForecast::cleared(4);
        assert!(f.is_cleared());
        assert_eq!(f.bootstrap_start_step, 4);
    }
}
