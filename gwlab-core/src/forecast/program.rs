//! Declarative forecast programs.
//!
//! A program is a base GWL model, optional exogenous adjustments over the
//! auxiliary channels, and an optional clamp. Programs are plain data: they
//! arrive as JSON from the assistant, are validated against hard limits, and
//! are evaluated by the interpreter below. Nothing proposed externally is
//! ever executed as code.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ForecastError, Forecaster};
use crate::data::{Feature, HistoricalWindow};
use crate::stats::{acf, mean};

/// Longest lookback/window a program may request, in observations.
pub const MAX_WINDOW: usize = 365;
/// Highest autoregressive order accepted.
pub const MAX_AR_ORDER: usize = 10;
/// Highest differencing degree accepted.
pub const MAX_DIFFERENCING: usize = 2;
/// Most exogenous terms a program may carry.
pub const MAX_EXOGENOUS_TERMS: usize = 8;

// ─── Program types ───────────────────────────────────────────────────

/// Base model projecting the GWL series forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseModel {
    /// Repeat the last observed level.
    Persistence,
    /// Extend the average change over the last `lookback` steps.
    Drift { lookback: usize },
    /// Flat forecast at the mean of the last `window` levels.
    MovingAverage { window: usize },
    /// Least-squares line over the last `window` levels.
    LinearTrend { window: usize },
    /// Simple exponential smoothing, flat forecast at the final level.
    ExponentialSmoothing { alpha: f64 },
    /// AR(`order`) fitted by Yule–Walker on the `differencing`-times differenced series.
    Autoregressive {
        order: usize,
        #[serde(default)]
        differencing: usize,
    },
}

/// Additive adjustment: `coefficient × mean(last lookback values of feature)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExogenousTerm {
    pub feature: Feature,
    pub lookback: usize,
    pub coefficient: f64,
}

/// Bounds applied to every predicted value, last.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Clamp {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Clamp {
    fn apply(&self, v: f64) -> f64 {
        let v = self.min.map_or(v, |lo| v.max(lo));
        self.max.map_or(v, |hi| v.min(hi))
    }
}

/// A complete forecast program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastProgram {
    pub base: BaseModel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exogenous: Vec<ExogenousTerm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clamp: Option<Clamp>,
}

impl Default for ForecastProgram {
    /// Persistence: the last observed level repeated over the horizon.
    fn default() -> Self {
        Self::from_base(BaseModel::Persistence)
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ForecastError {
    ForecastError::InvalidParameter {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_window(field: &str, value: usize) -> Result<(), ForecastError> {
    if value == 0 || value > MAX_WINDOW {
        return Err(invalid(field, format!("must be in 1..={MAX_WINDOW}, got {value}")));
    }
    Ok(())
}

impl ForecastProgram {
    pub fn from_base(base: BaseModel) -> Self {
        Self {
            base,
            exogenous: Vec::new(),
            clamp: None,
        }
    }

    /// Parse a program from JSON and validate it.
    pub fn from_json(text: &str) -> Result<Self, ForecastError> {
        let program: Self =
            serde_json::from_str(text).map_err(|e| ForecastError::Program(e.to_string()))?;
        program.validate()?;
        Ok(program)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Content hash of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    /// Reject parameters outside the interpreter's limits.
    pub fn validate(&self) -> Result<(), ForecastError> {
        match self.base {
            BaseModel::Persistence => {}
            BaseModel::Drift { lookback } => check_window("base.lookback", lookback)?,
            BaseModel::MovingAverage { window } | BaseModel::LinearTrend { window } => {
                check_window("base.window", window)?
            }
            BaseModel::ExponentialSmoothing { alpha } => {
                if !(alpha.is_finite() && alpha > 0.0 && alpha <= 1.0) {
                    return Err(invalid("base.alpha", format!("must be in (0, 1], got {alpha}")));
                }
            }
            BaseModel::Autoregressive {
                order,
                differencing,
            } => {
                if order == 0 || order > MAX_AR_ORDER {
                    return Err(invalid(
                        "base.order",
                        format!("must be in 1..={MAX_AR_ORDER}, got {order}"),
                    ));
                }
                if differencing > MAX_DIFFERENCING {
                    return Err(invalid(
                        "base.differencing",
                        format!("must be at most {MAX_DIFFERENCING}, got {differencing}"),
                    ));
                }
            }
        }

        if self.exogenous.len() > MAX_EXOGENOUS_TERMS {
            return Err(invalid(
                "exogenous",
                format!("at most {MAX_EXOGENOUS_TERMS} terms, got {}", self.exogenous.len()),
            ));
        }
        for (i, term) in self.exogenous.iter().enumerate() {
            check_window(&format!("exogenous[{i}].lookback"), term.lookback)?;
            if !term.coefficient.is_finite() {
                return Err(invalid(format!("exogenous[{i}].coefficient"), "must be finite"));
            }
        }

        if let Some(clamp) = &self.clamp {
            let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
            if !finite(clamp.min) || !finite(clamp.max) {
                return Err(invalid("clamp", "bounds must be finite"));
            }
            if let (Some(lo), Some(hi)) = (clamp.min, clamp.max) {
                if lo > hi {
                    return Err(invalid("clamp", format!("min {lo} exceeds max {hi}")));
                }
            }
        }

        Ok(())
    }

    /// Interpret the program over `window`.
    ///
    /// With no GWL history the result is `horizon` zeros.
    pub fn evaluate(
        &self,
        window: &HistoricalWindow<'_>,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        self.validate()?;
        let history = window.gwl_values();
        if history.is_empty() {
            return Ok(vec![0.0; horizon]);
        }

        let offset: f64 = self
            .exogenous
            .iter()
            .map(|t| exogenous_contribution(window, t))
            .sum();

        let mut out = self.base.project(&history, horizon);
        for v in &mut out {
            *v += offset;
            if let Some(clamp) = &self.clamp {
                *v = clamp.apply(*v);
            }
        }
        Ok(out)
    }
}

impl Forecaster for ForecastProgram {
    fn forecast(
        &self,
        window: &HistoricalWindow<'_>,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        self.evaluate(window, horizon)
    }
}

impl fmt::Display for ForecastProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            BaseModel::Persistence => write!(f, "persistence")?,
            BaseModel::Drift { lookback } => write!(f, "drift(lookback={lookback})")?,
            BaseModel::MovingAverage { window } => write!(f, "moving-average(window={window})")?,
            BaseModel::LinearTrend { window } => write!(f, "linear-trend(window={window})")?,
            BaseModel::ExponentialSmoothing { alpha } => write!(f, "exp-smoothing(alpha={alpha})")?,
            BaseModel::Autoregressive {
                order,
                differencing,
            } => write!(f, "AR({order}) d={differencing}")?,
        }
        for term in &self.exogenous {
            write!(f, " {:+}·{:?}[{}]", term.coefficient, term.feature, term.lookback)?;
        }
        if let Some(clamp) = &self.clamp {
            write!(f, " clamp[{:?}, {:?}]", clamp.min, clamp.max)?;
        }
        Ok(())
    }
}

// ─── Interpreter ─────────────────────────────────────────────────────

fn tail(x: &[f64], n: usize) -> &[f64] {
    &x[x.len().saturating_sub(n)..]
}

fn exogenous_contribution(window: &HistoricalWindow<'_>, term: &ExogenousTerm) -> f64 {
    let values = window.feature_values(term.feature);
    if values.is_empty() {
        return 0.0;
    }
    term.coefficient * mean(tail(&values, term.lookback))
}

impl BaseModel {
    /// Project a non-empty history `horizon` steps ahead.
    fn project(&self, history: &[f64], horizon: usize) -> Vec<f64> {
        let n = history.len();
        let last = history[n - 1];
        match *self {
            BaseModel::Persistence => vec![last; horizon],
            BaseModel::Drift { lookback } => {
                let k = lookback.min(n - 1);
                if k == 0 {
                    return vec![last; horizon];
                }
                let slope = (last - history[n - 1 - k]) / k as f64;
                (1..=horizon).map(|h| last + slope * h as f64).collect()
            }
            BaseModel::MovingAverage { window } => vec![mean(tail(history, window)); horizon],
            BaseModel::LinearTrend { window } => linear_trend(tail(history, window), horizon),
            BaseModel::ExponentialSmoothing { alpha } => {
                let level = history[1..]
                    .iter()
                    .fold(history[0], |level, &v| alpha * v + (1.0 - alpha) * level);
                vec![level; horizon]
            }
            BaseModel::Autoregressive {
                order,
                differencing,
            } => autoregressive(history, order, differencing, horizon),
        }
    }
}

fn linear_trend(y: &[f64], horizon: usize) -> Vec<f64> {
    let w = y.len();
    let last = y[w - 1];
    if w < 2 {
        return vec![last; horizon];
    }
    let t_bar = (w - 1) as f64 / 2.0;
    let y_bar = mean(y);
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (t, &v) in y.iter().enumerate() {
        let dt = t as f64 - t_bar;
        sxy += dt * (v - y_bar);
        sxx += dt * dt;
    }
    let slope = sxy / sxx;
    let intercept = y_bar - slope * t_bar;
    (1..=horizon)
        .map(|h| intercept + slope * (w - 1 + h) as f64)
        .collect()
}

fn difference(x: &[f64]) -> Vec<f64> {
    x.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Yule–Walker AR coefficients via Levinson–Durbin.
///
/// Returns fewer than `order` coefficients when the series is too short, and
/// none for a constant series.
fn yule_walker(y: &[f64], order: usize) -> Vec<f64> {
    let r: Vec<f64> = acf(y, order).iter().map(|p| p.value).collect();
    if r.len() < 2 || r[0] == 0.0 {
        return Vec::new();
    }

    let m = r.len() - 1;
    let mut phi = vec![0.0; m];
    let mut err = r[0];
    for k in 0..m {
        if err.abs() < 1e-12 {
            phi.truncate(k);
            break;
        }
        let mut acc = r[k + 1];
        for j in 0..k {
            acc -= phi[j] * r[k - j];
        }
        let kappa = acc / err;
        let prev = phi.clone();
        phi[k] = kappa;
        for j in 0..k {
            phi[j] = prev[j] - kappa * prev[k - 1 - j];
        }
        err *= 1.0 - kappa * kappa;
    }

    if phi.iter().all(|c| c.is_finite()) {
        phi
    } else {
        Vec::new()
    }
}

fn autoregressive(history: &[f64], order: usize, differencing: usize, horizon: usize) -> Vec<f64> {
    let mut levels = vec![history.to_vec()];
    for _ in 0..differencing {
        let prev = &levels[levels.len() - 1];
        if prev.len() < 2 {
            break;
        }
        let next = difference(prev);
        levels.push(next);
    }
    let d = levels.len() - 1;

    let y = &levels[d];
    let phi = yule_walker(y, order);
    let mu = mean(y);

    let mut path = y.clone();
    let mut lasts: Vec<f64> = levels[..d].iter().map(|l| l[l.len() - 1]).collect();
    let mut out = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let len = path.len();
        let next = mu
            + phi
                .iter()
                .enumerate()
                .map(|(i, c)| c * (path[len - 1 - i] - mu))
                .sum::<f64>();
        path.push(next);

        let mut value = next;
        for k in (0..d).rev() {
            lasts[k] += value;
            value = lasts[k];
        }
        out.push(value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_timestamp, GroundwaterReading, WeatherReading, WellId};

    fn gw_series(values: &[f64]) -> Vec<GroundwaterReading> {
        let start = parse_timestamp("2024-01-01").unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &gwl)| GroundwaterReading {
                well_id: WellId::from("W1"),
                timestamp: start + chrono::Duration::days(i as i64),
                gwl,
                ec: None,
            })
            .collect()
    }

    fn window(gw: &[GroundwaterReading]) -> HistoricalWindow<'_> {
        HistoricalWindow {
            groundwater: gw,
            water_quality: &[],
            weather: &[],
            usage: &[],
        }
    }

    #[test]
    fn default_program_repeats_last_level() {
        let gw = gw_series(&[10.0, 11.0, 12.5]);
        let out = ForecastProgram::default().evaluate(&window(&gw), 7).unwrap();
        assert_eq!(out, vec![12.5; 7]);
    }

    #[test]
    fn empty_history_gives_zeros() {
        let out = ForecastProgram::default().evaluate(&window(&[]), 7).unwrap();
        assert_eq!(out, vec![0.0; 7]);
    }

    #[test]
    fn drift_extends_average_change() {
        let gw = gw_series(&[10.0, 11.0, 12.0, 13.0]);
        let p = ForecastProgram::from_base(BaseModel::Drift { lookback: 3 });
        let out = p.evaluate(&window(&gw), 3).unwrap();
        assert_eq!(out, vec![14.0, 15.0, 16.0]);
    }

    #[test]
    fn moving_average_uses_tail() {
        let gw = gw_series(&[100.0, 2.0, 4.0]);
        let p = ForecastProgram::from_base(BaseModel::MovingAverage { window: 2 });
        assert_eq!(p.evaluate(&window(&gw), 2).unwrap(), vec![3.0, 3.0]);
    }

    #[test]
    fn linear_trend_recovers_exact_line() {
        let gw = gw_series(&[1.0, 3.0, 5.0, 7.0]);
        let p = ForecastProgram::from_base(BaseModel::LinearTrend { window: 30 });
        let out = p.evaluate(&window(&gw), 2).unwrap();
        assert!((out[0] - 9.0).abs() < 1e-9);
        assert!((out[1] - 11.0).abs() < 1e-9);
    }

    #[test]
    fn exponential_smoothing_alpha_one_is_persistence() {
        let gw = gw_series(&[4.0, 6.0, 5.0]);
        let p = ForecastProgram::from_base(BaseModel::ExponentialSmoothing { alpha: 1.0 });
        assert_eq!(p.evaluate(&window(&gw), 3).unwrap(), vec![5.0; 3]);
    }

    #[test]
    fn differenced_ar_follows_linear_ramp() {
        // First differences are constant, so the AR part has nothing to fit and
        // the forecast continues the ramp at the mean step.
        let gw = gw_series(&[10.0, 10.5, 11.0, 11.5, 12.0, 12.5]);
        let p = ForecastProgram::from_base(BaseModel::Autoregressive {
            order: 2,
            differencing: 1,
        });
        let out = p.evaluate(&window(&gw), 3).unwrap();
        assert!((out[0] - 13.0).abs() < 1e-9);
        assert!((out[2] - 14.0).abs() < 1e-9);
    }

    #[test]
    fn ar_forecast_is_finite_on_noisy_series() {
        let values: Vec<f64> = (0..60).map(|i| 15.0 + (i as f64 * 0.7).sin()).collect();
        let gw = gw_series(&values);
        let p = ForecastProgram::from_base(BaseModel::Autoregressive {
            order: 3,
            differencing: 0,
        });
        let out = p.evaluate(&window(&gw), 7).unwrap();
        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn yule_walker_ar1_on_smooth_series() {
        let y: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1).sin()).collect();
        let phi = yule_walker(&y, 1);
        assert_eq!(phi.len(), 1);
        assert!(phi[0] > 0.9 && phi[0] < 1.0);
    }

    #[test]
    fn yule_walker_constant_series_has_no_coefficients() {
        assert!(yule_walker(&[3.0; 20], 2).is_empty());
    }

    #[test]
    fn exogenous_terms_and_clamp_apply() {
        let gw = gw_series(&[10.0, 10.0]);
        let rain = vec![
            WeatherReading {
                well_id: WellId::from("W1"),
                timestamp: parse_timestamp("2024-01-01").unwrap(),
                precipitation: Some(4.0),
                temperature: None,
            },
            WeatherReading {
                well_id: WellId::from("W1"),
                timestamp: parse_timestamp("2024-01-02").unwrap(),
                precipitation: Some(8.0),
                temperature: None,
            },
        ];
        let w = HistoricalWindow {
            groundwater: &gw,
            water_quality: &[],
            weather: &rain,
            usage: &[],
        };
        let mut p = ForecastProgram::default();
        p.exogenous.push(ExogenousTerm {
            feature: Feature::Precipitation,
            lookback: 2,
            coefficient: -0.5,
        });
        assert_eq!(p.evaluate(&w, 2).unwrap(), vec![7.0, 7.0]);

        p.clamp = Some(Clamp {
            min: Some(8.0),
            max: None,
        });
        assert_eq!(p.evaluate(&w, 2).unwrap(), vec![8.0, 8.0]);
    }

    #[test]
    fn validation_rejects_out_of_range_parameters() {
        let bad = [
            BaseModel::Drift { lookback: 0 },
            BaseModel::MovingAverage { window: MAX_WINDOW + 1 },
            BaseModel::ExponentialSmoothing { alpha: 0.0 },
            BaseModel::ExponentialSmoothing { alpha: f64::NAN },
            BaseModel::Autoregressive { order: 11, differencing: 0 },
            BaseModel::Autoregressive { order: 2, differencing: 3 },
        ];
        for base in bad {
            let p = ForecastProgram::from_base(base.clone());
            assert!(p.validate().is_err(), "{base:?} should be rejected");
        }

        let mut p = ForecastProgram::default();
        p.clamp = Some(Clamp {
            min: Some(5.0),
            max: Some(1.0),
        });
        assert!(p.validate().is_err());
    }

    #[test]
    fn json_form_is_tagged() {
        let text = r#"{
            "base": {"type": "MOVING_AVERAGE", "window": 5},
            "exogenous": [{"feature": "pumping", "lookback": 3, "coefficient": 0.01}]
        }"#;
        let p = ForecastProgram::from_json(text).unwrap();
        assert_eq!(p.base, BaseModel::MovingAverage { window: 5 });
        assert_eq!(p.exogenous[0].feature, Feature::Pumping);

        let err = ForecastProgram::from_json(r#"{"base": {"type": "NEURAL_NET"}}"#).unwrap_err();
        assert!(matches!(err, ForecastError::Program(_)));

        let err = ForecastProgram::from_json(r#"{"base": {"type": "DRIFT", "lookback": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter { .. }));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = ForecastProgram::default();
        let b = ForecastProgram::from_base(BaseModel::Drift { lookback: 3 });
        assert_eq!(a.fingerprint(), ForecastProgram::default().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
