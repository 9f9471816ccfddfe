//! Error metrics — pure functions over aligned prediction/actual pairs.
//!
//! Every metric returns `f64::INFINITY` when there is nothing to compare
//! (either side empty, or lengths differ), so "no evaluation" always ranks
//! worst and never reads as a perfect score.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Selectable performance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMetric {
    #[default]
    Rmse,
    Mse,
    Mae,
}

impl ErrorMetric {
    pub const ALL: [ErrorMetric; 3] = [ErrorMetric::Rmse, ErrorMetric::Mse, ErrorMetric::Mae];

    pub fn name(self) -> &'static str {
        match self {
            Self::Rmse => "RMSE",
            Self::Mse => "MSE",
            Self::Mae => "MAE",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Rmse | Self::Mae => "m",
            Self::Mse => "m²",
        }
    }

    pub fn calculate(self, predictions: &[f64], actuals: &[f64]) -> f64 {
        match self {
            Self::Rmse => rmse(predictions, actuals),
            Self::Mse => mse(predictions, actuals),
            Self::Mae => mae(predictions, actuals),
        }
    }
}

impl fmt::Display for ErrorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.unit())
    }
}

impl FromStr for ErrorMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rmse" => Ok(Self::Rmse),
            "mse" => Ok(Self::Mse),
            "mae" => Ok(Self::Mae),
            other => Err(format!("unknown metric '{other}' (expected rmse, mse or mae)")),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn comparable(predictions: &[f64], actuals: &[f64]) -> bool {
    !predictions.is_empty() && predictions.len() == actuals.len()
}

/// Mean squared error.
pub fn mse(predictions: &[f64], actuals: &[f64]) -> f64 {
    if !comparable(predictions, actuals) {
        return f64::INFINITY;
    }
    let sum: f64 = predictions
        .iter()
        .zip(actuals)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    sum / predictions.len() as f64
}

/// Root mean squared error.
pub fn rmse(predictions: &[f64], actuals: &[f64]) -> f64 {
    mse(predictions, actuals).sqrt()
}

/// Mean absolute error.
pub fn mae(predictions: &[f64], actuals: &[f64]) -> f64 {
    if !comparable(predictions, actuals) {
        return f64::INFINITY;
    }
    let sum: f64 = predictions
        .iter()
        .zip(actuals)
        .map(|(p, a)| (p - a).abs())
        .sum();
    sum / predictions.len() as f64
}

// ─── Metric set ──────────────────────────────────────────────────────

/// All three metrics of one evaluation.
///
/// Infinite values are stored as JSON `null` (JSON has no infinity) and read
/// back as `f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(with = "infinite_as_null")]
    pub rmse: f64,
    #[serde(with = "infinite_as_null")]
    pub mse: f64,
    #[serde(with = "infinite_as_null")]
    pub mae: f64,
}

impl MetricSet {
    pub fn compute(predictions: &[f64], actuals: &[f64]) -> Self {
        Self {
            rmse: rmse(predictions, actuals),
            mse: mse(predictions, actuals),
            mae: mae(predictions, actuals),
        }
    }

    /// Metric set of an evaluation with no comparable points.
    pub fn unavailable() -> Self {
        Self {
            rmse: f64::INFINITY,
            mse: f64::INFINITY,
            mae: f64::INFINITY,
        }
    }

    pub fn get(&self, metric: ErrorMetric) -> f64 {
        match metric {
            ErrorMetric::Rmse => self.rmse,
            ErrorMetric::Mse => self.mse,
            ErrorMetric::Mae => self.mae,
        }
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Serde adapter mapping non-finite floats to `null` and back to infinity.
pub mod infinite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if v.is_finite() {
            serializer.serialize_f64(*v)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_on_known_errors() {
        let p = [1.0, 2.0, 3.0];
        let a = [2.0, 2.0, 5.0];
        // errors: -1, 0, -2
        assert!((mse(&p, &a) - 5.0 / 3.0).abs() < 1e-12);
        assert!((rmse(&p, &a) - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((mae(&p, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_or_mismatched_is_infinite() {
        assert_eq!(rmse(&[], &[]), f64::INFINITY);
        assert_eq!(mae(&[1.0], &[1.0, 2.0]), f64::INFINITY);
        assert_eq!(ErrorMetric::Mse.calculate(&[], &[1.0]), f64::INFINITY);
    }

    #[test]
    fn perfect_prediction_is_zero() {
        let x = [3.0, 4.5, 6.0];
        for metric in ErrorMetric::ALL {
            assert_eq!(metric.calculate(&x, &x), 0.0);
        }
    }

    #[test]
    fn names_and_units() {
        assert_eq!(ErrorMetric::Mse.unit(), "m²");
        assert_eq!(ErrorMetric::Mae.to_string(), "MAE (m)");
        assert_eq!("RMSE".parse::<ErrorMetric>().unwrap(), ErrorMetric::Rmse);
    }

    #[test]
    fn infinite_metrics_survive_json() {
        let set = MetricSet::unavailable();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"rmse":null,"mse":null,"mae":null}"#);
        let back: MetricSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(ErrorMetric::Rmse), f64::INFINITY);
    }
}
