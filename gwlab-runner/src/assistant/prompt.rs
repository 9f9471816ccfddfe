//! Request bodies sent to the collaborator.
//!
//! Each body is a flat JSON object. Recent observations are taken from just
//! before the leading period so the assistant never sees the values its
//! program will be scored against.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gwlab_core::data::WellSeries;
use gwlab_core::domain::{
    GroundwaterReading, UsageReading, WaterQualityReading, WeatherReading, WellId,
};
use gwlab_core::forecast::ForecastProgram;
use gwlab_core::metrics::ErrorMetric;
use gwlab_core::stats::AcfPoint;

use crate::evaluation::StatisticalAnalysis;
use crate::history::TheoryHistory;
use crate::lifecycle::{ArimaParams, GpKernel, ModelKind};

/// Number of records per series included in a program request.
pub const RECENT_RECORDS: usize = 5;

/// Lags reported in statistical commentary requests.
pub const COMMENTARY_LAGS: usize = 3;

/// How much theory history goes into a program request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    LowEnd,
    #[default]
    MidEnd,
    HighEnd,
}

impl PromptMode {
    /// Most recent history entries to include.
    pub fn history_entries(self) -> usize {
        match self {
            Self::LowEnd => 1,
            Self::MidEnd | Self::HighEnd => 2,
        }
    }

    /// Lines kept from each theory and explanation.
    pub fn lines_per_text(self) -> usize {
        match self {
            Self::LowEnd => 1,
            Self::MidEnd => 2,
            Self::HighEnd => 3,
        }
    }
}

impl std::str::FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" | "low-end" => Ok(Self::LowEnd),
            "mid" | "mid-end" => Ok(Self::MidEnd),
            "high" | "high-end" => Ok(Self::HighEnd),
            other => Err(format!("unknown prompt mode '{other}' (expected low, mid or high)")),
        }
    }
}

/// First `lines` lines of `text`.
pub fn truncate_to_lines(text: &str, lines: usize) -> String {
    text.lines().take(lines).collect::<Vec<_>>().join("\n")
}

fn before_leading<T: Clone>(records: &[T], leading_period: usize, count: usize) -> Vec<T> {
    let end = records.len().saturating_sub(leading_period);
    let start = end.saturating_sub(count);
    records[start..end].to_vec()
}

/// The last few records of each series ending just before the leading period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRecords {
    pub groundwater: Vec<GroundwaterReading>,
    pub water_quality: Vec<WaterQualityReading>,
    pub weather: Vec<WeatherReading>,
    pub usage: Vec<UsageReading>,
}

impl RecentRecords {
    pub fn from_series(series: &WellSeries, leading_period: usize) -> Self {
        Self {
            groundwater: before_leading(&series.groundwater, leading_period, RECENT_RECORDS),
            water_quality: before_leading(&series.water_quality, leading_period, RECENT_RECORDS),
            weather: before_leading(&series.weather, leading_period, RECENT_RECORDS),
            usage: before_leading(&series.usage, leading_period, RECENT_RECORDS),
        }
    }
}

/// Everything the assistant is told when asked for a new program.
#[derive(Debug, Clone)]
pub struct ProgramRequest {
    pub horizon: usize,
    pub well_id: WellId,
    pub model: ModelKind,
    pub recent: RecentRecords,
    pub metric: ErrorMetric,
    /// Sum of absolute errors from the latest check; non-finite when unchecked.
    pub total_absolute_error: f64,
    pub user_hint: String,
    pub history: Vec<Value>,
    pub current_program: ForecastProgram,
    pub arima_params: ArimaParams,
    pub gp_kernel: GpKernel,
}

/// Condensed recent history, truncated according to `mode`.
pub fn history_digest(history: &TheoryHistory, mode: PromptMode) -> Vec<Value> {
    let lines = mode.lines_per_text();
    history
        .recent(mode.history_entries())
        .iter()
        .map(|e| {
            json!({
                "iteration": e.iteration,
                "model": e.model,
                "program": e.program.to_string(),
                "theory": truncate_to_lines(&e.theory, lines),
                "explanation": truncate_to_lines(&e.explanation, lines),
                "metrics": e.metrics,
            })
        })
        .collect()
}

fn proposal_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "program": {"type": "OBJECT"},
            "theory": {"type": "STRING"},
            "explanation": {"type": "STRING"},
            "optimalArimaParams": {
                "type": "OBJECT",
                "properties": {
                    "p": {"type": "INTEGER"},
                    "d": {"type": "INTEGER"},
                    "q": {"type": "INTEGER"}
                }
            },
            "optimalGpKernelType": {"type": "STRING", "enum": ["RBF", "Linear", "Polynomial"]}
        },
        "required": ["program", "theory", "explanation"]
    })
}

impl ProgramRequest {
    pub fn to_body(&self) -> Value {
        json!({
            "horizon": self.horizon,
            "selectedWellId": self.well_id,
            "selectedPredictionModel": self.model,
            "gwlData": self.recent.groundwater,
            "waterQualityData": self.recent.water_quality,
            "weatherData": self.recent.weather,
            "waterUsageData": self.recent.usage,
            "performanceMetric": self.metric,
            "performanceMetricUnit": self.metric.unit(),
            "currentTotalAbsoluteError": self.total_absolute_error,
            "userHint": self.user_hint,
            "historyForPrompt": self.history,
            "currentFunction": self.current_program,
            "arimaParams": self.arima_params,
            "gpKernelType": self.gp_kernel,
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": proposal_schema(),
            },
        })
    }
}

/// Body for a failure analysis request.
pub fn failure_body(details: &str, context: &str) -> Value {
    json!({
        "errorDetails": details,
        "contextHint": context,
    })
}

fn acf_values(points: &[AcfPoint]) -> Vec<f64> {
    points
        .iter()
        .filter(|p| p.lag >= 1)
        .take(COMMENTARY_LAGS)
        .map(|p| p.value)
        .collect()
}

/// Body for a statistical commentary request.
pub fn commentary_body(
    analysis: &StatisticalAnalysis,
    model: ModelKind,
    well: &WellId,
    arima: ArimaParams,
) -> Value {
    let d = &analysis.residuals;
    json!({
        "selectedPredictionModel": model,
        "selectedWellId": well,
        "meanCurrentResiduals": d.mean,
        "stdDevCurrentResiduals": d.std_dev,
        "skewnessCurrentResiduals": d.skewness,
        "kurtosisCurrentResiduals": d.kurtosis,
        "acfCurrentResiduals": acf_values(&d.acf),
        "acfRawGwlValues": acf_values(&analysis.raw_gwl_acf),
        "arimaParams": arima,
    })
}

/// Body for a free-form insight request.
pub fn insights_body(topic: &str, context: Value) -> Value {
    json!({
        "topic": topic,
        "context": context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gwlab_core::domain::parse_timestamp;

    fn series(n: usize) -> WellSeries {
        let start = parse_timestamp("2024-01-01").unwrap();
        let mut s = WellSeries::empty(WellId::from("W1"));
        s.groundwater = (0..n)
            .map(|i| GroundwaterReading {
                well_id: WellId::from("W1"),
                timestamp: start + Duration::days(i as i64),
                gwl: i as f64,
                ec: None,
            })
            .collect();
        s
    }

    #[test]
    fn truncation_keeps_leading_lines() {
        assert_eq!(truncate_to_lines("a\nb\nc", 2), "a\nb");
        assert_eq!(truncate_to_lines("single", 3), "single");
        assert_eq!(truncate_to_lines("", 1), "");
    }

    #[test]
    fn recent_records_skip_leading_period() {
        let r = RecentRecords::from_series(&series(20), 7);
        let gwl: Vec<f64> = r.groundwater.iter().map(|g| g.gwl).collect();
        assert_eq!(gwl, vec![8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn recent_records_of_short_series_are_empty() {
        let r = RecentRecords::from_series(&series(6), 7);
        assert!(r.groundwater.is_empty());
        let r = RecentRecords::from_series(&series(9), 7);
        assert_eq!(r.groundwater.len(), 2);
    }

    #[test]
    fn prompt_mode_limits() {
        assert_eq!(PromptMode::LowEnd.history_entries(), 1);
        assert_eq!(PromptMode::HighEnd.history_entries(), 2);
        assert_eq!(PromptMode::HighEnd.lines_per_text(), 3);
        assert_eq!("high".parse::<PromptMode>().unwrap(), PromptMode::HighEnd);
        assert_eq!(serde_json::to_string(&PromptMode::MidEnd).unwrap(), "\"mid-end\"");
    }

    #[test]
    fn program_body_carries_context() {
        let req = ProgramRequest {
            horizon: 7,
            well_id: WellId::from("W1"),
            model: ModelKind::Arima,
            recent: RecentRecords::from_series(&series(20), 7),
            metric: ErrorMetric::Mae,
            total_absolute_error: f64::INFINITY,
            user_hint: "rain matters".into(),
            history: Vec::new(),
            current_program: ForecastProgram::default(),
            arima_params: ArimaParams::default(),
            gp_kernel: GpKernel::Rbf,
        };
        let body = req.to_body();
        assert_eq!(body["selectedPredictionModel"], "arima");
        assert_eq!(body["performanceMetric"], "mae");
        assert_eq!(body["gwlData"].as_array().unwrap().len(), 5);
        assert!(body["currentTotalAbsoluteError"].is_null());
        assert_eq!(body["arimaParams"]["p"], 1);
        assert_eq!(body["gpKernelType"], "RBF");
        assert_eq!(body["currentFunction"]["base"]["type"], "PERSISTENCE");
    }

    #[test]
    fn failure_body_fields() {
        let b = failure_body("unexpected token", "program generation");
        assert_eq!(b["errorDetails"], "unexpected token");
        assert_eq!(b["contextHint"], "program generation");
    }
}
