//! Assistant — the external text-generation collaborator.
//!
//! The collaborator is opaque: a JSON body goes out on one of four routes and
//! a block of text comes back. Everything the rest of the crate needs is
//! behind [`TextGenerator`], so tests substitute a canned implementation and
//! the CLI plugs in [`HttpTextGenerator`].
//!
//! Program proposals come back as JSON describing a [`ForecastProgram`]; the
//! text is never executed.

pub mod client;
pub mod prompt;

pub use client::HttpTextGenerator;
pub use prompt::{
    commentary_body, failure_body, history_digest, insights_body, truncate_to_lines,
    ProgramRequest, PromptMode, RecentRecords,
};

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use gwlab_core::forecast::ForecastProgram;

use gwlab_core::domain::WellId;

use crate::compliance::ComplianceReport;
use crate::evaluation::{StatisticalAnalysis, WellForecast};
use crate::lifecycle::{ArimaParams, Candidate, GpKernel, ModelKind, ModelParams};

// ─── Routes and errors ───────────────────────────────────────────────

/// Endpoint families offered by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Explain why a response could not be used.
    AnalyzeFailure,
    /// Commentary on residual statistics.
    StatisticalCommentary,
    /// Propose a forecast program.
    GenerateProgram,
    /// Free-form insights (dashboard, sustainability).
    Insights,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::AnalyzeFailure => "api/v2/ai1_fetch/raw_text",
            Self::StatisticalCommentary => "api/v2/ai2_fetch/raw_text",
            Self::GenerateProgram => "api/v2/ai3_fetch/raw_text",
            Self::Insights => "api/v1/ai_fetch/raw_text",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("request to {route} failed: {message}")]
    Network { route: Route, message: String },

    #[error("{route} returned HTTP {status}")]
    Status { route: Route, status: u16 },

    #[error("malformed assistant response: {0}")]
    MalformedResponse(String),

    #[error("assistant is not configured: {0}")]
    Config(String),

    #[error("cannot encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Anything that turns a request body into generated text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, route: Route, body: &Value) -> Result<String, AssistantError>;
}

// ─── Program proposals ───────────────────────────────────────────────

/// A parsed program proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramProposal {
    pub program: ForecastProgram,
    pub theory: String,
    pub explanation: String,
    pub arima_params: Option<ArimaParams>,
    pub gp_kernel: Option<GpKernel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    program: Value,
    #[serde(default)]
    theory: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    optimal_arima_params: Option<ArimaParams>,
    #[serde(default)]
    optimal_gp_kernel_type: Option<String>,
}

/// Drop a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

impl ProgramProposal {
    /// Parse and validate the text returned by [`Route::GenerateProgram`].
    pub fn parse(text: &str) -> Result<Self, AssistantError> {
        let raw: RawProposal = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
            AssistantError::MalformedResponse(format!("proposal is not valid JSON: {e}"))
        })?;

        let program = ForecastProgram::from_json(&raw.program.to_string())
            .map_err(|e| AssistantError::MalformedResponse(format!("invalid program: {e}")))?;

        let gp_kernel = match raw.optimal_gp_kernel_type.as_deref() {
            None | Some("") => None,
            Some(name) => match name.parse::<GpKernel>() {
                Ok(kernel) => Some(kernel),
                Err(e) => {
                    warn!(kernel = name, error = %e, "ignoring unknown kernel suggestion");
                    None
                }
            },
        };

        Ok(Self {
            program,
            theory: raw.theory,
            explanation: raw.explanation,
            arima_params: raw.optimal_arima_params,
            gp_kernel,
        })
    }

    /// Candidate for `kind`'s slot; only the matching parameter suggestion is kept.
    pub fn into_candidate(self, kind: ModelKind) -> Candidate {
        let params = match kind {
            ModelKind::General => None,
            ModelKind::Arima => self.arima_params.map(ModelParams::Arima),
            ModelKind::GaussianProcess => self.gp_kernel.map(ModelParams::GaussianProcess),
        };
        Candidate {
            program: self.program,
            theory: self.theory,
            explanation: self.explanation,
            params,
        }
    }
}

// ─── Requests ────────────────────────────────────────────────────────

/// Ask for a new program.
pub fn request_program(
    generator: &dyn TextGenerator,
    request: &ProgramRequest,
) -> Result<ProgramProposal, AssistantError> {
    let body = request.to_body();
    let text = generator.generate(Route::GenerateProgram, &body)?;
    let proposal = ProgramProposal::parse(&text)?;
    info!(
        well = %request.well_id,
        model = %request.model,
        program = %proposal.program,
        "received program proposal"
    );
    Ok(proposal)
}

/// Ask why a response could not be used; the answer becomes a hint for the next attempt.
pub fn explain_failure(
    generator: &dyn TextGenerator,
    details: &str,
    context: &str,
) -> Result<String, AssistantError> {
    generator.generate(Route::AnalyzeFailure, &failure_body(details, context))
}

/// Ask for commentary on a well's residual statistics.
pub fn statistical_commentary(
    generator: &dyn TextGenerator,
    analysis: &StatisticalAnalysis,
    model: ModelKind,
    well: &WellId,
    arima: ArimaParams,
) -> Result<String, AssistantError> {
    generator.generate(
        Route::StatisticalCommentary,
        &commentary_body(analysis, model, well, arima),
    )
}

/// Ask for sustainability recommendations based on a compliance report.
pub fn sustainability_insights(
    generator: &dyn TextGenerator,
    report: &ComplianceReport,
) -> Result<String, AssistantError> {
    let context = serde_json::to_value(report)?;
    generator.generate(Route::Insights, &insights_body("sustainability", context))
}

/// Ask for operating recommendations based on a well's latest forecast.
pub fn dashboard_recommendation(
    generator: &dyn TextGenerator,
    well: &WellId,
    forecast: &WellForecast,
) -> Result<String, AssistantError> {
    let context = serde_json::json!({
        "wellId": well,
        "forecast": forecast,
    });
    generator.generate(Route::Insights, &insights_body("dashboard", context))
}

/// Hint text stored on the session after a failure analysis.
pub fn suggested_hint(analysis: &str) -> String {
    format!("AI suggests: {}", analysis.trim())
}
