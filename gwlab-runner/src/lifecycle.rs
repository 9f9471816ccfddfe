//! Forecast-program lifecycle — per-model slots with last-known-good rollback.
//!
//! Each model kind owns exactly one slot. A slot's program moves through
//!
//! ```text
//!   install ──► Unchecked ──check ok──► Checked
//!                   │  ▲                    │
//!           failure │  └──── revert ────────┤
//!                   ▼                       │
//!                 Error ◄──── failure ──────┘
//! ```
//!
//! `last_valid` only moves forward on a successful check (or on install of a
//! program whose first forecast validated). Failures never touch it, so a
//! revert always lands on the most recent working program.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use gwlab_core::forecast::ForecastProgram;
use gwlab_core::metrics::{ErrorMetric, MetricSet};
use gwlab_core::stats::ResidualDiagnostics;

use crate::evaluation::WellForecast;
use crate::history::{TheoryEntry, TheoryHistory};

// ─── Model kinds and parameters ──────────────────────────────────────

/// Model family the assistant is asked to write a program for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    General,
    Arima,
    GaussianProcess,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] =
        [ModelKind::General, ModelKind::Arima, ModelKind::GaussianProcess];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Arima => "arima",
            Self::GaussianProcess => "gaussian_process",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "general" => Ok(Self::General),
            "arima" => Ok(Self::Arima),
            "gaussian_process" | "gp" => Ok(Self::GaussianProcess),
            other => Err(format!(
                "unknown model '{other}' (expected general, arima or gaussian_process)"
            )),
        }
    }
}

/// ARIMA orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaParams {
    pub p: u32,
    pub d: u32,
    pub q: u32,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1 }
    }
}

/// Gaussian-process kernel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GpKernel {
    #[default]
    #[serde(rename = "RBF")]
    Rbf,
    Linear,
    Polynomial,
}

impl FromStr for GpKernel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rbf" => Ok(Self::Rbf),
            "linear" => Ok(Self::Linear),
            "polynomial" => Ok(Self::Polynomial),
            other => Err(format!("unknown kernel '{other}' (expected RBF, Linear or Polynomial)")),
        }
    }
}

/// Model-specific parameters; the variant always matches the slot's kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "params", rename_all = "snake_case")]
pub enum ModelParams {
    General,
    Arima(ArimaParams),
    GaussianProcess(GpKernel),
}

impl ModelParams {
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::General => Self::General,
            ModelKind::Arima => Self::Arima(ArimaParams::default()),
            ModelKind::GaussianProcess => Self::GaussianProcess(GpKernel::default()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::General => ModelKind::General,
            Self::Arima(_) => ModelKind::Arima,
            Self::GaussianProcess(_) => ModelKind::GaussianProcess,
        }
    }
}

// ─── Slots ───────────────────────────────────────────────────────────

/// Status of a slot's current program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionStatus {
    #[default]
    Unchecked,
    Checked,
    Error {
        message: String,
    },
}

/// A program known to produce a valid forecast, with its last check results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidState {
    pub program: ForecastProgram,
    pub theory: String,
    pub explanation: String,
    pub params: ModelParams,
    #[serde(default)]
    pub performance: Option<MetricSet>,
    #[serde(default)]
    pub diagnostics: Option<ResidualDiagnostics>,
}

/// Current program of one model kind plus its last-known-good snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSlot {
    pub program: ForecastProgram,
    #[serde(default)]
    pub theory: String,
    #[serde(default)]
    pub explanation: String,
    pub params: ModelParams,
    #[serde(default)]
    pub status: FunctionStatus,
    #[serde(default)]
    pub last_valid: Option<ValidState>,
}

impl ModelSlot {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            program: ForecastProgram::default(),
            theory: String::new(),
            explanation: String::new(),
            params: ModelParams::default_for(kind),
            status: FunctionStatus::Unchecked,
            last_valid: None,
        }
    }

    pub fn is_checked(&self) -> bool {
        self.status == FunctionStatus::Checked
    }

    fn snapshot(
        &self,
        performance: Option<MetricSet>,
        diagnostics: Option<ResidualDiagnostics>,
    ) -> ValidState {
        ValidState {
            program: self.program.clone(),
            theory: self.theory.clone(),
            explanation: self.explanation.clone(),
            params: self.params,
            performance,
            diagnostics,
        }
    }
}

/// One slot per model kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRegistry {
    pub general: ModelSlot,
    pub arima: ModelSlot,
    pub gaussian_process: ModelSlot,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self {
            general: ModelSlot::new(ModelKind::General),
            arima: ModelSlot::new(ModelKind::Arima),
            gaussian_process: ModelSlot::new(ModelKind::GaussianProcess),
        }
    }
}

impl ModelRegistry {
    pub fn slot(&self, kind: ModelKind) -> &ModelSlot {
        match kind {
            ModelKind::General => &self.general,
            ModelKind::Arima => &self.arima,
            ModelKind::GaussianProcess => &self.gaussian_process,
        }
    }

    pub fn slot_mut(&mut self, kind: ModelKind) -> &mut ModelSlot {
        match kind {
            ModelKind::General => &mut self.general,
            ModelKind::Arima => &mut self.arima,
            ModelKind::GaussianProcess => &mut self.gaussian_process,
        }
    }
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// A program proposed for a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub program: ForecastProgram,
    pub theory: String,
    pub explanation: String,
    /// Suggested parameters; ignored unless they match the slot's kind.
    pub params: Option<ModelParams>,
}

/// Errors from lifecycle operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("model {model} has no last-known-good program to revert to")]
    NothingToRevert { model: ModelKind },

    #[error("no history entry has a finite {metric}")]
    NoRankedHistory { metric: ErrorMetric },
}

/// Model registry, theory history and selection state of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelLifecycle {
    #[serde(default)]
    pub registry: ModelRegistry,
    #[serde(default)]
    pub history: TheoryHistory,
    #[serde(default)]
    pub iteration: u64,
    #[serde(default)]
    pub selected_model: ModelKind,
    #[serde(default)]
    pub selected_metric: ErrorMetric,
}

impl ModelLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &ModelSlot {
        self.registry.slot(self.selected_model)
    }

    /// Install a freshly proposed program. Starts a new iteration.
    ///
    /// `forecast_validated` says whether the program's first full-history
    /// forecast passed the shape contract; only then does it become the
    /// slot's last-known-good program.
    pub fn install_candidate(
        &mut self,
        kind: ModelKind,
        candidate: Candidate,
        forecast_validated: bool,
    ) {
        self.iteration += 1;
        let slot = self.registry.slot_mut(kind);
        slot.program = candidate.program;
        slot.theory = candidate.theory;
        slot.explanation = candidate.explanation;
        if let Some(params) = candidate.params.filter(|p| p.kind() == kind) {
            slot.params = params;
        }
        slot.status = FunctionStatus::Unchecked;
        if forecast_validated {
            slot.last_valid = Some(slot.snapshot(None, None));
        }
        info!(
            model = %kind,
            iteration = self.iteration,
            program = %slot.program,
            "installed candidate program"
        );
    }

    /// Record a successful check: status becomes `Checked`, the snapshot
    /// advances and the theory history gains (or updates) an entry.
    pub fn record_check(&mut self, kind: ModelKind, forecast: &WellForecast) {
        let iteration = self.iteration;
        let slot = self.registry.slot_mut(kind);
        slot.status = FunctionStatus::Checked;
        slot.last_valid = Some(slot.snapshot(Some(forecast.metrics), forecast.diagnostics.clone()));

        let entry = TheoryEntry {
            iteration,
            model: kind,
            program: slot.program.clone(),
            theory: slot.theory.clone(),
            explanation: slot.explanation.clone(),
            forecast: forecast.predictions.clone(),
            metrics: forecast.metrics,
            diagnostics: forecast.diagnostics.clone(),
            params: slot.params,
        };
        self.history.record(entry);
    }

    /// Record an execution or shape failure. `last_valid` is left untouched.
    pub fn record_failure(&mut self, kind: ModelKind, message: impl Into<String>) {
        let message = message.into();
        warn!(model = %kind, %message, "program failed");
        self.registry.slot_mut(kind).status = FunctionStatus::Error { message };
    }

    /// Restore the slot's last-known-good program; it must be re-checked.
    pub fn revert(&mut self, kind: ModelKind) -> Result<&ModelSlot, LifecycleError> {
        let slot = self.registry.slot_mut(kind);
        let valid = slot
            .last_valid
            .clone()
            .ok_or(LifecycleError::NothingToRevert { model: kind })?;
        slot.program = valid.program;
        slot.theory = valid.theory;
        slot.explanation = valid.explanation;
        slot.params = valid.params;
        slot.status = FunctionStatus::Unchecked;
        info!(model = %kind, "reverted to last-known-good program");
        Ok(slot)
    }

    /// Load the history entry that scores best on the selected metric into
    /// its model's slot and select that model. The slot must be re-checked.
    pub fn select_best(&mut self) -> Result<TheoryEntry, LifecycleError> {
        let metric = self.selected_metric;
        let best = self
            .history
            .best(metric)
            .cloned()
            .ok_or(LifecycleError::NoRankedHistory { metric })?;

        let slot = self.registry.slot_mut(best.model);
        slot.program = best.program.clone();
        slot.theory = best.theory.clone();
        slot.explanation = best.explanation.clone();
        slot.params = if best.params.kind() == best.model {
            best.params
        } else {
            ModelParams::default_for(best.model)
        };
        slot.status = FunctionStatus::Unchecked;
        self.selected_model = best.model;

        info!(
            model = %best.model,
            iteration = best.iteration,
            value = best.metrics.get(metric),
            "selected best program from history"
        );
        Ok(best)
    }
}
