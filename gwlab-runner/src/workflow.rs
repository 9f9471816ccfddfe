//! Workflow — session-level operations.
//!
//! Each function takes the session document plus configuration, runs one
//! user-facing action and leaves the document in its post-action state. A
//! failed check or generation clears the well's forecast and never touches
//! the model's last-known-good program.

use std::io;

use thiserror::Error;
use tracing::{info, warn};

use gwlab_core::data::{register_new_wells, ImportBatch, ImportKind, ImportSummary, WellSeries};
use gwlab_core::domain::WellId;
use gwlab_core::forecast::ForecastProgram;
use gwlab_core::rng::RngHierarchy;

use crate::assistant::{
    dashboard_recommendation, explain_failure, history_digest, request_program,
    statistical_commentary, suggested_hint, sustainability_insights, AssistantError,
    ProgramRequest, RecentRecords, TextGenerator,
};
use crate::compliance::ComplianceReport;
use crate::config::GwlabConfig;
use crate::evaluation::{
    check_all_wells, check_well, initial_forecast, statistical_analysis, EvaluationError,
    StatisticalAnalysis, WellForecast,
};
use crate::history::{TheoryEntry, TheoryJournal};
use crate::lifecycle::{ArimaParams, GpKernel, LifecycleError, ModelKind, ModelParams};
use crate::session::SessionDocument;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no well selected and no wells imported")]
    NoWell,

    #[error("unknown well {0}")]
    UnknownWell(WellId),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("theory journal: {0}")]
    Journal(#[from] io::Error),
}

/// `requested` if it names a registered well, else the session's active well.
pub fn resolve_well(
    doc: &SessionDocument,
    requested: Option<&WellId>,
) -> Result<WellId, WorkflowError> {
    match requested {
        Some(id) if doc.well(id).is_some() => Ok(id.clone()),
        Some(id) => Err(WorkflowError::UnknownWell(id.clone())),
        None => doc.active_well().cloned().ok_or(WorkflowError::NoWell),
    }
}

// ─── Import ──────────────────────────────────────────────────────────

/// Merge a parsed batch and register any wells it introduces.
pub fn import_batch(
    doc: &mut SessionDocument,
    kind: ImportKind,
    batch: ImportBatch,
) -> ImportSummary {
    let records = batch.len();
    let ids = batch.well_ids();
    let inserted = doc.data.merge(batch);
    let new_wells = register_new_wells(&mut doc.wells, &ids);
    if doc.selected_well_id.is_none() {
        doc.selected_well_id = doc.wells.first().map(|w| w.id.clone());
    }
    info!(%kind, records, inserted, new_wells = new_wells.len(), "import merged");
    ImportSummary {
        kind,
        records,
        inserted,
        new_wells,
    }
}

// ─── Checks ──────────────────────────────────────────────────────────

fn active_program(doc: &SessionDocument) -> (ModelKind, ForecastProgram) {
    let kind = doc.lifecycle.selected_model;
    (kind, doc.lifecycle.registry.slot(kind).program.clone())
}

fn journal_entry(
    doc: &SessionDocument,
    kind: ModelKind,
    journal: Option<&TheoryJournal>,
) -> Result<(), WorkflowError> {
    let entry = doc.lifecycle.history.get(doc.lifecycle.iteration, kind);
    if let (Some(journal), Some(entry)) = (journal, entry) {
        journal.append(entry)?;
    }
    Ok(())
}

fn apply_failure(doc: &mut SessionDocument, kind: ModelKind, well: &WellId, err: &EvaluationError) {
    doc.clear_forecast(well);
    // missing data is not the program's fault
    if matches!(err, EvaluationError::Forecast { .. }) {
        doc.lifecycle.record_failure(kind, err.to_string());
    }
}

/// Run the prediction check for one well with the selected model's program.
pub fn check(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: &WellId,
    journal: Option<&TheoryJournal>,
) -> Result<WellForecast, WorkflowError> {
    let (kind, program) = active_program(doc);
    let series = doc.data.for_well(well);
    let rng = RngHierarchy::new(config.bootstrap.seed);

    let outcome = check_well(
        &series,
        &program,
        doc.bootstrap_step(well),
        &config.check_config(),
        &rng,
        doc.lifecycle.iteration,
    );

    match outcome {
        Ok(forecast) => {
            doc.lifecycle.record_check(kind, &forecast);
            doc.forecasts.insert(well.clone(), forecast.clone());
            journal_entry(doc, kind, journal)?;
            Ok(forecast)
        }
        Err(e) => {
            apply_failure(doc, kind, well, &e);
            Err(e.into())
        }
    }
}

/// Check every registered well. Only the selected well's result reaches the
/// model status and history; other wells just store or clear their forecast.
pub fn check_all(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    journal: Option<&TheoryJournal>,
) -> Vec<(WellId, Result<WellForecast, EvaluationError>)> {
    let (kind, program) = active_program(doc);
    let wells: Vec<WellId> = doc.wells.iter().map(|w| w.id.clone()).collect();
    let rng = RngHierarchy::new(config.bootstrap.seed);

    let results = check_all_wells(
        &doc.data,
        &wells,
        &program,
        &doc.bootstrap_steps(),
        &config.check_config(),
        &rng,
        doc.lifecycle.iteration,
    );

    let selected = doc.active_well().cloned();
    for (id, outcome) in &results {
        match outcome {
            Ok(forecast) => {
                if selected.as_ref() == Some(id) {
                    doc.lifecycle.record_check(kind, forecast);
                    if let Err(e) = journal_entry(doc, kind, journal) {
                        warn!(error = %e, "failed to append theory journal");
                    }
                }
                doc.forecasts.insert(id.clone(), forecast.clone());
            }
            Err(e) if selected.as_ref() == Some(id) => apply_failure(doc, kind, id, e),
            Err(_) => doc.clear_forecast(id),
        }
    }
    results
}

/// Set the interval blend step for a well; applied on the next check.
pub fn set_bootstrap_step(doc: &mut SessionDocument, well: &WellId, step: usize) {
    doc.forecasts
        .entry(well.clone())
        .and_modify(|f| f.bootstrap_start_step = step)
        .or_insert_with(|| WellForecast::cleared(step));
}

pub fn analyse(
    doc: &SessionDocument,
    config: &GwlabConfig,
    well: &WellId,
) -> Result<StatisticalAnalysis, WorkflowError> {
    let (_, program) = active_program(doc);
    let series = doc.data.for_well(well);
    Ok(statistical_analysis(&series, &program, &config.check_config())?)
}

// ─── Generation ──────────────────────────────────────────────────────

fn split_params(params: ModelParams) -> (ArimaParams, GpKernel) {
    match params {
        ModelParams::Arima(p) => (p, GpKernel::default()),
        ModelParams::GaussianProcess(k) => (ArimaParams::default(), k),
        ModelParams::General => (ArimaParams::default(), GpKernel::default()),
    }
}

/// Assemble the program request for `kind` on `series`.
pub fn program_request(
    doc: &SessionDocument,
    config: &GwlabConfig,
    series: &WellSeries,
    kind: ModelKind,
) -> ProgramRequest {
    let slot = doc.lifecycle.registry.slot(kind);
    let (arima_params, gp_kernel) = split_params(slot.params);
    let total_absolute_error = doc
        .forecasts
        .get(&series.well_id)
        .filter(|f| !f.errors.is_empty())
        .map(|f| f.errors.iter().map(|e| e.error.abs()).sum())
        .unwrap_or(f64::INFINITY);

    ProgramRequest {
        horizon: config.horizon,
        well_id: series.well_id.clone(),
        model: kind,
        recent: RecentRecords::from_series(series, config.leading_period),
        metric: doc.lifecycle.selected_metric,
        total_absolute_error,
        user_hint: doc.user_hint.clone(),
        history: history_digest(&doc.lifecycle.history, doc.prompt_mode),
        current_program: slot.program.clone(),
        arima_params,
        gp_kernel,
    }
}

/// What a successful generation left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOutcome {
    pub iteration: u64,
    pub program: ForecastProgram,
    /// Whether the program's first forecast passed the shape contract.
    pub forecast_valid: bool,
}

/// Ask the assistant for a new `kind` program and install it.
///
/// On an unusable response the well's forecast is cleared and, when hint
/// suggestion is enabled, the assistant is asked to explain the failure; its
/// answer replaces the user hint for the next attempt.
pub fn generate(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    generator: &dyn TextGenerator,
    kind: ModelKind,
    well: &WellId,
) -> Result<GenerateOutcome, WorkflowError> {
    let series = doc.data.for_well(well);
    let request = program_request(doc, config, &series, kind);

    let proposal = match request_program(generator, &request) {
        Ok(p) => p,
        Err(e) => {
            doc.clear_forecast(well);
            if doc.suggest_hints && matches!(e, AssistantError::MalformedResponse(_)) {
                match explain_failure(generator, &e.to_string(), "forecast program generation") {
                    Ok(analysis) => doc.user_hint = suggested_hint(&analysis),
                    Err(hint_err) => warn!(error = %hint_err, "failure analysis unavailable"),
                }
            }
            return Err(e.into());
        }
    };

    let candidate = proposal.into_candidate(kind);
    let program = candidate.program.clone();
    let step = doc.bootstrap_step(well);
    let initial = initial_forecast(&series, &program, config.horizon, step);

    doc.lifecycle.selected_model = kind;
    let forecast_valid = initial.is_ok();
    doc.lifecycle.install_candidate(kind, candidate, forecast_valid);
    match initial {
        Ok(forecast) => {
            doc.forecasts.insert(well.clone(), forecast);
        }
        Err(e) => apply_failure(doc, kind, well, &e),
    }

    Ok(GenerateOutcome {
        iteration: doc.lifecycle.iteration,
        program,
        forecast_valid,
    })
}

/// Restore `kind`'s last-known-good program and select it.
pub fn revert(
    doc: &mut SessionDocument,
    kind: ModelKind,
) -> Result<ForecastProgram, WorkflowError> {
    let program = doc.lifecycle.revert(kind)?.program.clone();
    doc.lifecycle.selected_model = kind;
    Ok(program)
}

pub fn select_best(doc: &mut SessionDocument) -> Result<TheoryEntry, WorkflowError> {
    Ok(doc.lifecycle.select_best()?)
}

// ─── Assistant notes ─────────────────────────────────────────────────

/// Request commentary on the well's residuals and store it on the session.
pub fn comment_on_statistics(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    generator: &dyn TextGenerator,
    well: &WellId,
) -> Result<String, WorkflowError> {
    let analysis = analyse(doc, config, well)?;
    let kind = doc.lifecycle.selected_model;
    let (arima, _) = split_params(doc.lifecycle.registry.slot(kind).params);
    let text = statistical_commentary(generator, &analysis, kind, well, arima)?;
    doc.notes.statistical_analysis = text.clone();
    Ok(text)
}

/// Request recommendations from the well's stored forecast.
pub fn dashboard_notes(
    doc: &mut SessionDocument,
    generator: &dyn TextGenerator,
    well: &WellId,
) -> Result<String, WorkflowError> {
    let forecast = doc
        .forecasts
        .get(well)
        .filter(|f| !f.is_cleared())
        .cloned()
        .ok_or_else(|| EvaluationError::NoData { well: well.clone() })?;
    let text = dashboard_recommendation(generator, well, &forecast)?;
    doc.notes.dashboard_recommendation = text.clone();
    Ok(text)
}

pub fn compliance_report(
    doc: &SessionDocument,
    config: &GwlabConfig,
    well: &WellId,
) -> ComplianceReport {
    ComplianceReport::build(&doc.data.for_well(well), config.compliance)
}

/// Request sustainability insights for the well and store them on the session.
pub fn sustainability_notes(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    generator: &dyn TextGenerator,
    well: &WellId,
) -> Result<String, WorkflowError> {
    let report = compliance_report(doc, config, well);
    let text = sustainability_insights(generator, &report)?;
    doc.notes.sustainability_insights = text.clone();
    Ok(text)
}
