//! GWLab CLI — groundwater forecasting workbench.
//!
//! Commands:
//! - `import`: merge a JSON or CSV file of observations into the session
//! - `check`: backtest, score and forecast with the selected model's program
//! - `stats`: full-history residual analysis, optionally with commentary
//! - `generate`: ask the assistant for a new program and install it
//! - `revert`: restore a model's last-known-good program
//! - `best`: load the best program from the theory history
//! - `history`: list recorded theories
//! - `compliance`: sustainability compliance report
//! - `dashboard`: assistant recommendations for the current forecast
//! - `session`: inspect or adjust the session document

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use gwlab_core::data::{parse_csv, parse_json, ImportKind};
use gwlab_core::domain::WellId;
use gwlab_core::metrics::ErrorMetric;
use gwlab_runner::compliance::status_label;
use gwlab_runner::config::DEFAULT_CONFIG_PATH;
use gwlab_runner::history::TheoryJournal;
use gwlab_runner::lifecycle::{FunctionStatus, ModelKind};
use gwlab_runner::workflow;
use gwlab_runner::{
    FileSessionStore, GwlabConfig, HttpTextGenerator, PromptMode, SessionDocument, SessionStore,
    WellForecast,
};

#[derive(Parser)]
#[command(name = "gwlab", about = "GWLab: groundwater level forecasting workbench")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Session file; overrides `storage.session_path` from the config.
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge observations from a JSON array or CSV file.
    Import {
        /// groundwater, waterQuality, weather or usage.
        kind: String,

        file: PathBuf,

        /// Parse as CSV (implied by a .csv extension).
        #[arg(long, default_value_t = false)]
        csv: bool,
    },
    /// Run the prediction check with the selected model's program.
    Check {
        #[arg(long)]
        well: Option<String>,

        /// Step at which intervals switch from bootstrap to widening factor.
        #[arg(long)]
        step: Option<usize>,

        /// Check every registered well.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Backtest the whole history and describe the residuals.
    Stats {
        #[arg(long)]
        well: Option<String>,

        /// Also ask the assistant for commentary.
        #[arg(long, default_value_t = false)]
        commentary: bool,
    },
    /// Ask the assistant for a new forecast program.
    Generate {
        #[arg(long)]
        well: Option<String>,

        /// general, arima or gaussian_process. Defaults to the selected model.
        #[arg(long)]
        model: Option<String>,

        /// Hint passed to the assistant; stored on the session.
        #[arg(long)]
        hint: Option<String>,
    },
    /// Restore the last-known-good program of a model.
    Revert {
        #[arg(long)]
        model: Option<String>,
    },
    /// Load the history entry with the best metric.
    Best {
        /// rmse, mse or mae. Defaults to the session's metric.
        #[arg(long)]
        metric: Option<String>,
    },
    /// List recorded theories.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Sustainability compliance report.
    Compliance {
        #[arg(long)]
        well: Option<String>,

        /// Write the Markdown report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also ask the assistant for sustainability insights.
        #[arg(long, default_value_t = false)]
        insights: bool,
    },
    /// Ask the assistant for recommendations on the current forecast.
    Dashboard {
        #[arg(long)]
        well: Option<String>,
    },
    /// Inspect or adjust the session document.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Summarise the session.
    Show,
    /// Select the active well.
    Select { well: String },
    /// Set how much history goes into program requests: low, mid or high.
    PromptMode { mode: String },
    /// Turn automatic hint suggestion on or off.
    SuggestHints {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "gwlab=info".into()))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = GwlabConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let session_path = cli
        .session
        .clone()
        .unwrap_or_else(|| config.storage.session_path.clone());
    let store = FileSessionStore::new(session_path);
    let mut doc = store.load()?.unwrap_or_default();

    let dirty = match cli.command {
        Commands::Import { kind, file, csv } => run_import(&mut doc, &kind, &file, csv)?,
        Commands::Check { well, step, all } => run_check(&mut doc, &config, well, step, all)?,
        Commands::Stats { well, commentary } => run_stats(&mut doc, &config, well, commentary)?,
        Commands::Generate { well, model, hint } => {
            run_generate(&mut doc, &config, well, model, hint)?
        }
        Commands::Revert { model } => run_revert(&mut doc, model)?,
        Commands::Best { metric } => run_best(&mut doc, metric)?,
        Commands::History { limit } => {
            print_history(&doc, limit);
            false
        }
        Commands::Compliance {
            well,
            output,
            insights,
        } => run_compliance(&mut doc, &config, well, output, insights)?,
        Commands::Dashboard { well } => run_dashboard(&mut doc, &config, well)?,
        Commands::Session { action } => run_session(&mut doc, action)?,
    };

    if dirty {
        store.save(&mut doc)?;
        info!(path = %store.path().display(), "session updated");
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn well_arg(doc: &SessionDocument, well: Option<String>) -> Result<WellId> {
    let requested = well.map(WellId::from);
    Ok(workflow::resolve_well(doc, requested.as_ref())?)
}

fn model_arg(doc: &SessionDocument, model: Option<String>) -> Result<ModelKind> {
    match model {
        Some(m) => m.parse().map_err(anyhow::Error::msg),
        None => Ok(doc.lifecycle.selected_model),
    }
}

fn assistant(config: &GwlabConfig) -> Result<HttpTextGenerator> {
    if config.assistant.base_url.is_empty() {
        bail!("assistant.base_url is not set in the config");
    }
    let key = config.assistant.client_key()?;
    Ok(HttpTextGenerator::new(
        config.assistant.base_url.clone(),
        key,
        config.assistant.timeout(),
    )?)
}

fn fmt_bound(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.3}")).unwrap_or_else(|| "-".into())
}

fn print_forecast(well: &WellId, forecast: &WellForecast) {
    println!("Well {well}");
    if forecast.is_cleared() {
        println!("  (no forecast)");
        return;
    }
    println!("  {:<12} {:>10} {:>10} {:>10}", "date", "forecast", "lower", "upper");
    for (i, value) in forecast.predictions.iter().enumerate() {
        let date = forecast
            .dates
            .get(i)
            .map(|d| d.to_string())
            .unwrap_or_default();
        let bound = forecast.intervals.get(i).copied().unwrap_or_default();
        println!(
            "  {:<12} {:>10.3} {:>10} {:>10}",
            date,
            value,
            fmt_bound(bound.lower),
            fmt_bound(bound.upper)
        );
    }
    let m = &forecast.metrics;
    if m.rmse.is_finite() {
        println!("  RMSE {:.4}  MSE {:.4}  MAE {:.4}", m.rmse, m.mse, m.mae);
    }
    if let Some(d) = &forecast.diagnostics {
        println!("  residuals: {}", d.summary());
    }
}

// ─── Commands ────────────────────────────────────────────────────────

fn run_import(doc: &mut SessionDocument, kind: &str, file: &Path, csv: bool) -> Result<bool> {
    let kind: ImportKind = kind.parse()?;
    let is_csv = csv
        || file
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let batch = if is_csv {
        let reader = File::open(file).with_context(|| format!("opening {}", file.display()))?;
        parse_csv(kind, reader)?
    } else {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        parse_json(kind, &text)?
    };

    let summary = workflow::import_batch(doc, kind, batch);
    println!(
        "Imported {} {} records ({} new), {} new wells",
        summary.records,
        summary.kind,
        summary.inserted,
        summary.new_wells.len()
    );
    Ok(true)
}

fn run_check(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: Option<String>,
    step: Option<usize>,
    all: bool,
) -> Result<bool> {
    let journal = TheoryJournal::new(&config.storage.journal_path);

    if all {
        if let Some(step) = step {
            let ids: Vec<WellId> = doc.wells.iter().map(|w| w.id.clone()).collect();
            for id in &ids {
                workflow::set_bootstrap_step(doc, id, step);
            }
        }
        for (id, outcome) in workflow::check_all(doc, config, Some(&journal)) {
            match outcome {
                Ok(forecast) => print_forecast(&id, &forecast),
                Err(e) => println!("Well {id}: {e}"),
            }
        }
        return Ok(true);
    }

    let id = well_arg(doc, well)?;
    if let Some(step) = step {
        workflow::set_bootstrap_step(doc, &id, step);
    }
    match workflow::check(doc, config, &id, Some(&journal)) {
        Ok(forecast) => print_forecast(&id, &forecast),
        // failure state is saved with the session
        Err(e) => println!("Check failed: {e}"),
    }
    Ok(true)
}

fn run_stats(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: Option<String>,
    commentary: bool,
) -> Result<bool> {
    let id = well_arg(doc, well)?;
    let analysis = workflow::analyse(doc, config, &id)?;
    let r = &analysis.residuals;

    println!("Well {id}: {} residuals", r.sample_size);
    println!(
        "  mean {:.4}  sd {:.4}  skew {:.4}  kurtosis {:.4}",
        r.mean, r.std_dev, r.skewness, r.kurtosis
    );
    println!("  {}", r.summary());
    println!("  lag   acf     band");
    for p in &r.acf {
        println!("  {:>3} {:>7.3} ±{:.3}", p.lag, p.value, p.ci_upper);
    }
    println!("  histogram");
    for bin in &analysis.histogram {
        println!("  {:>20} {}", bin.label, "#".repeat(bin.count));
    }

    if !commentary {
        return Ok(false);
    }
    let generator = assistant(config)?;
    let text = workflow::comment_on_statistics(doc, config, &generator, &id)?;
    println!("\n{text}");
    Ok(true)
}

fn run_generate(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: Option<String>,
    model: Option<String>,
    hint: Option<String>,
) -> Result<bool> {
    let id = well_arg(doc, well)?;
    let kind = model_arg(doc, model)?;
    if let Some(hint) = hint {
        doc.user_hint = hint;
    }
    let generator = assistant(config)?;

    match workflow::generate(doc, config, &generator, kind, &id) {
        Ok(outcome) => {
            println!("Iteration {}: {} program {}", outcome.iteration, kind, outcome.program);
            let slot = doc.lifecycle.registry.slot(kind);
            if !slot.theory.is_empty() {
                println!("Theory: {}", slot.theory);
            }
            if outcome.forecast_valid {
                if let Some(f) = doc.forecasts.get(&id) {
                    print_forecast(&id, f);
                }
                println!("Run `gwlab check` to score it.");
            } else if let FunctionStatus::Error { message } = &slot.status {
                println!("Program installed but its forecast is invalid: {message}");
                println!("Run `gwlab revert --model {kind}` to restore the last working program.");
            }
        }
        Err(e) => {
            println!("Generation failed: {e}");
            if doc.suggest_hints && !doc.user_hint.is_empty() {
                println!("Hint for next attempt: {}", doc.user_hint);
            }
        }
    }
    Ok(true)
}

fn run_revert(doc: &mut SessionDocument, model: Option<String>) -> Result<bool> {
    let kind = model_arg(doc, model)?;
    let program = workflow::revert(doc, kind)?;
    println!("Reverted {kind} to {program}; run `gwlab check` to re-score it.");
    Ok(true)
}

fn run_best(doc: &mut SessionDocument, metric: Option<String>) -> Result<bool> {
    if let Some(m) = metric {
        doc.lifecycle.selected_metric = m.parse::<ErrorMetric>().map_err(anyhow::Error::msg)?;
    }
    let best = workflow::select_best(doc)?;
    let metric = doc.lifecycle.selected_metric;
    println!(
        "Selected iteration {} ({}) with {} = {:.4}",
        best.iteration,
        best.model,
        metric,
        best.metrics.get(metric)
    );
    println!("Program: {}", best.program);
    Ok(true)
}

fn print_history(doc: &SessionDocument, limit: usize) {
    let history = doc.lifecycle.history.recent(limit);
    if history.is_empty() {
        println!("No theories recorded yet.");
        return;
    }
    for e in history {
        let first_line = e.theory.lines().next().unwrap_or("");
        println!(
            "#{:<4} {:<16} RMSE {:>8.4}  {}  {}",
            e.iteration, e.model.as_str(), e.metrics.rmse, e.program, first_line
        );
    }
}

fn run_compliance(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: Option<String>,
    output: Option<PathBuf>,
    insights: bool,
) -> Result<bool> {
    let id = well_arg(doc, well)?;
    let report = workflow::compliance_report(doc, config, &id);
    if !report.is_assessable() {
        bail!("not enough data for a compliance report on well {id}");
    }

    let markdown = report.to_markdown(chrono::Local::now().date_naive());
    match output {
        Some(path) => {
            std::fs::write(&path, &markdown)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "GWL {}, EC {}, pH {}; report written to {}",
                status_label(report.gwl),
                status_label(report.ec),
                status_label(report.ph),
                path.display()
            );
        }
        None => print!("{markdown}"),
    }

    if !insights {
        return Ok(false);
    }
    let generator = assistant(config)?;
    let text = workflow::sustainability_notes(doc, config, &generator, &id)?;
    println!("\n{text}");
    Ok(true)
}

fn run_dashboard(
    doc: &mut SessionDocument,
    config: &GwlabConfig,
    well: Option<String>,
) -> Result<bool> {
    let id = well_arg(doc, well)?;
    let generator = assistant(config)?;
    let text = workflow::dashboard_notes(doc, &generator, &id)?;
    println!("{text}");
    Ok(true)
}

fn run_session(doc: &mut SessionDocument, action: SessionAction) -> Result<bool> {
    match action {
        SessionAction::Show => {
            println!("Wells: {}", doc.wells.len());
            for w in &doc.wells {
                let marker = if doc.active_well() == Some(&w.id) { "*" } else { " " };
                let series = doc.data.for_well(&w.id);
                let readings = series.groundwater.len();
                println!(" {marker} {} ({}) {readings} GWL readings", w.id, w.name);
            }
            let lc = &doc.lifecycle;
            println!("Iteration: {}", lc.iteration);
            println!("Selected model: {}  metric: {}", lc.selected_model, lc.selected_metric);
            for kind in ModelKind::ALL {
                let slot = lc.registry.slot(kind);
                let status = match &slot.status {
                    FunctionStatus::Unchecked => "unchecked".to_string(),
                    FunctionStatus::Checked => "checked".to_string(),
                    FunctionStatus::Error { message } => format!("error: {message}"),
                };
                println!("  {:<16} {}  [{status}]", kind.as_str(), slot.program);
            }
            println!("Theories: {}", lc.history.len());
            if !doc.user_hint.is_empty() {
                println!("Hint: {}", doc.user_hint);
            }
            if let Some(at) = doc.saved_at {
                println!("Saved: {at}");
            }
            Ok(false)
        }
        SessionAction::Select { well } => {
            let id = well_arg(doc, Some(well))?;
            println!("Selected well {id}");
            doc.selected_well_id = Some(id);
            Ok(true)
        }
        SessionAction::PromptMode { mode } => {
            doc.prompt_mode = mode.parse::<PromptMode>().map_err(anyhow::Error::msg)?;
            Ok(true)
        }
        SessionAction::SuggestHints { enabled } => {
            doc.suggest_hints = enabled;
            Ok(true)
        }
    }
}
