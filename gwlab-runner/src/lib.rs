//! GWLab Runner — prediction checks, model lifecycle, sessions and the assistant.
//!
//! This crate builds on `gwlab-core` to provide:
//! - Trailing-window backtests and full prediction checks with intervals
//! - Per-model program slots with last-known-good rollback
//! - Theory history with best-program selection and a JSONL journal
//! - Session documents with file and in-memory stores
//! - The text-generation client and its request bodies
//! - Sustainability compliance reports
//! - TOML configuration

pub mod assistant;
pub mod backtest;
pub mod compliance;
pub mod config;
pub mod evaluation;
pub mod history;
pub mod lifecycle;
pub mod session;
pub mod workflow;

pub use assistant::{
    AssistantError, HttpTextGenerator, ProgramProposal, ProgramRequest, PromptMode, Route,
    TextGenerator,
};
pub use backtest::{run_backtest, BacktestConfig, BacktestReport, PredictionError, StartOffset};
pub use compliance::{ComplianceReport, ComplianceStatus, ComplianceThresholds};
pub use config::{ConfigError, GwlabConfig};
pub use evaluation::{
    check_all_wells, check_well, initial_forecast, statistical_analysis, CheckConfig,
    EvaluationError, StatisticalAnalysis, WellForecast,
};
pub use history::{TheoryEntry, TheoryHistory, TheoryJournal};
pub use lifecycle::{
    ArimaParams, Candidate, FunctionStatus, GpKernel, LifecycleError, ModelKind, ModelLifecycle,
    ModelParams, ModelRegistry, ModelSlot, ValidState,
};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionDocument, SessionError, SessionStore,
};
pub use workflow::{GenerateOutcome, WorkflowError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn reports_are_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<WellForecast>();
        assert_sync::<WellForecast>();
        assert_send::<StatisticalAnalysis>();
        assert_sync::<StatisticalAnalysis>();
    }

    #[test]
    fn session_types_are_send_sync() {
        assert_send::<SessionDocument>();
        assert_sync::<SessionDocument>();
        assert_send::<FileSessionStore>();
        assert_sync::<MemorySessionStore>();
    }

    #[test]
    fn lifecycle_is_send_sync() {
        assert_send::<ModelLifecycle>();
        assert_sync::<ModelLifecycle>();
        assert_send::<TheoryHistory>();
        assert_sync::<TheoryHistory>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<GwlabConfig>();
        assert_sync::<GwlabConfig>();
        assert_send::<CheckConfig>();
        assert_sync::<CheckConfig>();
    }

    #[test]
    fn http_generator_is_send_sync() {
        assert_send::<HttpTextGenerator>();
        assert_sync::<HttpTextGenerator>();
    }
}
