//! GWLab Core — observations, residual statistics, bootstrap intervals, forecast programs.
//!
//! This crate contains the numeric heart of the groundwater dashboard:
//! - Domain types (wells, the four reading kinds, timestamps)
//! - Dataset merging, per-well series and point-in-time windows
//! - JSON/CSV import with validation
//! - Residual statistics (moments, ACF, histogram, Q-Q)
//! - RMSE/MSE/MAE error metrics
//! - Hybrid bootstrap / factor prediction intervals
//! - The `Forecaster` boundary and declarative forecast programs

pub mod data;
pub mod domain;
pub mod forecast;
pub mod interval;
pub mod metrics;
pub mod rng;
pub mod stats;

pub use data::{HistoricalWindow, ImportBatch, WellDataset, WellSeries};
pub use domain::{Observation, Well, WellId};
pub use forecast::{ForecastError, ForecastProgram, Forecaster, DEFAULT_HORIZON};
pub use interval::{BootstrapConfig, IntervalBound};
pub use metrics::{ErrorMetric, MetricSet};
pub use rng::RngHierarchy;
pub use stats::ResidualDiagnostics;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything that crosses a rayon boundary is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<WellDataset>();
        require_sync::<WellDataset>();
        require_send::<WellSeries>();
        require_sync::<WellSeries>();
        require_send::<HistoricalWindow<'static>>();
        require_sync::<HistoricalWindow<'static>>();
        require_send::<ForecastProgram>();
        require_sync::<ForecastProgram>();
        require_send::<Box<dyn Forecaster>>();
        require_sync::<Box<dyn Forecaster>>();
        require_send::<BootstrapConfig>();
        require_sync::<BootstrapConfig>();
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
        require_send::<MetricSet>();
        require_sync::<MetricSet>();
        require_send::<ResidualDiagnostics>();
        require_sync::<ResidualDiagnostics>();
    }

    /// Architecture contract: forecasters only ever see a truncated window.
    #[test]
    fn forecaster_trait_takes_window_not_dataset() {
        fn _check_trait_object_builds(
            f: &dyn Forecaster,
            window: &HistoricalWindow<'_>,
        ) -> Result<Vec<f64>, ForecastError> {
            f.forecast(window, DEFAULT_HORIZON)
        }
    }
}
