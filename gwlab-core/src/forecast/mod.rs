//! Forecasting boundary.
//!
//! A forecaster maps a point-in-time [`HistoricalWindow`] to `horizon`
//! groundwater-level predictions. The trait is the only thing the backtest
//! and evaluation loops know about; [`ForecastProgram`] is the serialisable
//! implementation that the assistant proposes and sessions persist.

pub mod program;

use thiserror::Error;

use crate::data::HistoricalWindow;

pub use program::{BaseModel, Clamp, ExogenousTerm, ForecastProgram};

/// Number of future steps forecast per invocation.
pub const DEFAULT_HORIZON: usize = 7;

/// Errors raised at the forecasting boundary. All are recoverable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("cannot parse forecast program: {0}")]
    Program(String),

    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("forecast must return exactly {expected} values, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("forecast value at step {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("forecast execution failed: {0}")]
    Execution(String),
}

impl ForecastError {
    /// True for violations of the output shape contract.
    pub fn is_shape_violation(&self) -> bool {
        matches!(self, Self::WrongLength { .. } | Self::NonFinite { .. })
    }
}

/// Capability contract for anything that can forecast groundwater levels.
pub trait Forecaster: Send + Sync {
    fn forecast(
        &self,
        window: &HistoricalWindow<'_>,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError>;
}

impl<F> Forecaster for F
where
    F: Fn(&HistoricalWindow<'_>, usize) -> Result<Vec<f64>, ForecastError> + Send + Sync,
{
    fn forecast(
        &self,
        window: &HistoricalWindow<'_>,
        horizon: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        self(window, horizon)
    }
}

/// Enforce the output contract: exactly `horizon` finite values.
pub fn validate_output(values: Vec<f64>, horizon: usize) -> Result<Vec<f64>, ForecastError> {
    if values.len() != horizon {
        return Err(ForecastError::WrongLength {
            expected: horizon,
            actual: values.len(),
        });
    }
    if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ForecastError::NonFinite { index, value });
    }
    Ok(values)
}

/// Run a forecaster and enforce the output contract on its result.
pub fn forecast_checked(
    forecaster: &dyn Forecaster,
    window: &HistoricalWindow<'_>,
    horizon: usize,
) -> Result<Vec<f64>, ForecastError> {
    validate_output(forecaster.forecast(window, horizon)?, horizon)
}
