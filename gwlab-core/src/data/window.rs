//! Point-in-time view over a well's four series.
//!
//! A `HistoricalWindow` is what a forecaster sees: borrowed slices truncated to
//! a moment in time, so no future observation can leak into a prediction.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{
    GroundwaterReading, Observation, UsageReading, WaterQualityReading, WeatherReading,
};

/// Four parallel, timestamp-sorted slices.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalWindow<'a> {
    pub groundwater: &'a [GroundwaterReading],
    pub water_quality: &'a [WaterQualityReading],
    pub weather: &'a [WeatherReading],
    pub usage: &'a [UsageReading],
}

fn strictly_before<T: Observation>(records: &[T], ts: NaiveDateTime) -> &[T] {
    let end = records.partition_point(|r| r.timestamp() < ts);
    &records[..end]
}

impl<'a> HistoricalWindow<'a> {
    /// Narrow every slice to records strictly before `ts`.
    pub fn before(&self, ts: NaiveDateTime) -> HistoricalWindow<'a> {
        HistoricalWindow {
            groundwater: strictly_before(self.groundwater, ts),
            water_quality: strictly_before(self.water_quality, ts),
            weather: strictly_before(self.weather, ts),
            usage: strictly_before(self.usage, ts),
        }
    }

    pub fn gwl_values(&self) -> Vec<f64> {
        self.groundwater.iter().map(|r| r.gwl).collect()
    }

    pub fn last_gwl(&self) -> Option<f64> {
        self.groundwater.last().map(|r| r.gwl)
    }

    /// Values of an auxiliary channel, oldest first, skipping missing readings.
    pub fn feature_values(&self, feature: Feature) -> Vec<f64> {
        match feature {
            Feature::Ec => self.groundwater.iter().filter_map(|r| r.ec).collect(),
            Feature::Ph => self.water_quality.iter().filter_map(|r| r.ph).collect(),
            Feature::DissolvedOxygen => self
                .water_quality
                .iter()
                .filter_map(|r| r.dissolved_oxygen)
                .collect(),
            Feature::Turbidity => self.water_quality.iter().filter_map(|r| r.turbidity).collect(),
            Feature::Precipitation => self.weather.iter().filter_map(|r| r.precipitation).collect(),
            Feature::Temperature => self.weather.iter().filter_map(|r| r.temperature).collect(),
            Feature::Pumping => self.usage.iter().filter_map(|r| r.pumping).collect(),
            Feature::Consumption => self.usage.iter().filter_map(|r| r.consumption).collect(),
        }
    }
}

/// Auxiliary channel a forecast program may regress on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Ec,
    Ph,
    DissolvedOxygen,
    Turbidity,
    Precipitation,
    Temperature,
    Pumping,
    Consumption,
}
