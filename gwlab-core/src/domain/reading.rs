//! Timestamped readings — the four observation series recorded per well.
//!
//! Every reading is keyed by `(well_id, timestamp)`. Only the groundwater level
//! is mandatory; the remaining sensor channels are optional because field
//! stations often report a subset of them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ids::WellId;

/// Common surface over the four reading kinds.
pub trait Observation: Clone + Send + Sync {
    fn well_id(&self) -> &WellId;
    fn timestamp(&self) -> NaiveDateTime;

    /// Overlay the fields carried by `newer` onto `self`.
    ///
    /// Used when an import supplies a record whose key already exists: fields
    /// present in the new record win, absent ones keep the stored value.
    fn absorb(&mut self, newer: Self);

    /// Name of the first numeric field holding NaN or an infinity, if any.
    fn non_finite_field(&self) -> Option<&'static str>;
}

fn first_non_finite(fields: &[(&'static str, Option<f64>)]) -> Option<&'static str> {
    fields
        .iter()
        .find(|(_, v)| v.is_some_and(|x| !x.is_finite()))
        .map(|(name, _)| *name)
}

fn overlay(slot: &mut Option<f64>, newer: Option<f64>) {
    if newer.is_some() {
        *slot = newer;
    }
}

/// Groundwater level (metres below ground surface) and electrical conductivity (µS/cm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundwaterReading {
    pub well_id: WellId,
    #[serde(with = "crate::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    pub gwl: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec: Option<f64>,
}

/// pH, dissolved oxygen (mg/L) and turbidity (NTU).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterQualityReading {
    pub well_id: WellId,
    #[serde(with = "crate::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(rename = "do", default, skip_serializing_if = "Option::is_none")]
    pub dissolved_oxygen: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<f64>,
}

/// Precipitation (mm) and air temperature (°C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReading {
    pub well_id: WellId,
    #[serde(with = "crate::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Pumping and consumption volumes (m³/day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReading {
    pub well_id: WellId,
    #[serde(with = "crate::domain::timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pumping: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption: Option<f64>,
}

impl Observation for GroundwaterReading {
    fn well_id(&self) -> &WellId {
        &self.well_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn absorb(&mut self, newer: Self) {
        self.gwl = newer.gwl;
        overlay(&mut self.ec, newer.ec);
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        first_non_finite(&[("gwl", Some(self.gwl)), ("ec", self.ec)])
    }
}

impl Observation for WaterQualityReading {
    fn well_id(&self) -> &WellId {
        &self.well_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn absorb(&mut self, newer: Self) {
        overlay(&mut self.ph, newer.ph);
        overlay(&mut self.dissolved_oxygen, newer.dissolved_oxygen);
        overlay(&mut self.turbidity, newer.turbidity);
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        first_non_finite(&[
            ("ph", self.ph),
            ("do", self.dissolved_oxygen),
            ("turbidity", self.turbidity),
        ])
    }
}

impl Observation for WeatherReading {
    fn well_id(&self) -> &WellId {
        &self.well_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn absorb(&mut self, newer: Self) {
        overlay(&mut self.precipitation, newer.precipitation);
        overlay(&mut self.temperature, newer.temperature);
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        first_non_finite(&[
            ("precipitation", self.precipitation),
            ("temperature", self.temperature),
        ])
    }
}

impl Observation for UsageReading {
    fn well_id(&self) -> &WellId {
        &self.well_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn absorb(&mut self, newer: Self) {
        overlay(&mut self.pumping, newer.pumping);
        overlay(&mut self.consumption, newer.consumption);
    }

    fn non_finite_field(&self) -> Option<&'static str> {
        first_non_finite(&[("pumping", self.pumping), ("consumption", self.consumption)])
    }
}
