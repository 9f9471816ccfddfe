//! Well dataset — the four observation collections and their merge rules.
//!
//! Collections are kept sorted ascending by timestamp. Merging is an upsert on
//! `(well_id, timestamp)`: an incoming record overlays the stored one with the
//! same key, new keys are appended, then the collection is re-sorted.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::window::HistoricalWindow;
use crate::domain::{
    GroundwaterReading, Observation, UsageReading, WaterQualityReading, WeatherReading, WellId,
};

/// Upsert `incoming` into `existing` keyed by `(well_id, timestamp)`.
///
/// Returns the number of records that were new keys. The sort is stable, so
/// records sharing a timestamp across wells keep their relative order.
pub fn merge_observations<T: Observation>(existing: &mut Vec<T>, incoming: Vec<T>) -> usize {
    let mut index: HashMap<(WellId, NaiveDateTime), usize> = existing
        .iter()
        .enumerate()
        .map(|(i, r)| ((r.well_id().clone(), r.timestamp()), i))
        .collect();

    let mut inserted = 0;
    for record in incoming {
        let key = (record.well_id().clone(), record.timestamp());
        match index.get(&key) {
            Some(&i) => existing[i].absorb(record),
            None => {
                index.insert(key, existing.len());
                existing.push(record);
                inserted += 1;
            }
        }
    }

    existing.sort_by_key(|r| r.timestamp());
    inserted
}

fn for_well<T: Observation>(records: &[T], id: &WellId) -> Vec<T> {
    records.iter().filter(|r| r.well_id() == id).cloned().collect()
}

/// A parsed batch of one observation kind, ready to merge.
#[derive(Debug, Clone)]
pub enum ImportBatch {
    Groundwater(Vec<GroundwaterReading>),
    WaterQuality(Vec<WaterQualityReading>),
    Weather(Vec<WeatherReading>),
    Usage(Vec<UsageReading>),
}

impl ImportBatch {
    pub fn len(&self) -> usize {
        match self {
            Self::Groundwater(v) => v.len(),
            Self::WaterQuality(v) => v.len(),
            Self::Weather(v) => v.len(),
            Self::Usage(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct well ids referenced by the batch.
    pub fn well_ids(&self) -> BTreeSet<WellId> {
        fn ids<T: Observation>(v: &[T]) -> BTreeSet<WellId> {
            v.iter().map(|r| r.well_id().clone()).collect()
        }
        match self {
            Self::Groundwater(v) => ids(v),
            Self::WaterQuality(v) => ids(v),
            Self::Weather(v) => ids(v),
            Self::Usage(v) => ids(v),
        }
    }
}

/// All observations of a session, across wells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellDataset {
    #[serde(default, rename = "groundwaterData")]
    pub groundwater: Vec<GroundwaterReading>,
    #[serde(default, rename = "waterQualityData")]
    pub water_quality: Vec<WaterQualityReading>,
    #[serde(default, rename = "weatherForecast")]
    pub weather: Vec<WeatherReading>,
    #[serde(default, rename = "waterUsage")]
    pub usage: Vec<UsageReading>,
}

impl WellDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch into the matching collection. Returns the count of new keys.
    pub fn merge(&mut self, batch: ImportBatch) -> usize {
        match batch {
            ImportBatch::Groundwater(v) => merge_observations(&mut self.groundwater, v),
            ImportBatch::WaterQuality(v) => merge_observations(&mut self.water_quality, v),
            ImportBatch::Weather(v) => merge_observations(&mut self.weather, v),
            ImportBatch::Usage(v) => merge_observations(&mut self.usage, v),
        }
    }

    /// Every well id that appears in any collection.
    pub fn well_ids(&self) -> BTreeSet<WellId> {
        let mut ids = BTreeSet::new();
        ids.extend(self.groundwater.iter().map(|r| r.well_id.clone()));
        ids.extend(self.water_quality.iter().map(|r| r.well_id.clone()));
        ids.extend(self.weather.iter().map(|r| r.well_id.clone()));
        ids.extend(self.usage.iter().map(|r| r.well_id.clone()));
        ids
    }

    /// Owned, sorted series for a single well.
    pub fn for_well(&self, id: &WellId) -> WellSeries {
        WellSeries {
            well_id: id.clone(),
            groundwater: for_well(&self.groundwater, id),
            water_quality: for_well(&self.water_quality, id),
            weather: for_well(&self.weather, id),
            usage: for_well(&self.usage, id),
        }
    }
}

/// The four series of one well, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct WellSeries {
    pub well_id: WellId,
    pub groundwater: Vec<GroundwaterReading>,
    pub water_quality: Vec<WaterQualityReading>,
    pub weather: Vec<WeatherReading>,
    pub usage: Vec<UsageReading>,
}

impl WellSeries {
    pub fn empty(well_id: WellId) -> Self {
        Self {
            well_id,
            groundwater: Vec::new(),
            water_quality: Vec::new(),
            weather: Vec::new(),
            usage: Vec::new(),
        }
    }

    /// Window over every record.
    pub fn full_window(&self) -> HistoricalWindow<'_> {
        HistoricalWindow {
            groundwater: &self.groundwater,
            water_quality: &self.water_quality,
            weather: &self.weather,
            usage: &self.usage,
        }
    }

    /// Window containing only records strictly before `ts`.
    pub fn window_before(&self, ts: NaiveDateTime) -> HistoricalWindow<'_> {
        self.full_window().before(ts)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.groundwater.last().map(|r| r.timestamp)
    }

    pub fn gwl_values(&self) -> Vec<f64> {
        self.groundwater.iter().map(|r| r.gwl).collect()
    }
}
