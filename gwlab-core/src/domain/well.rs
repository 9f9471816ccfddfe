use serde::{Deserialize, Serialize};

use super::ids::WellId;

/// A monitored well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub id: WellId,
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Well {
    pub fn new(id: impl Into<WellId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lat: None,
            lon: None,
        }
    }

    /// Well registered on the fly when imported data references an unknown id.
    pub fn placeholder(id: WellId) -> Self {
        let name = format!("Well {id}");
        Self {
            id,
            name,
            lat: None,
            lon: None,
        }
    }

    pub fn with_location(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }
}
