use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored well (e.g. `WELL_001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WellId(pub String);

impl WellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WellId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WellId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
