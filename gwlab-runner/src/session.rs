//! Session document — everything a user's workspace needs to resume.
//!
//! The document is plain camelCase JSON. Every field has a default so older
//! or partial documents still load; unknown fields are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use gwlab_core::data::WellDataset;
use gwlab_core::domain::{Well, WellId};

use crate::assistant::PromptMode;
use crate::evaluation::WellForecast;
use crate::lifecycle::ModelLifecycle;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Free-text output of the assistant kept alongside the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantNotes {
    #[serde(default)]
    pub statistical_analysis: String,
    #[serde(default)]
    pub dashboard_recommendation: String,
    #[serde(default)]
    pub sustainability_insights: String,
}

/// Persisted workspace state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub wells: Vec<Well>,
    #[serde(default)]
    pub data: WellDataset,
    #[serde(default)]
    pub selected_well_id: Option<WellId>,
    #[serde(default)]
    pub lifecycle: ModelLifecycle,
    #[serde(default)]
    pub forecasts: BTreeMap<WellId, WellForecast>,
    #[serde(default)]
    pub prompt_mode: PromptMode,
    #[serde(default)]
    pub user_hint: String,
    #[serde(default)]
    pub suggest_hints: bool,
    #[serde(default)]
    pub notes: AssistantNotes,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for SessionDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            wells: Vec::new(),
            data: WellDataset::default(),
            selected_well_id: None,
            lifecycle: ModelLifecycle::default(),
            forecasts: BTreeMap::new(),
            prompt_mode: PromptMode::default(),
            user_hint: String::new(),
            suggest_hints: false,
            notes: AssistantNotes::default(),
            saved_at: None,
        }
    }
}

impl SessionDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly selected well, falling back to the first registered one.
    pub fn active_well(&self) -> Option<&WellId> {
        self.selected_well_id
            .as_ref()
            .or_else(|| self.wells.first().map(|w| &w.id))
    }

    pub fn well(&self, id: &WellId) -> Option<&Well> {
        self.wells.iter().find(|w| &w.id == id)
    }

    /// Bootstrap start step per well, taken from the stored forecasts.
    pub fn bootstrap_steps(&self) -> BTreeMap<WellId, usize> {
        self.forecasts
            .iter()
            .map(|(id, f)| (id.clone(), f.bootstrap_start_step))
            .collect()
    }

    pub fn bootstrap_step(&self, id: &WellId) -> usize {
        self.forecasts
            .get(id)
            .map(|f| f.bootstrap_start_step)
            .unwrap_or(0)
    }

    /// Replace a well's forecast with an empty one, keeping its step setting.
    pub fn clear_forecast(&mut self, id: &WellId) {
        let step = self.bootstrap_step(id);
        self.forecasts.insert(id.clone(), WellForecast::cleared(step));
    }

    pub fn to_json_pretty(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let doc: Self = serde_json::from_str(json)?;
        if doc.schema_version > SCHEMA_VERSION {
            return Err(SessionError::UnsupportedVersion {
                found: doc.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(doc)
    }
}

// ─── Stores ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("session JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Somewhere a session document can be loaded from and saved to.
pub trait SessionStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<SessionDocument>, SessionError>;

    /// Persist `doc`, stamping `saved_at`.
    fn save(&self, doc: &mut SessionDocument) -> Result<(), SessionError>;
}

/// Pretty-printed JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionDocument>, SessionError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved session");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        SessionDocument::from_json(&json).map(Some)
    }

    fn save(&self, doc: &mut SessionDocument) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        doc.saved_at = Some(Utc::now());
        fs::write(&self.path, doc.to_json_pretty()?)?;
        info!(path = %self.path.display(), wells = doc.wells.len(), "session saved");
        Ok(())
    }
}

/// In-process store holding the serialized document; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    json: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionDocument>, SessionError> {
        let guard = self.json.lock().unwrap_or_else(|p| p.into_inner());
        guard.as_deref().map(SessionDocument::from_json).transpose()
    }

    fn save(&self, doc: &mut SessionDocument) -> Result<(), SessionError> {
        doc.saved_at = Some(Utc::now());
        let json = doc.to_json_pretty()?;
        *self.json.lock().unwrap_or_else(|p| p.into_inner()) = Some(json);
        Ok(())
    }
}
