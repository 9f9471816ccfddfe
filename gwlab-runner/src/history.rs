//! Theory history — one entry per (iteration, model) with its check results.
//!
//! The history lives inside the session document. It can also be mirrored to
//! a JSONL journal, one JSON object per line, which survives session resets
//! and is easy to stream into other tools.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use gwlab_core::forecast::ForecastProgram;
use gwlab_core::metrics::{ErrorMetric, MetricSet};
use gwlab_core::stats::ResidualDiagnostics;

use crate::lifecycle::{ModelKind, ModelParams};

/// Snapshot of a checked program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TheoryEntry {
    pub iteration: u64,
    pub model: ModelKind,
    pub program: ForecastProgram,
    pub theory: String,
    pub explanation: String,
    /// Point forecast produced by the check.
    pub forecast: Vec<f64>,
    pub metrics: MetricSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ResidualDiagnostics>,
    pub params: ModelParams,
}

/// Ordered list of theory entries, unique on `(iteration, model)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TheoryHistory {
    entries: Vec<TheoryEntry>,
}

impl TheoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TheoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert, or replace the entry with the same `(iteration, model)`.
    pub fn record(&mut self, entry: TheoryEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.iteration == entry.iteration && e.model == entry.model)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, iteration: u64, model: ModelKind) -> Option<&TheoryEntry> {
        self.entries
            .iter()
            .find(|e| e.iteration == iteration && e.model == model)
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> &[TheoryEntry] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    /// Entry with the smallest finite value of `metric`.
    ///
    /// Infinite and NaN values never win. Ties keep the earliest entry.
    pub fn best(&self, metric: ErrorMetric) -> Option<&TheoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.metrics.get(metric).is_finite())
            .fold(None, |best: Option<&TheoryEntry>, e| match best {
                Some(b) if b.metrics.get(metric) <= e.metrics.get(metric) => Some(b),
                _ => Some(e),
            })
    }
}

// ─── JSONL journal ───────────────────────────────────────────────────

/// Append-only JSONL mirror of theory entries.
pub struct TheoryJournal {
    path: PathBuf,
}

impl TheoryJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &TheoryEntry) -> io::Result<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read every entry. Malformed lines are logged and skipped.
    pub fn read_all(&self) -> io::Result<Vec<TheoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TheoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = line_num + 1, error = %e, "skipping malformed journal line"),
            }
        }

        Ok(entries)
    }
}
