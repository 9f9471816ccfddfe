//! Observation import — JSON arrays and CSV files, validated before merging.
//!
//! A JSON payload must be a non-empty array in which every record carries a
//! `wellId`, a parseable `timestamp` and only finite numeric values; any
//! violation rejects the whole payload. CSV files use the same column names
//! as the JSON keys.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::dataset::ImportBatch;
use crate::domain::{parse_timestamp, Observation, Well, WellId};

/// Which collection an import targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    Groundwater,
    WaterQuality,
    Weather,
    Usage,
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Groundwater => "groundwater",
            Self::WaterQuality => "waterQuality",
            Self::Weather => "weather",
            Self::Usage => "usage",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ImportKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(&['-', '_'][..], "").as_str() {
            "groundwater" | "gwl" => Ok(Self::Groundwater),
            "waterquality" | "quality" => Ok(Self::WaterQuality),
            "weather" => Ok(Self::Weather),
            "usage" | "waterusage" => Ok(Self::Usage),
            _ => Err(ImportError::UnknownKind(s.to_string())),
        }
    }
}

/// Structured import failures.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown import kind '{0}' (expected groundwater, waterQuality, weather or usage)")]
    UnknownKind(String),

    #[error("payload must be a JSON array")]
    NotAnArray,

    #[error("payload contains no records")]
    Empty,

    #[error("record {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
}

/// Outcome of applying an import to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub records: usize,
    pub inserted: usize,
    pub new_wells: Vec<WellId>,
}

fn check_key_fields(index: usize, record: &Value) -> Result<(), ImportError> {
    let invalid = |reason: &str| ImportError::InvalidRecord {
        index,
        reason: reason.to_string(),
    };

    let obj = record.as_object().ok_or_else(|| invalid("not an object"))?;

    match obj.get("wellId").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        _ => return Err(invalid("missing wellId")),
    }

    let ts = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing timestamp"))?;
    if parse_timestamp(ts).is_none() {
        return Err(invalid(&format!("invalid timestamp '{ts}'")));
    }

    Ok(())
}

fn check_finite<T: Observation>(index: usize, record: &T) -> Result<(), ImportError> {
    match record.non_finite_field() {
        Some(field) => Err(ImportError::InvalidRecord {
            index,
            reason: format!("non-finite {field}"),
        }),
        None => Ok(()),
    }
}

fn decode_records<T>(records: Vec<Value>) -> Result<Vec<T>, ImportError>
where
    T: DeserializeOwned + Observation,
{
    records
        .into_iter()
        .enumerate()
        .map(|(index, v)| {
            let record: T = serde_json::from_value(v).map_err(|e| ImportError::InvalidRecord {
                index,
                reason: e.to_string(),
            })?;
            check_finite(index, &record)?;
            Ok(record)
        })
        .collect()
}

/// Parse and validate a JSON import payload.
pub fn parse_json(kind: ImportKind, payload: &str) -> Result<ImportBatch, ImportError> {
    let value: Value = serde_json::from_str(payload)?;
    let records = match value {
        Value::Array(items) => items,
        _ => return Err(ImportError::NotAnArray),
    };
    if records.is_empty() {
        return Err(ImportError::Empty);
    }
    for (i, record) in records.iter().enumerate() {
        check_key_fields(i, record)?;
    }

    Ok(match kind {
        ImportKind::Groundwater => ImportBatch::Groundwater(decode_records(records)?),
        ImportKind::WaterQuality => ImportBatch::WaterQuality(decode_records(records)?),
        ImportKind::Weather => ImportBatch::Weather(decode_records(records)?),
        ImportKind::Usage => ImportBatch::Usage(decode_records(records)?),
    })
}

fn read_csv_rows<T, R>(reader: R) -> Result<Vec<T>, ImportError>
where
    T: DeserializeOwned + Observation,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (index, row) in rdr.deserialize().enumerate() {
        let row: T = row.map_err(|e| ImportError::InvalidRecord {
            index,
            reason: e.to_string(),
        })?;
        check_finite(index, &row)?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(rows)
}

/// Parse a CSV file whose header row names the record fields.
pub fn parse_csv<R: Read>(kind: ImportKind, reader: R) -> Result<ImportBatch, ImportError> {
    let batch = match kind {
        ImportKind::Groundwater => ImportBatch::Groundwater(read_csv_rows(reader)?),
        ImportKind::WaterQuality => ImportBatch::WaterQuality(read_csv_rows(reader)?),
        ImportKind::Weather => ImportBatch::Weather(read_csv_rows(reader)?),
        ImportKind::Usage => ImportBatch::Usage(read_csv_rows(reader)?),
    };
    if batch.well_ids().iter().any(|id| id.as_str().is_empty()) {
        return Err(ImportError::InvalidRecord {
            index: 0,
            reason: "missing wellId".into(),
        });
    }
    Ok(batch)
}

/// Register a placeholder well for every id not yet known. Returns the new ids.
pub fn register_new_wells(wells: &mut Vec<Well>, ids: &BTreeSet<WellId>) -> Vec<WellId> {
    let known: BTreeSet<WellId> = wells.iter().map(|w| w.id.clone()).collect();
    let fresh: Vec<WellId> = ids.difference(&known).cloned().collect();
    wells.extend(fresh.iter().cloned().map(Well::placeholder));
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_array_payload() {
        let err = parse_json(ImportKind::Groundwater, r#"{"wellId":"W1"}"#).unwrap_err();
        assert!(matches!(err, ImportError::NotAnArray));
    }

    #[test]
    fn rejects_empty_array() {
        let err = parse_json(ImportKind::Groundwater, "[]").unwrap_err();
        assert!(matches!(err, ImportError::Empty));
    }

    #[test]
    fn rejects_record_without_well_id() {
        let payload = r#"[
            {"wellId":"W1","timestamp":"2024-01-01","gwl":10.0},
            {"timestamp":"2024-01-02","gwl":11.0}
        ]"#;
        let err = parse_json(ImportKind::Groundwater, payload).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn rejects_invalid_timestamp() {
        let payload = r#"[{"wellId":"W1","timestamp":"not a date","gwl":10.0}]"#;
        let err = parse_json(ImportKind::Groundwater, payload).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn parses_weather_batch() {
        let payload = r#"[{"wellId":"W1","timestamp":"2024-01-01","precipitation":4.2}]"#;
        let batch = parse_json(ImportKind::Weather, payload).unwrap();
        assert!(matches!(batch, ImportBatch::Weather(ref v) if v.len() == 1));
    }

    #[test]
    fn parses_csv_with_empty_optional_columns() {
        let csv = "wellId,timestamp,gwl,ec\nW1,2024-01-01,10.5,\nW1,2024-01-02,10.7,820\n";
        let batch = parse_csv(ImportKind::Groundwater, csv.as_bytes()).unwrap();
        match batch {
            ImportBatch::Groundwater(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].ec, None);
                assert_eq!(rows[1].ec, Some(820.0));
            }
            other => panic!("unexpected batch {other:?}"),
        }
    }

    #[test]
    fn csv_rejects_nan_and_infinite_levels() {
        let csv = "wellId,timestamp,gwl,ec\nW1,2024-01-01,10.5,\nW1,2024-01-02,NaN,\n";
        let err = parse_csv(ImportKind::Groundwater, csv.as_bytes()).unwrap_err();
        match err {
            ImportError::InvalidRecord { index, reason } => {
                assert_eq!(index, 1);
                assert_eq!(reason, "non-finite gwl");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let csv = "wellId,timestamp,gwl,ec\nW1,2024-01-03,inf,\n";
        assert!(parse_csv(ImportKind::Groundwater, csv.as_bytes()).is_err());

        let csv = "wellId,timestamp,gwl,ec\nW1,2024-01-03,10.0,1e400\n";
        let err = parse_csv(ImportKind::Groundwater, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("non-finite ec"));
    }

    #[test]
    fn csv_rejects_non_finite_optional_channels() {
        let csv = "wellId,timestamp,ph,do,turbidity\nW1,2024-01-01,7.0,-inf,\n";
        let err = parse_csv(ImportKind::WaterQuality, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("non-finite do"));

        let csv = "wellId,timestamp,pumping,consumption\nW1,2024-01-01,,NaN\n";
        let err = parse_csv(ImportKind::Usage, csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("non-finite consumption"));
    }

    #[test]
    fn kind_parses_loosely() {
        assert_eq!("water-quality".parse::<ImportKind>().unwrap(), ImportKind::WaterQuality);
        assert_eq!("waterQuality".parse::<ImportKind>().unwrap(), ImportKind::WaterQuality);
        assert!("soil".parse::<ImportKind>().is_err());
    }

    #[test]
    fn register_new_wells_adds_placeholders_once() {
        let mut wells = vec![Well::new("W1", "Well 1")];
        let ids: BTreeSet<WellId> = ["W1", "W2", "W3"].into_iter().map(WellId::from).collect();

        let fresh = register_new_wells(&mut wells, &ids);
        assert_eq!(fresh, vec![WellId::from("W2"), WellId::from("W3")]);
        assert_eq!(wells.len(), 3);
        assert_eq!(wells[1].name, "Well W2");

        assert!(register_new_wells(&mut wells, &ids).is_empty());
    }
}
