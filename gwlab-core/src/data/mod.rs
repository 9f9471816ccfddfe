//! Data layer: dataset merging, per-well series, point-in-time windows, import.

pub mod dataset;
pub mod import;
pub mod window;

pub use dataset::{merge_observations, ImportBatch, WellDataset, WellSeries};
pub use import::{parse_csv, parse_json, register_new_wells, ImportError, ImportKind, ImportSummary};
pub use window::{Feature, HistoricalWindow};
