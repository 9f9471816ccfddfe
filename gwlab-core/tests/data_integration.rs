//! Integration tests for the import → merge → window → forecast path.

use gwlab_core::data::{parse_csv, parse_json, register_new_wells, ImportKind, WellDataset};
use gwlab_core::domain::{parse_timestamp, Well, WellId};
use gwlab_core::forecast::{forecast_checked, ForecastProgram, DEFAULT_HORIZON};

const GROUNDWATER: &str = r#"[
    {"wellId": "WELL_001", "timestamp": "2024-05-01", "gwl": 12.1, "ec": 810},
    {"wellId": "WELL_001", "timestamp": "2024-05-02", "gwl": 12.3, "ec": 805},
    {"wellId": "WELL_001", "timestamp": "2024-05-03", "gwl": 12.2},
    {"wellId": "WELL_002", "timestamp": "2024-05-01", "gwl": 8.4, "ec": 1200}
]"#;

const WEATHER_CSV: &str = "wellId,timestamp,precipitation,temperature
WELL_001,2024-05-01,0.0,31.5
WELL_001,2024-05-02,12.5,29.0
WELL_001,2024-05-04,3.0,30.1
";

#[test]
fn import_merge_and_window_pipeline() {
    // GIVEN an empty dataset with one registered well
    let mut dataset = WellDataset::new();
    let mut wells = vec![Well::new("WELL_001", "Well 1")];

    // WHEN groundwater JSON and weather CSV are imported
    let gw = parse_json(ImportKind::Groundwater, GROUNDWATER).expect("valid JSON import");
    let new_wells = register_new_wells(&mut wells, &gw.well_ids());
    assert_eq!(dataset.merge(gw), 4);
    let weather = parse_csv(ImportKind::Weather, WEATHER_CSV.as_bytes()).expect("valid CSV import");
    dataset.merge(weather);

    // THEN the unknown well is registered as a placeholder
    assert_eq!(new_wells, vec![WellId::from("WELL_002")]);
    assert_eq!(wells.len(), 2);

    // AND a window before May 3rd sees two GWL readings and two weather rows
    let series = dataset.for_well(&WellId::from("WELL_001"));
    let window = series.window_before(parse_timestamp("2024-05-03").unwrap());
    assert_eq!(window.groundwater.len(), 2);
    assert_eq!(window.weather.len(), 2);

    // AND the default program forecasts the last level over the horizon
    let out = forecast_checked(&ForecastProgram::default(), &window, DEFAULT_HORIZON).unwrap();
    assert_eq!(out, vec![12.3; DEFAULT_HORIZON]);
}

#[test]
fn reimport_updates_in_place() {
    let mut dataset = WellDataset::new();
    dataset.merge(parse_json(ImportKind::Groundwater, GROUNDWATER).unwrap());

    let correction = r#"[{"wellId": "WELL_001", "timestamp": "2024-05-02", "gwl": 12.9}]"#;
    let inserted = dataset.merge(parse_json(ImportKind::Groundwater, correction).unwrap());

    assert_eq!(inserted, 0);
    let series = dataset.for_well(&WellId::from("WELL_001"));
    assert_eq!(series.gwl_values(), vec![12.1, 12.9, 12.2]);
    // EC from the first import survives the partial update
    assert_eq!(series.groundwater[1].ec, Some(805.0));
}

#[test]
fn dataset_json_uses_dashboard_collection_names() {
    let mut dataset = WellDataset::new();
    dataset.merge(parse_json(ImportKind::Groundwater, GROUNDWATER).unwrap());
    let json = serde_json::to_value(&dataset).unwrap();
    assert!(json.get("groundwaterData").is_some());
    assert!(json.get("weatherForecast").is_some());
    assert!(json.get("waterUsage").is_some());

    let back: WellDataset = serde_json::from_value(json).unwrap();
    assert_eq!(back, dataset);
}
