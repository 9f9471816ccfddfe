//! Sustainability compliance — threshold checks over a well's observed data.
//!
//! Each check is tri-state: `Some(true)` compliant, `Some(false)` in breach,
//! `None` when the well has no readings of that quantity.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use gwlab_core::data::WellSeries;
use gwlab_core::domain::WellId;
use gwlab_core::stats::mean;

pub type ComplianceStatus = Option<bool>;

/// Regulatory limits applied to every well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceThresholds {
    /// Minimum GWL in metres below ground surface.
    pub min_gwl: f64,
    /// Maximum electrical conductivity in µS/cm.
    pub max_ec: f64,
    pub min_ph: f64,
    pub max_ph: f64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            min_gwl: 10.0,
            max_ec: 1000.0,
            min_ph: 6.5,
            max_ph: 8.5,
        }
    }
}

fn all_within(values: impl Iterator<Item = f64>, ok: impl Fn(f64) -> bool) -> ComplianceStatus {
    let mut values = values.peekable();
    values.peek()?;
    Some(values.all(ok))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub well_id: WellId,
    pub thresholds: ComplianceThresholds,
    /// `None` when there are no groundwater readings.
    pub average_gwl: Option<f64>,
    pub gwl: ComplianceStatus,
    pub ec: ComplianceStatus,
    pub ph: ComplianceStatus,
}

impl ComplianceReport {
    pub fn build(series: &WellSeries, thresholds: ComplianceThresholds) -> Self {
        let gwl = series.gwl_values();
        let average_gwl = (!gwl.is_empty()).then(|| mean(&gwl));

        Self {
            well_id: series.well_id.clone(),
            thresholds,
            average_gwl,
            gwl: all_within(gwl.iter().copied(), |v| v >= thresholds.min_gwl),
            ec: all_within(
                series.groundwater.iter().filter_map(|g| g.ec),
                |v| v <= thresholds.max_ec,
            ),
            ph: all_within(
                series.water_quality.iter().filter_map(|q| q.ph),
                |v| (thresholds.min_ph..=thresholds.max_ph).contains(&v),
            ),
        }
    }

    pub fn statuses(&self) -> [ComplianceStatus; 3] {
        [self.gwl, self.ec, self.ph]
    }

    pub fn has_breach(&self) -> bool {
        self.statuses().contains(&Some(false))
    }

    pub fn is_assessable(&self) -> bool {
        self.statuses().iter().any(Option::is_some)
    }

    /// Markdown report dated `date`.
    pub fn to_markdown(&self, date: NaiveDate) -> String {
        let t = &self.thresholds;
        let avg = self
            .average_gwl
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "N/A".into());

        let mut out = String::new();
        let _ = writeln!(out, "# Sustainability Compliance Report: Well {}\n", self.well_id);
        let _ = writeln!(out, "Report date: {date}\n");
        let _ = writeln!(out, "## 1. Groundwater level (GWL)");
        let _ = writeln!(out, "- Average GWL: {avg} m bgs");
        let _ = writeln!(out, "- Recommended minimum: {} m bgs", t.min_gwl);
        let _ = writeln!(out, "- Status: **{}**\n", status_label(self.gwl));
        let _ = writeln!(out, "## 2. Electrical conductivity (EC)");
        let _ = writeln!(out, "- Recommended maximum: {} µS/cm", t.max_ec);
        let _ = writeln!(out, "- Status: **{}**\n", status_label(self.ec));
        let _ = writeln!(out, "## 3. Water quality pH");
        let _ = writeln!(out, "- Recommended range: {} - {}", t.min_ph, t.max_ph);
        let _ = writeln!(out, "- Status: **{}**\n", status_label(self.ph));
        let _ = writeln!(out, "## 4. Recommendations");

        if self.gwl == Some(false) {
            let _ = writeln!(
                out,
                "- **GWL warning:** levels fall below the safe threshold. \
                 Consider reducing pumping or recharge measures."
            );
        }
        if self.ec == Some(false) {
            let _ = writeln!(
                out,
                "- **EC warning:** conductivity exceeds the safe threshold, suggesting \
                 salinisation or other contamination. Investigate further."
            );
        }
        if self.ph == Some(false) {
            let _ = writeln!(
                out,
                "- **pH warning:** pH is outside the safe range. Identify the cause and treat."
            );
        }
        if !self.is_assessable() {
            let _ = writeln!(
                out,
                "- Not enough data for a compliance assessment. Import more data."
            );
        } else if !self.has_breach() {
            let _ = writeln!(
                out,
                "- The well operates within sustainable limits based on available data. \
                 Keep monitoring."
            );
        }
        out
    }
}

pub fn status_label(status: ComplianceStatus) -> &'static str {
    match status {
        Some(true) => "Compliant",
        Some(false) => "Non-compliant",
        None => "N/A",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gwlab_core::domain::{parse_timestamp, GroundwaterReading, WaterQualityReading};

    fn series(gwl: &[(f64, Option<f64>)], ph: &[Option<f64>]) -> WellSeries {
        let start = parse_timestamp("2024-05-01").unwrap();
        let id = WellId::from("W1");
        let mut s = WellSeries::empty(id.clone());
        s.groundwater = gwl
            .iter()
            .enumerate()
            .map(|(i, &(gwl, ec))| GroundwaterReading {
                well_id: id.clone(),
                timestamp: start + Duration::days(i as i64),
                gwl,
                ec,
            })
            .collect();
        s.water_quality = ph
            .iter()
            .enumerate()
            .map(|(i, &ph)| WaterQualityReading {
                well_id: id.clone(),
                timestamp: start + Duration::days(i as i64),
                ph,
                dissolved_oxygen: None,
                turbidity: None,
            })
            .collect();
        s
    }

    #[test]
    fn empty_well_is_not_assessable() {
        let empty = WellSeries::empty(WellId::from("X"));
        let r = ComplianceReport::build(&empty, ComplianceThresholds::default());
        assert_eq!(r.statuses(), [None, None, None]);
        assert!(!r.is_assessable());
        let md = r.to_markdown(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(md.contains("Not enough data"));
    }

    #[test]
    fn gwl_threshold_is_inclusive() {
        let s = series(&[(10.0, None), (12.0, None)], &[]);
        let r = ComplianceReport::build(&s, ComplianceThresholds::default());
        assert_eq!(r.gwl, Some(true));
        assert_eq!(r.average_gwl, Some(11.0));
        // no EC values recorded
        assert_eq!(r.ec, None);
    }

    #[test]
    fn breaches_are_reported() {
        let r = ComplianceReport::build(
            &series(&[(9.5, Some(1200.0)), (11.0, Some(800.0))], &[Some(7.0), Some(9.1)]),
            ComplianceThresholds::default(),
        );
        assert_eq!(r.statuses(), [Some(false), Some(false), Some(false)]);
        let md = r.to_markdown(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(md.contains("GWL warning"));
        assert!(md.contains("EC warning"));
        assert!(md.contains("pH warning"));
        assert!(!md.contains("within sustainable limits"));
    }

    #[test]
    fn compliant_well_gets_positive_note() {
        let s = series(&[(15.0, Some(300.0))], &[Some(7.2)]);
        let r = ComplianceReport::build(&s, ComplianceThresholds::default());
        assert!(!r.has_breach());
        let md = r.to_markdown(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(md.contains("**Compliant**"));
        assert!(md.contains("within sustainable limits"));
    }
}
