//! Report projection for serving layers.
//!
//! Projects a [`MasterAnalysis`](super::master::MasterAnalysis) into the
//! seven-section shape consumed by the API layer: each section is a list
//! of flat records keyed by snapshot time. Display output rounds numeric
//! fields to 2 decimal places; callers needing full precision request the
//! unrounded variant. Absent values serialize as JSON `null`, never `NaN`.

use serde::Serialize;
use serde_json::{Map, Value};

use super::master::{AnalyticsRecord, MasterAnalysis};
use super::tenor::TenorGrid;

/// Numeric precision of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Rounded to 2 decimal places for display
    Display,
    /// Unrounded
    Full,
}

impl Precision {
    fn apply(self, value: f64) -> f64 {
        match self {
            Self::Display => (value * 100.0).round() / 100.0,
            Self::Full => value,
        }
    }
}

/// JSON-serializable analysis report, one list of records per section.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub spot: Vec<Value>,
    pub days_to_expiry: Vec<Value>,
    pub annualized_premiums: Vec<Value>,
    pub premiums_vs_median: Vec<Value>,
    pub price_changes: Vec<Value>,
    pub correlations_f1: Vec<Value>,
    pub correlations_f5: Vec<Value>,
}

impl AnalysisReport {
    /// Project an analysis into section records at the given precision.
    pub fn new(analysis: &MasterAnalysis, precision: Precision) -> Self {
        Self {
            spot: section(analysis, |record, row| {
                push_opt(row, "spot", record.spot, precision);
            }),
            days_to_expiry: section(analysis, |record, row| {
                push_grid_days(row, &record.tenor_days);
            }),
            annualized_premiums: section(analysis, |record, row| {
                push_grid(row, "prem_", &record.premiums, precision);
            }),
            premiums_vs_median: section(analysis, |record, row| {
                push_grid(row, "dev_", &record.deviations, precision);
            }),
            price_changes: section(analysis, |record, row| {
                push_opt(row, "f1", record.f1, precision);
                push_opt(row, "f5", record.f5, precision);
            }),
            correlations_f1: section(analysis, |record, row| {
                push_grid(row, "corr_", &record.corr_f1, precision);
            }),
            correlations_f5: section(analysis, |record, row| {
                push_grid(row, "corr_", &record.corr_f5, precision);
            }),
        }
    }

    /// Display-rounded report.
    pub fn rounded(analysis: &MasterAnalysis) -> Self {
        Self::new(analysis, Precision::Display)
    }
}

/// Build one section: a record per analytics row, starting from the
/// snapshot time and extended by `fill`.
fn section(
    analysis: &MasterAnalysis,
    fill: impl Fn(&AnalyticsRecord, &mut Map<String, Value>),
) -> Vec<Value> {
    analysis
        .records
        .iter()
        .map(|record| {
            let mut row = Map::new();
            row.insert(
                "snapshot_time".to_string(),
                Value::String(record.snapshot_time.to_rfc3339()),
            );
            fill(record, &mut row);
            Value::Object(row)
        })
        .collect()
}

/// Insert an optional numeric field; absent or non-finite becomes null.
fn push_opt(row: &mut Map<String, Value>, key: &str, value: Option<f64>, precision: Precision) {
    let json = value
        .filter(|v| v.is_finite())
        .and_then(|v| serde_json::Number::from_f64(precision.apply(v)))
        .map(Value::Number)
        .unwrap_or(Value::Null);
    row.insert(key.to_string(), json);
}

/// Insert one field per bucket, prefixed by the series name.
fn push_grid(
    row: &mut Map<String, Value>,
    prefix: &str,
    grid: &TenorGrid<f64>,
    precision: Precision,
) {
    for (bucket, value) in grid.iter() {
        let key = format!("{}{}", prefix, bucket.nominal_days());
        push_opt(row, &key, value.copied(), precision);
    }
}

/// Realized tenor days are integers and are never rounded.
fn push_grid_days(row: &mut Map<String, Value>, grid: &TenorGrid<i64>) {
    for (bucket, value) in grid.iter() {
        let key = format!("t_{}", bucket.nominal_days());
        let json = value
            .map(|&d| Value::Number(d.into()))
            .unwrap_or(Value::Null);
        row.insert(key, json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::master::MasterJoiner;
    use crate::data::Observation;
    use chrono::TimeZone;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn obs(day: u32, days_to_expiry: i64, spot: f64, ann: f64) -> Observation {
        let mut o = Observation::from_prices(
            1,
            "BTC",
            Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).unwrap(),
            None,
            days_to_expiry,
            Decimal::from_f64_retain(spot).unwrap(),
            Decimal::from_f64_retain(spot).unwrap(),
            0,
            format!("BTC-{}D", days_to_expiry),
        );
        o.annualized_pct = ann;
        o
    }

    #[test]
    fn test_report_sections_align() {
        let observations = vec![
            obs(1, 31, 100.0, 12.345),
            obs(1, 150, 100.0, 9.0),
            obs(2, 30, 110.0, 11.0),
            obs(2, 149, 110.0, 8.5),
        ];
        let analysis = MasterJoiner::join(&observations);
        let report = AnalysisReport::new(&analysis, Precision::Full);

        assert_eq!(report.spot.len(), 2);
        assert_eq!(report.days_to_expiry.len(), 2);
        assert_eq!(report.annualized_premiums.len(), 2);
        assert_eq!(report.premiums_vs_median.len(), 2);
        assert_eq!(report.price_changes.len(), 2);
        assert_eq!(report.correlations_f1.len(), 2);
        assert_eq!(report.correlations_f5.len(), 2);
    }

    #[test]
    fn test_display_rounding() {
        let observations = vec![obs(1, 150, 100.0, 9.8765)];
        let analysis = MasterJoiner::join(&observations);
        let report = AnalysisReport::rounded(&analysis);

        let row = report.annualized_premiums[0].as_object().unwrap();
        assert_eq!(row["prem_270"], Value::from(9.88));
    }

    #[test]
    fn test_full_precision_unrounded() {
        let observations = vec![obs(1, 150, 100.0, 9.8765)];
        let analysis = MasterJoiner::join(&observations);
        let report = AnalysisReport::new(&analysis, Precision::Full);

        let row = report.annualized_premiums[0].as_object().unwrap();
        assert_eq!(row["prem_270"], Value::from(9.8765));
    }

    #[test]
    fn test_absent_values_serialize_as_null() {
        let observations = vec![obs(1, 150, 100.0, 9.0)];
        let analysis = MasterJoiner::join(&observations);
        let report = AnalysisReport::rounded(&analysis);

        let days = report.days_to_expiry[0].as_object().unwrap();
        assert_eq!(days["t_270"], Value::from(150));
        assert_eq!(days["t_30"], Value::Null);

        let changes = report.price_changes[0].as_object().unwrap();
        assert_eq!(changes["f1"], Value::Null);

        let rendered = serde_json::to_string(&report).unwrap();
        assert!(!rendered.contains("NaN"));
    }

    #[test]
    fn test_empty_analysis_yields_empty_sections() {
        let report = AnalysisReport::rounded(&MasterJoiner::join(&[]));
        assert!(report.spot.is_empty());
        assert!(report.correlations_f5.is_empty());
    }
}
