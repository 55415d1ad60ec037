//! Master join of all derived series.
//!
//! Takes the union of every snapshot time seen by any component and
//! left-joins spot, realized tenor days, premiums, deviations, forward
//! returns, and both correlation sets onto that axis. Missing values stay
//! null; rows are never dropped for being sparse.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::correlation::{CrossCorrelationEngine, ReturnHorizon};
use super::median::MedianDeviationCalculator;
use super::premium::PremiumDeriver;
use super::returns::{spot_series, ForwardReturnCalculator};
use super::tenor::{TenorBucketizer, TenorGrid};
use crate::data::Observation;

/// One denormalized analytics row.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsRecord {
    pub snapshot_time: DateTime<Utc>,
    pub spot: Option<f64>,
    /// Actual days to expiry realized at each bucket
    pub tenor_days: TenorGrid<i64>,
    /// Annualized premium per bucket
    pub premiums: TenorGrid<f64>,
    /// Premium deviation from the bucket's historical median
    pub deviations: TenorGrid<f64>,
    pub f1: Option<f64>,
    pub f5: Option<f64>,
    /// Expanding correlation of each bucket's premium against f1
    pub corr_f1: TenorGrid<f64>,
    /// Expanding correlation of each bucket's premium against f5
    pub corr_f5: TenorGrid<f64>,
}

/// Full analysis output for one asset: one record per snapshot time,
/// ascending.
#[derive(Debug, Clone, Serialize, Default)]
pub struct MasterAnalysis {
    pub records: Vec<AnalyticsRecord>,
}

impl MasterAnalysis {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Left-joins every component's output onto the union time axis.
pub struct MasterJoiner;

impl MasterJoiner {
    /// Run the full pipeline over one asset's observations.
    pub fn join(observations: &[Observation]) -> MasterAnalysis {
        let spots = spot_series(observations);
        let curves = TenorBucketizer::new().bucketize(observations);
        let premiums = PremiumDeriver::derive(&curves);
        let deviations = MedianDeviationCalculator::calculate(observations);
        let returns = ForwardReturnCalculator::calculate(observations);
        let corr_f1 = CrossCorrelationEngine::expanding(
            ReturnHorizon::F1.default_min_periods(),
        )
        .correlate(&premiums, &returns, ReturnHorizon::F1);
        let corr_f5 = CrossCorrelationEngine::expanding(
            ReturnHorizon::F5.default_min_periods(),
        )
        .correlate(&premiums, &returns, ReturnHorizon::F5);

        let mut axis: BTreeSet<DateTime<Utc>> = BTreeSet::new();
        axis.extend(spots.iter().map(|(t, _)| *t));
        axis.extend(curves.iter().map(|c| c.snapshot_time));
        axis.extend(deviations.iter().map(|c| c.snapshot_time));
        axis.extend(returns.iter().map(|r| r.snapshot_time));

        let spot_by_time: BTreeMap<_, _> = spots.into_iter().collect();
        let days_by_time: BTreeMap<_, _> = curves
            .into_iter()
            .map(|c| (c.snapshot_time, c.contracts.map(|bc| bc.days_to_expiry)))
            .collect();
        let prem_by_time: BTreeMap<_, _> = premiums
            .into_iter()
            .map(|c| (c.snapshot_time, c.premiums))
            .collect();
        let dev_by_time: BTreeMap<_, _> = deviations
            .into_iter()
            .map(|c| (c.snapshot_time, c.deviations))
            .collect();
        let ret_by_time: BTreeMap<_, _> = returns
            .into_iter()
            .map(|r| (r.snapshot_time, (r.f1, r.f5)))
            .collect();
        let corr_f1_by_time: BTreeMap<_, _> = corr_f1
            .into_iter()
            .map(|c| (c.snapshot_time, c.correlations))
            .collect();
        let corr_f5_by_time: BTreeMap<_, _> = corr_f5
            .into_iter()
            .map(|c| (c.snapshot_time, c.correlations))
            .collect();

        let records = axis
            .into_iter()
            .map(|snapshot_time| {
                let (f1, f5) = ret_by_time
                    .get(&snapshot_time)
                    .copied()
                    .unwrap_or((None, None));
                AnalyticsRecord {
                    snapshot_time,
                    spot: spot_by_time.get(&snapshot_time).copied(),
                    tenor_days: days_by_time
                        .get(&snapshot_time)
                        .cloned()
                        .unwrap_or_default(),
                    premiums: prem_by_time
                        .get(&snapshot_time)
                        .cloned()
                        .unwrap_or_default(),
                    deviations: dev_by_time
                        .get(&snapshot_time)
                        .cloned()
                        .unwrap_or_default(),
                    f1,
                    f5,
                    corr_f1: corr_f1_by_time
                        .get(&snapshot_time)
                        .cloned()
                        .unwrap_or_default(),
                    corr_f5: corr_f5_by_time
                        .get(&snapshot_time)
                        .cloned()
                        .unwrap_or_default(),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Joined {} snapshot records from {} observations",
            records.len(),
            observations.len()
        );

        MasterAnalysis { records }
    }
}

/// Analyze one asset's observations.
pub fn analyze(observations: &[Observation]) -> MasterAnalysis {
    MasterJoiner::join(observations)
}

/// Analyze a mixed observation set, one independent analysis per asset.
///
/// Assets share no state, so they fan out across the rayon pool.
pub fn analyze_by_asset(observations: &[Observation]) -> BTreeMap<String, MasterAnalysis> {
    let mut by_asset: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        by_asset
            .entry(obs.asset.clone())
            .or_default()
            .push(obs.clone());
    }

    by_asset
        .into_par_iter()
        .map(|(asset, rows)| (asset, MasterJoiner::join(&rows)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tenor::TenorBucket;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn obs(asset: &str, day: u32, days_to_expiry: i64, spot: i64, ann: f64) -> Observation {
        let mut o = Observation::from_prices(
            1,
            asset,
            Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).unwrap(),
            None,
            days_to_expiry,
            Decimal::from(spot),
            Decimal::from(spot),
            0,
            format!("{}-{}D", asset, days_to_expiry),
        );
        o.annualized_pct = ann;
        o
    }

    #[test]
    fn test_empty_input_is_empty_analysis() {
        let analysis = MasterJoiner::join(&[]);
        assert!(analysis.is_empty());
    }

    #[test]
    fn test_one_record_per_snapshot_time() {
        let observations = vec![
            obs("BTC", 1, 31, 100, 12.0),
            obs("BTC", 1, 150, 100, 9.0),
            obs("BTC", 2, 30, 110, 11.0),
            obs("BTC", 2, 149, 110, 8.5),
        ];
        let analysis = MasterJoiner::join(&observations);

        assert_eq!(analysis.len(), 2);
        assert!(analysis.records[0].snapshot_time < analysis.records[1].snapshot_time);
        assert_eq!(analysis.records[0].spot, Some(100.0));
        assert_eq!(analysis.records[1].spot, Some(110.0));
    }

    #[test]
    fn test_sparse_components_stay_null() {
        let observations = vec![
            obs("BTC", 1, 31, 100, 12.0),
            obs("BTC", 1, 150, 100, 9.0),
            obs("BTC", 2, 30, 110, 11.0),
        ];
        let analysis = MasterJoiner::join(&observations);

        let first = &analysis.records[0];
        // Two snapshots only: f1 exists at row 0, never f5, no correlations
        // (min_periods gate), and the record is still emitted in full.
        assert!(first.f1.is_some());
        assert!(first.f5.is_none());
        assert_eq!(first.corr_f1.populated(), 0);
        assert_eq!(first.corr_f5.populated(), 0);
        assert!(first.premiums.get(TenorBucket::T270).is_some());

        let last = &analysis.records[1];
        assert!(last.f1.is_none());
        // Single contract on day 2: anchor only.
        assert_eq!(last.tenor_days.populated(), 1);
    }

    #[test]
    fn test_deviation_columns_joined() {
        let observations = vec![
            obs("BTC", 1, 31, 100, 12.0),
            obs("BTC", 1, 150, 100, 9.0),
        ];
        let analysis = MasterJoiner::join(&observations);

        // Single snapshot: deviations are zero for populated buckets.
        let record = &analysis.records[0];
        assert_eq!(record.deviations.get(TenorBucket::T270), Some(&0.0));
        assert_eq!(record.deviations.get(TenorBucket::T180), Some(&0.0));
    }

    #[test]
    fn test_analyze_by_asset_is_independent() {
        let mut observations = Vec::new();
        for day in 1..=3 {
            observations.push(obs("BTC", day, 150, 100 + day as i64, 9.0));
            observations.push(obs("ETH", day, 150, 2000 + day as i64, 7.0));
        }

        let by_asset = analyze_by_asset(&observations);
        assert_eq!(by_asset.len(), 2);
        assert_eq!(by_asset["BTC"].len(), 3);
        assert_eq!(by_asset["ETH"].len(), 3);
        assert_eq!(by_asset["BTC"].records[0].spot, Some(101.0));
        assert_eq!(by_asset["ETH"].records[0].spot, Some(2001.0));
    }
}
