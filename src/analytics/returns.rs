//! Forward log returns of spot price.
//!
//! Spot is taken once per distinct snapshot time (first value wins on
//! duplicates), sorted ascending, and differenced forward: the return at
//! row `i` looks `horizon` snapshots ahead, so the tail of the series is
//! null rather than the head.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::data::Observation;

/// Snapshots ahead for the short-horizon return.
pub const F1_HORIZON: usize = 1;

/// Snapshots ahead for the long-horizon return.
pub const F5_HORIZON: usize = 5;

/// Forward returns for one snapshot time.
#[derive(Debug, Clone, Copy)]
pub struct ForwardReturn {
    pub snapshot_time: DateTime<Utc>,
    /// Log return to the next snapshot, null at the last row
    pub f1: Option<f64>,
    /// Log return five snapshots ahead, null for the last five rows
    pub f5: Option<f64>,
}

/// Computes forward-looking log returns over fixed snapshot horizons.
pub struct ForwardReturnCalculator;

impl ForwardReturnCalculator {
    /// One row per distinct snapshot time, ascending.
    pub fn calculate(observations: &[Observation]) -> Vec<ForwardReturn> {
        let spots = spot_series(observations);
        let prices: Vec<f64> = spots.iter().map(|(_, spot)| *spot).collect();

        let f1 = forward_log_returns(&prices, F1_HORIZON);
        let f5 = forward_log_returns(&prices, F5_HORIZON);

        spots
            .into_iter()
            .enumerate()
            .map(|(i, (snapshot_time, _))| ForwardReturn {
                snapshot_time,
                f1: f1[i],
                f5: f5[i],
            })
            .collect()
    }
}

/// De-duplicated spot series: one `(time, spot)` pair per distinct
/// snapshot time, ascending, keeping the first value seen in input order.
pub fn spot_series(observations: &[Observation]) -> Vec<(DateTime<Utc>, f64)> {
    let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for obs in observations {
        by_time.entry(obs.snapshot_time).or_insert_with(|| obs.spot_f64());
    }
    by_time.into_iter().collect()
}

/// `ln(spot[i + horizon] / spot[i])` where the forward row exists, null
/// otherwise. Non-finite results (non-positive spot) are null.
pub fn forward_log_returns(spot: &[f64], horizon: usize) -> Vec<Option<f64>> {
    (0..spot.len())
        .map(|i| {
            let forward = spot.get(i + horizon)?;
            let r = (forward / spot[i]).ln();
            r.is_finite().then_some(r)
        })
        .collect()
}
