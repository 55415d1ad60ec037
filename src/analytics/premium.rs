//! Annualized premium projection.
//!
//! Projects each bucketed contract's annualized premium onto the canonical
//! bucket labels. The premium itself is carried through from the input
//! observations; nothing is recomputed here.

use chrono::{DateTime, Utc};

use super::tenor::{SnapshotCurve, TenorGrid};

/// The 8 canonical premium values for one snapshot.
#[derive(Debug, Clone)]
pub struct PremiumCurve {
    pub snapshot_time: DateTime<Utc>,
    pub premiums: TenorGrid<f64>,
}

/// Projects bucketized curves onto premium series.
pub struct PremiumDeriver;

impl PremiumDeriver {
    /// One premium curve per snapshot, reusing the bucketizer's assignment.
    pub fn derive(curves: &[SnapshotCurve]) -> Vec<PremiumCurve> {
        curves
            .iter()
            .map(|curve| PremiumCurve {
                snapshot_time: curve.snapshot_time,
                premiums: curve.contracts.map(|c| c.annualized_pct),
            })
            .collect()
    }
}
