//! Premium deviation from the historical median curve.
//!
//! Re-derives its own rank assignment from the raw observations instead of
//! reusing the bucketizer's output: contracts are ranked into positions
//! 1..8 (below-anchor ranks 6..1, then the anchor, then the first contract
//! above), each positional series is centered on its own cross-time median,
//! and the centered series are relabeled onto the canonical buckets in
//! nominal-day order (position 1 -> bucket 1, ..., position 8 -> bucket 360).
//!
//! The positional relabeling is a compatibility contract with downstream
//! consumers of the deviation columns; keep the two ranking passes separate
//! rather than unifying them with the bucketizer.

use chrono::{DateTime, Utc};

use super::tenor::{group_by_snapshot, select_anchor, TenorBucket, TenorGrid, ANCHOR_TENOR_DAYS};
use crate::data::Observation;

/// Number of positional slots (mirrors the canonical bucket count).
const POSITIONS: usize = TenorBucket::COUNT;

/// The 8 deviation values for one snapshot, keyed by canonical bucket.
#[derive(Debug, Clone)]
pub struct DeviationCurve {
    pub snapshot_time: DateTime<Utc>,
    pub deviations: TenorGrid<f64>,
}

/// Centers positional premium series on their cross-time medians.
pub struct MedianDeviationCalculator;

impl MedianDeviationCalculator {
    /// One deviation curve per snapshot time, ascending.
    pub fn calculate(observations: &[Observation]) -> Vec<DeviationCurve> {
        let groups = group_by_snapshot(observations);
        if groups.is_empty() {
            return Vec::new();
        }

        // Independent ranking pass: positional premium rows, one per time.
        let mut times = Vec::with_capacity(groups.len());
        let mut rows: Vec<[Option<f64>; POSITIONS]> = Vec::with_capacity(groups.len());
        for (snapshot_time, group) in groups {
            let Some(anchor) = select_anchor(&group, ANCHOR_TENOR_DAYS) else {
                continue;
            };

            let mut positions: [Option<f64>; POSITIONS] = [None; POSITIONS];
            positions[6] = Some(anchor.annualized_pct);

            let mut below: Vec<&Observation> = group
                .iter()
                .copied()
                .filter(|obs| obs.days_to_expiry < anchor.days_to_expiry)
                .collect();
            let mut above: Vec<&Observation> = group
                .iter()
                .copied()
                .filter(|obs| obs.days_to_expiry > anchor.days_to_expiry)
                .collect();
            below.sort_by(|a, b| b.days_to_expiry.cmp(&a.days_to_expiry));
            above.sort_by(|a, b| a.days_to_expiry.cmp(&b.days_to_expiry));

            // Below-anchor rank r occupies position 7 - r (rank 1 -> 6).
            for (i, obs) in below.iter().enumerate().take(6) {
                let rank = i + 1;
                positions[6 - rank] = Some(obs.annualized_pct);
            }
            if let Some(first_above) = above.first() {
                positions[7] = Some(first_above.annualized_pct);
            }

            times.push(snapshot_time);
            rows.push(positions);
        }

        // Cross-time median per position, nulls ignored.
        let medians: [Option<f64>; POSITIONS] = std::array::from_fn(|p| {
            let values: Vec<f64> = rows.iter().filter_map(|row| row[p]).collect();
            median(&values)
        });

        times
            .into_iter()
            .zip(rows)
            .map(|(snapshot_time, row)| {
                let mut deviations = TenorGrid::default();
                for (p, value) in row.into_iter().enumerate() {
                    // Position p+1 relabels onto ALL[p]: 1 -> bucket 1, ...,
                    // 8 -> bucket 360.
                    let bucket = TenorBucket::ALL[p];
                    if let (Some(v), Some(m)) = (value, medians[p]) {
                        deviations.set(bucket, v - m);
                    }
                }
                DeviationCurve {
                    snapshot_time,
                    deviations,
                }
            })
            .collect()
    }
}

/// Arithmetic median with linear interpolation between the two middle
/// order statistics for even counts. Empty input yields `None`.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn obs(day: u32, days_to_expiry: i64, annualized_pct: f64) -> Observation {
        let mut o = Observation::from_prices(
            1,
            "BTC",
            Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).unwrap(),
            None,
            days_to_expiry,
            Decimal::from(100),
            Decimal::from(100),
            0,
            format!("BTC-{}D", days_to_expiry),
        );
        o.annualized_pct = annualized_pct;
        o
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_single_snapshot_deviations_are_zero() {
        // Median of one value is itself, so every populated bucket is 0.
        let observations = vec![obs(1, 31, 12.0), obs(1, 150, 9.0)];
        let curves = MedianDeviationCalculator::calculate(&observations);

        assert_eq!(curves.len(), 1);
        for (_, dev) in curves[0].deviations.iter() {
            if let Some(d) = dev {
                assert!(d.abs() < 1e-12);
            }
        }
        assert_eq!(curves[0].deviations.populated(), 2);
    }

    #[test]
    fn test_deviation_series_has_zero_median() {
        let observations = vec![
            obs(1, 150, 8.0),
            obs(2, 150, 10.0),
            obs(3, 150, 12.0),
        ];
        let curves = MedianDeviationCalculator::calculate(&observations);

        // Anchor-only snapshots populate bucket 270 alone; its deviation
        // series re-centers to zero median by construction.
        let devs: Vec<f64> = curves
            .iter()
            .filter_map(|c| c.deviations.get(TenorBucket::T270).copied())
            .collect();
        assert_eq!(devs.len(), 3);
        assert_eq!(median(&devs), Some(0.0));
        assert!((devs[0] - (-2.0)).abs() < 1e-12);
        assert!((devs[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_positional_relabeling() {
        // A single below-anchor contract is below-rank 1, which is
        // position 6 and therefore relabels onto bucket 180.
        let observations = vec![obs(1, 31, 12.0), obs(1, 150, 9.0)];
        let curves = MedianDeviationCalculator::calculate(&observations);

        assert!(curves[0].deviations.get(TenorBucket::T180).is_some());
        assert!(curves[0].deviations.get(TenorBucket::T30).is_none());
        assert!(curves[0].deviations.get(TenorBucket::T270).is_some());
    }

    #[test]
    fn test_absent_position_stays_absent() {
        let observations = vec![
            obs(1, 150, 9.0),
            obs(2, 31, 12.0),
            obs(2, 150, 10.0),
        ];
        let curves = MedianDeviationCalculator::calculate(&observations);

        // Day 1 has no below-anchor contract: bucket 180 absent there,
        // present on day 2.
        assert!(curves[0].deviations.get(TenorBucket::T180).is_none());
        assert!(curves[1].deviations.get(TenorBucket::T180).is_some());
    }

    #[test]
    fn test_empty_input() {
        assert!(MedianDeviationCalculator::calculate(&[]).is_empty());
    }
}
