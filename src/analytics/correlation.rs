//! Windowed cross-correlation between premium buckets and forward returns.
//!
//! For each canonical bucket, answers "has this tenor's premium been
//! predictive of near-term spot moves, as of time i": a rolling or
//! expanding Pearson correlation between the bucket's premium series and a
//! forward-return series, gated by a minimum paired-sample count.

use chrono::{DateTime, Utc};

use super::premium::PremiumCurve;
use super::returns::ForwardReturn;
use super::tenor::{TenorBucket, TenorGrid};

/// Minimum paired samples for the 1-snapshot-ahead return series.
pub const DEFAULT_MIN_PERIODS_F1: usize = 4;

/// Minimum paired samples for the 5-snapshots-ahead return series.
pub const DEFAULT_MIN_PERIODS_F5: usize = 3;

/// Which forward-return series to correlate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnHorizon {
    F1,
    F5,
}

impl ReturnHorizon {
    pub fn default_min_periods(self) -> usize {
        match self {
            Self::F1 => DEFAULT_MIN_PERIODS_F1,
            Self::F5 => DEFAULT_MIN_PERIODS_F5,
        }
    }

    fn value(self, row: &ForwardReturn) -> Option<f64> {
        match self {
            Self::F1 => row.f1,
            Self::F5 => row.f5,
        }
    }
}

/// The 8 correlation values for one snapshot time.
#[derive(Debug, Clone)]
pub struct CorrelationCurve {
    pub snapshot_time: DateTime<Utc>,
    pub correlations: TenorGrid<f64>,
}

/// Rolling/expanding Pearson correlation with minimum-sample gating.
#[derive(Debug, Clone)]
pub struct CrossCorrelationEngine {
    /// Trailing window size including the current row; expanding when absent
    window: Option<usize>,
    /// Minimum non-null paired observations required to emit a value
    min_periods: usize,
}

impl CrossCorrelationEngine {
    /// Expanding window from the start of the series.
    pub fn expanding(min_periods: usize) -> Self {
        Self {
            window: None,
            min_periods,
        }
    }

    /// Fixed trailing window of `window` rows including the current one.
    pub fn rolling(window: usize, min_periods: usize) -> Self {
        Self {
            window: Some(window),
            min_periods,
        }
    }

    /// Correlate each bucket's premium series against one forward-return
    /// series, inner-joined by snapshot time, ascending.
    pub fn correlate(
        &self,
        premiums: &[PremiumCurve],
        returns: &[ForwardReturn],
        horizon: ReturnHorizon,
    ) -> Vec<CorrelationCurve> {
        let rows = inner_join(premiums, returns, horizon);
        let times: Vec<DateTime<Utc>> = rows.iter().map(|(t, _, _)| *t).collect();
        let ret_col: Vec<Option<f64>> = rows.iter().map(|(_, _, r)| *r).collect();

        let mut curves: Vec<CorrelationCurve> = times
            .iter()
            .map(|&snapshot_time| CorrelationCurve {
                snapshot_time,
                correlations: TenorGrid::default(),
            })
            .collect();

        for bucket in TenorBucket::ALL {
            let prem_col: Vec<Option<f64>> = rows
                .iter()
                .map(|(_, premiums, _)| premiums.get(bucket).copied())
                .collect();

            for i in 0..rows.len() {
                // Not enough history to even reach the sample floor.
                if i + 1 < self.min_periods {
                    continue;
                }

                let start = match self.window {
                    None => 0,
                    Some(window) => (i + 1).saturating_sub(window),
                };

                let pairs: Vec<(f64, f64)> = (start..=i)
                    .filter_map(|j| Some((prem_col[j]?, ret_col[j]?)))
                    .collect();
                if pairs.len() < self.min_periods {
                    continue;
                }

                if let Some(corr) = pearson(&pairs) {
                    curves[i].correlations.set(bucket, corr);
                }
            }
        }

        curves
    }
}

/// Inner-join premium curves with a forward-return series by snapshot time.
/// Only times present in both series survive. Both inputs are ascending.
fn inner_join<'a>(
    premiums: &'a [PremiumCurve],
    returns: &[ForwardReturn],
    horizon: ReturnHorizon,
) -> Vec<(DateTime<Utc>, &'a TenorGrid<f64>, Option<f64>)> {
    let mut joined = Vec::with_capacity(premiums.len().min(returns.len()));
    let mut r = 0;

    for curve in premiums {
        while r < returns.len() && returns[r].snapshot_time < curve.snapshot_time {
            r += 1;
        }
        if r < returns.len() && returns[r].snapshot_time == curve.snapshot_time {
            joined.push((
                curve.snapshot_time,
                &curve.premiums,
                horizon.value(&returns[r]),
            ));
        }
    }

    joined
}

/// Pearson product-moment correlation over paired samples.
///
/// Undefined (`None`) when either column has zero variance, regardless of
/// the sample count.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    let corr = cov / (var_x.sqrt() * var_y.sqrt());
    corr.is_finite().then_some(corr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn premium_curve(day: u32, t270: Option<f64>) -> PremiumCurve {
        let mut premiums = TenorGrid::default();
        if let Some(v) = t270 {
            premiums.set(TenorBucket::T270, v);
        }
        PremiumCurve {
            snapshot_time: Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).unwrap(),
            premiums,
        }
    }

    fn forward_return(day: u32, f1: Option<f64>) -> ForwardReturn {
        ForwardReturn {
            snapshot_time: Utc.with_ymd_and_hms(2023, 1, day, 0, 0, 0).unwrap(),
            f1,
            f5: None,
        }
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64)).collect();
        let corr = pearson(&pairs).unwrap();
        assert!((corr - 1.0).abs() < 1e-12);

        let anti: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -3.0 * i as f64)).collect();
        let corr = pearson(&anti).unwrap();
        assert!((corr + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_zero_variance_is_undefined() {
        let pairs: Vec<(f64, f64)> = (0..5).map(|i| (7.0, i as f64)).collect();
        assert!(pearson(&pairs).is_none());
    }

    #[test]
    fn test_minimum_sample_gating() {
        let premiums: Vec<PremiumCurve> =
            (1..=10).map(|d| premium_curve(d, Some(d as f64))).collect();
        let returns: Vec<ForwardReturn> = (1..=10)
            .map(|d| forward_return(d, Some(d as f64 * 0.01)))
            .collect();

        let engine = CrossCorrelationEngine::expanding(4);
        let curves = engine.correlate(&premiums, &returns, ReturnHorizon::F1);

        for (i, curve) in curves.iter().enumerate() {
            let value = curve.correlations.get(TenorBucket::T270);
            if i < 3 {
                assert!(value.is_none());
            } else {
                assert!(value.is_some());
            }
        }
    }

    #[test]
    fn test_correlation_bounds() {
        let premiums: Vec<PremiumCurve> = (1..=12)
            .map(|d| premium_curve(d, Some((d as f64 * 1.7).sin())))
            .collect();
        let returns: Vec<ForwardReturn> = (1..=12)
            .map(|d| forward_return(d, Some((d as f64 * 0.9).cos())))
            .collect();

        let engine = CrossCorrelationEngine::expanding(4);
        for curve in engine.correlate(&premiums, &returns, ReturnHorizon::F1) {
            if let Some(corr) = curve.correlations.get(TenorBucket::T270) {
                assert!((-1.0..=1.0).contains(corr));
            }
        }
    }

    #[test]
    fn test_null_pairs_are_dropped() {
        // 6 rows but rows 2 and 3 have a null side: only 4 pairs remain.
        let premiums: Vec<PremiumCurve> = vec![
            premium_curve(1, Some(1.0)),
            premium_curve(2, None),
            premium_curve(3, Some(3.0)),
            premium_curve(4, Some(4.0)),
            premium_curve(5, Some(5.0)),
            premium_curve(6, Some(6.0)),
        ];
        let returns: Vec<ForwardReturn> = vec![
            forward_return(1, Some(0.01)),
            forward_return(2, Some(0.02)),
            forward_return(3, None),
            forward_return(4, Some(0.04)),
            forward_return(5, Some(0.05)),
            forward_return(6, Some(0.06)),
        ];

        let engine = CrossCorrelationEngine::expanding(4);
        let curves = engine.correlate(&premiums, &returns, ReturnHorizon::F1);

        // Paired counts: 2 at i=3, 3 at i=4, 4 at i=5.
        assert!(curves[3].correlations.get(TenorBucket::T270).is_none());
        assert!(curves[4].correlations.get(TenorBucket::T270).is_none());
        assert!(curves[5].correlations.get(TenorBucket::T270).is_some());
    }

    #[test]
    fn test_rolling_window_limits_history() {
        // Premium flips sign each row; an expanding window would keep all
        // of it, the rolling window only sees the trailing 4 rows.
        let premiums: Vec<PremiumCurve> =
            (1..=8).map(|d| premium_curve(d, Some(d as f64))).collect();
        let returns: Vec<ForwardReturn> = (1..=8)
            .map(|d| forward_return(d, Some(if d <= 4 { d as f64 } else { -(d as f64) })))
            .collect();

        let rolling = CrossCorrelationEngine::rolling(4, 3);
        let curves = rolling.correlate(&premiums, &returns, ReturnHorizon::F1);

        // Window [5..8] is perfectly anti-correlated.
        let last = curves[7].correlations.get(TenorBucket::T270).unwrap();
        assert!((last + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_inner_join_drops_unmatched_times() {
        let premiums = vec![premium_curve(1, Some(1.0)), premium_curve(3, Some(3.0))];
        let returns = vec![
            forward_return(1, Some(0.1)),
            forward_return(2, Some(0.2)),
        ];

        let joined = inner_join(&premiums, &returns, ReturnHorizon::F1);
        assert_eq!(joined.len(), 1);
        assert_eq!(
            joined[0].0,
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_input() {
        let engine = CrossCorrelationEngine::expanding(4);
        assert!(engine.correlate(&[], &[], ReturnHorizon::F1).is_empty());
    }
}
