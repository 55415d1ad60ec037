//! Canonical tenor bucketing.
//!
//! Each snapshot's contracts are ranked around an anchor (the contract
//! closest to the 270-day tenor) and assigned to eight canonical buckets:
//! - 180, 90, 60, 30, 7, 1 for the 1st..6th closest contracts below the
//!   anchor (by days to expiry, closest first)
//! - 270 for the anchor itself
//! - 360 for the closest contract above the anchor
//!
//! A bucket with no contract at the corresponding rank is absent, which is
//! expected for short curves rather than an error.

use std::collections::BTreeMap;
use std::ops::Index;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::data::Observation;

/// Nominal tenor the anchor contract is matched against.
pub const ANCHOR_TENOR_DAYS: i64 = 270;

/// One of the eight canonical tenor slots.
///
/// The labels are nominal day counts, not literal ones: a bucket holds
/// whichever contract occupies the corresponding rank around the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TenorBucket {
    T1,
    T7,
    T30,
    T60,
    T90,
    T180,
    T270,
    T360,
}

impl TenorBucket {
    pub const COUNT: usize = 8;

    /// All buckets, ordered by nominal days.
    pub const ALL: [TenorBucket; Self::COUNT] = [
        Self::T1,
        Self::T7,
        Self::T30,
        Self::T60,
        Self::T90,
        Self::T180,
        Self::T270,
        Self::T360,
    ];

    pub fn nominal_days(self) -> u32 {
        match self {
            Self::T1 => 1,
            Self::T7 => 7,
            Self::T30 => 30,
            Self::T60 => 60,
            Self::T90 => 90,
            Self::T180 => 180,
            Self::T270 => 270,
            Self::T360 => 360,
        }
    }

    /// Index into [`TenorBucket::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::T1 => 0,
            Self::T7 => 1,
            Self::T30 => 2,
            Self::T60 => 3,
            Self::T90 => 4,
            Self::T180 => 5,
            Self::T270 => 6,
            Self::T360 => 7,
        }
    }

    /// Bucket for a below-anchor rank (1 = closest to the anchor).
    ///
    /// Rank 1 maps to bucket 180 and rank 6 to bucket 1; ranks beyond 6
    /// have no bucket.
    pub fn from_below_rank(rank: usize) -> Option<Self> {
        match rank {
            1 => Some(Self::T180),
            2 => Some(Self::T90),
            3 => Some(Self::T60),
            4 => Some(Self::T30),
            5 => Some(Self::T7),
            6 => Some(Self::T1),
            _ => None,
        }
    }

    /// Bucket for a positional slot 1..=8 (below-ranks 6..1, anchor, above).
    pub fn from_position(position: usize) -> Option<Self> {
        if (1..=Self::COUNT).contains(&position) {
            Some(Self::ALL[position - 1])
        } else {
            None
        }
    }
}

/// Fixed-size mapping from canonical bucket to an optional value.
///
/// The bucket set is closed, so this is an array indexed by
/// [`TenorBucket::index`] rather than a dynamic map.
#[derive(Debug, Clone, PartialEq)]
pub struct TenorGrid<T>([Option<T>; TenorBucket::COUNT]);

impl<T> TenorGrid<T> {
    pub fn get(&self, bucket: TenorBucket) -> Option<&T> {
        self.0[bucket.index()].as_ref()
    }

    pub fn set(&mut self, bucket: TenorBucket, value: T) {
        self.0[bucket.index()] = Some(value);
    }

    /// Iterate buckets in nominal-day order with their optional values.
    pub fn iter(&self) -> impl Iterator<Item = (TenorBucket, Option<&T>)> {
        TenorBucket::ALL
            .iter()
            .map(move |&bucket| (bucket, self.get(bucket)))
    }

    /// Number of populated buckets.
    pub fn populated(&self) -> usize {
        self.0.iter().filter(|slot| slot.is_some()).count()
    }

    /// Project each populated value through `f`.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> TenorGrid<U> {
        TenorGrid(std::array::from_fn(|i| self.0[i].as_ref().map(&f)))
    }
}

impl<T> Default for TenorGrid<T> {
    fn default() -> Self {
        Self(std::array::from_fn(|_| None))
    }
}

impl<T> Index<TenorBucket> for TenorGrid<T> {
    type Output = Option<T>;

    fn index(&self, bucket: TenorBucket) -> &Self::Output {
        &self.0[bucket.index()]
    }
}

impl<T: Serialize> Serialize for TenorGrid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TenorBucket::COUNT))?;
        for (bucket, value) in self.iter() {
            map.serialize_entry(&bucket.nominal_days().to_string(), &value)?;
        }
        map.end()
    }
}

/// The contract occupying one bucket of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketedContract {
    /// Actual days to expiry realized at this bucket
    pub days_to_expiry: i64,

    /// Annualized premium carried through from the observation
    pub annualized_pct: f64,

    /// Contract mark price
    pub future_price: Decimal,
}

impl BucketedContract {
    fn from_observation(obs: &Observation) -> Self {
        Self {
            days_to_expiry: obs.days_to_expiry,
            annualized_pct: obs.annualized_pct,
            future_price: obs.future_price,
        }
    }
}

/// One snapshot's curve after bucketing.
#[derive(Debug, Clone)]
pub struct SnapshotCurve {
    pub snapshot_time: DateTime<Utc>,
    pub spot_price: Decimal,
    pub contracts: TenorGrid<BucketedContract>,
}

/// Group observations by snapshot time, preserving input order within each
/// group (ties in later rank sorts resolve to input order).
pub fn group_by_snapshot(
    observations: &[Observation],
) -> BTreeMap<DateTime<Utc>, Vec<&Observation>> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.snapshot_time).or_default().push(obs);
    }
    groups
}

/// Select the anchor contract: minimum distance to `anchor_days`, ties
/// broken by smaller days to expiry, then by input order.
pub fn select_anchor<'a>(rows: &[&'a Observation], anchor_days: i64) -> Option<&'a Observation> {
    rows.iter()
        .min_by_key(|obs| ((obs.days_to_expiry - anchor_days).abs(), obs.days_to_expiry))
        .copied()
}

/// Rank-based assignment of each snapshot's contracts to canonical buckets.
#[derive(Debug, Clone)]
pub struct TenorBucketizer {
    anchor_days: i64,
}

impl Default for TenorBucketizer {
    fn default() -> Self {
        Self {
            anchor_days: ANCHOR_TENOR_DAYS,
        }
    }
}

impl TenorBucketizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor_days(anchor_days: i64) -> Self {
        Self { anchor_days }
    }

    /// Bucketize all observations, one curve per snapshot time, ascending.
    pub fn bucketize(&self, observations: &[Observation]) -> Vec<SnapshotCurve> {
        group_by_snapshot(observations)
            .into_iter()
            .filter_map(|(snapshot_time, rows)| {
                let anchor = select_anchor(&rows, self.anchor_days)?;
                let mut contracts = TenorGrid::default();
                contracts.set(TenorBucket::T270, BucketedContract::from_observation(anchor));

                // Contracts at the anchor's exact expiry (the anchor itself
                // included) belong to neither side.
                let mut below: Vec<&Observation> = rows
                    .iter()
                    .copied()
                    .filter(|obs| obs.days_to_expiry < anchor.days_to_expiry)
                    .collect();
                let mut above: Vec<&Observation> = rows
                    .iter()
                    .copied()
                    .filter(|obs| obs.days_to_expiry > anchor.days_to_expiry)
                    .collect();

                // Closest-to-anchor first on both sides.
                below.sort_by(|a, b| b.days_to_expiry.cmp(&a.days_to_expiry));
                above.sort_by(|a, b| a.days_to_expiry.cmp(&b.days_to_expiry));

                for (i, obs) in below.iter().enumerate() {
                    match TenorBucket::from_below_rank(i + 1) {
                        Some(bucket) => {
                            contracts.set(bucket, BucketedContract::from_observation(obs))
                        }
                        None => break,
                    }
                }
                if let Some(first_above) = above.first() {
                    contracts.set(
                        TenorBucket::T360,
                        BucketedContract::from_observation(first_above),
                    );
                }

                Some(SnapshotCurve {
                    snapshot_time,
                    spot_price: anchor.spot_price,
                    contracts,
                })
            })
            .collect()
    }
}
