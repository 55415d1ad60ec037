//! Core data types for term-structure analytics.
//!
//! These types represent one scrape of a futures curve: a spot price plus
//! the listed contracts at varying expiries, normalized into one row per
//! (snapshot, contract) pair.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Days in a year used to annualize premiums.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Premium tolerance (in percent) separating Flat from Contango/Backwardation.
pub const CURVE_SHAPE_TOLERANCE_PCT: f64 = 0.1;

/// Shape of the futures curve implied by a contract's premium over spot.
///
/// Informational only; the analytics algorithms never consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveShape {
    /// Premium above +tolerance (futures richer than spot).
    Contango,
    /// Premium below -tolerance (futures cheaper than spot).
    Backwardation,
    /// Premium within tolerance of zero.
    Flat,
}

impl CurveShape {
    /// Classify from a raw (non-annualized) premium percentage.
    pub fn classify(premium_pct: f64) -> Self {
        if premium_pct < -CURVE_SHAPE_TOLERANCE_PCT {
            Self::Backwardation
        } else if premium_pct <= CURVE_SHAPE_TOLERANCE_PCT {
            Self::Flat
        } else {
            Self::Contango
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contango => "Contango",
            Self::Backwardation => "Backwardation",
            Self::Flat => "Flat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Contango" => Some(Self::Contango),
            "Backwardation" => Some(Self::Backwardation),
            "Flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

/// A single futures contract observation at a point in time.
///
/// This is the fundamental unit of input data. One scrape of an asset's
/// curve produces one `Observation` per listed contract, all sharing the
/// same `snapshot_time` and `spot_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Scrape run this row belongs to (bookkeeping only)
    pub run_id: i64,

    /// Asset symbol (e.g., "BTC")
    pub asset: String,

    /// Moment this batch of contracts was captured
    pub snapshot_time: DateTime<Utc>,

    /// Contract expiry date
    pub expiry_date: Option<NaiveDate>,

    /// Days until expiry (contracts under 1 day are excluded upstream)
    pub days_to_expiry: i64,

    /// Reference (perpetual/spot) price at `snapshot_time`
    pub spot_price: Decimal,

    /// Contract mark price
    pub future_price: Decimal,

    /// Open interest
    pub open_interest: i64,

    /// Raw premium of future over spot, in percent
    pub premium_pct: f64,

    /// Premium normalized to a 365.25-day year, in percent
    pub annualized_pct: f64,

    /// Curve shape implied by `premium_pct`
    pub curve: CurveShape,

    /// Exchange instrument label (bookkeeping only)
    pub instrument_name: String,
}

impl Observation {
    /// Build an observation from prices and expiry, deriving the premium
    /// fields and curve shape.
    #[allow(clippy::too_many_arguments)]
    pub fn from_prices(
        run_id: i64,
        asset: impl Into<String>,
        snapshot_time: DateTime<Utc>,
        expiry_date: Option<NaiveDate>,
        days_to_expiry: i64,
        spot_price: Decimal,
        future_price: Decimal,
        open_interest: i64,
        instrument_name: impl Into<String>,
    ) -> Self {
        let spot: f64 = spot_price.try_into().unwrap_or(0.0);
        let future: f64 = future_price.try_into().unwrap_or(0.0);

        let premium_pct = if spot > 0.0 {
            (future / spot - 1.0) * 100.0
        } else {
            0.0
        };
        let annualized_pct = annualize(premium_pct, days_to_expiry);

        Self {
            run_id,
            asset: asset.into(),
            snapshot_time,
            expiry_date,
            days_to_expiry,
            spot_price,
            future_price,
            open_interest,
            premium_pct,
            annualized_pct,
            curve: CurveShape::classify(premium_pct),
            instrument_name: instrument_name.into(),
        }
    }

    /// Spot price as `f64` for analytics math.
    pub fn spot_f64(&self) -> f64 {
        self.spot_price.try_into().unwrap_or(0.0)
    }
}

/// Normalize a raw premium percentage to a 365.25-day year.
pub fn annualize(premium_pct: f64, days_to_expiry: i64) -> f64 {
    if days_to_expiry < 1 {
        return 0.0;
    }
    premium_pct / (days_to_expiry as f64 / DAYS_PER_YEAR)
}
