//! Data loader for observation files.
//!
//! Loads scraped term-structure rows from parquet or CSV files into the
//! type system for analysis.
//!
//! The files contain normalized rows with one row per futures contract
//! (spot repeated across each snapshot's rows), with the following schema:
//! - run_main_id, asset, ran_at_utc
//! - spot_price, expiry_date, days_to_expiry, future_price, open_interest
//! - premium_pct, annualized_pct, curve, instrument_name

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use super::types::{CurveShape, Observation};

/// Expected columns in observation files.
pub const EXPECTED_COLUMNS: &[&str] = &[
    "run_main_id",
    "asset",
    "ran_at_utc",
    "spot_price",
    "expiry_date",
    "days_to_expiry",
    "future_price",
    "open_interest",
    "premium_pct",
    "annualized_pct",
    "curve",
    "instrument_name",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loader for normalized observation files.
pub struct DataLoader {
    path: PathBuf,
}

impl DataLoader {
    /// Create a loader for a parquet or CSV observation file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Scan the file lazily, dispatching on extension.
    pub fn load_lazy(&self) -> Result<LazyFrame, LoaderError> {
        if !self.path.exists() {
            return Err(LoaderError::FileNotFound(
                self.path.display().to_string(),
            ));
        }

        match self.path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => {
                let lf = LazyFrame::scan_parquet(&self.path, ScanArgsParquet::default())?;
                Ok(lf)
            }
            Some("csv") => {
                let lf = LazyCsvReader::new(&self.path)
                    .with_has_header(true)
                    .finish()?;
                Ok(lf)
            }
            other => Err(LoaderError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Load every observation row in the file.
    pub fn load(&self) -> Result<Vec<Observation>, LoaderError> {
        let df = self.load_lazy()?.collect()?;
        dataframe_to_observations(&df)
    }

    /// Load observation rows for a single asset.
    pub fn load_asset(&self, asset: &str) -> Result<Vec<Observation>, LoaderError> {
        let df = self
            .load_lazy()?
            .filter(col("asset").eq(lit(asset)))
            .collect()?;
        dataframe_to_observations(&df)
    }

    /// List distinct asset symbols present in the file.
    pub fn assets(&self) -> Result<Vec<String>, LoaderError> {
        let df = self.load_lazy()?.select([col("asset")]).collect()?;
        let col = df.column("asset")?;

        let mut assets: Vec<String> = col
            .str()?
            .into_iter()
            .flatten()
            .map(|s| s.to_string())
            .collect();
        assets.sort();
        assets.dedup();
        Ok(assets)
    }
}

/// Parse a snapshot timestamp from its string form.
///
/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the `T`-separated variant, and a
/// bare date (interpreted as midnight UTC).
fn parse_snapshot_time(s: &str) -> Option<DateTime<Utc>> {
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Read a timestamp cell, handling string and native datetime columns.
fn get_time(column: &Column, idx: usize) -> Option<DateTime<Utc>> {
    if let Ok(str_col) = column.str() {
        return str_col.get(idx).and_then(parse_snapshot_time);
    }
    if let Ok(dt_col) = column.datetime() {
        let raw = dt_col.get(idx)?;
        return match dt_col.time_unit() {
            TimeUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
            TimeUnit::Microseconds => DateTime::from_timestamp_micros(raw),
            TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(raw)),
        };
    }
    None
}

/// Read a numeric cell as f64, handling float and integer columns.
fn get_f64(column: &Column, idx: usize) -> Option<f64> {
    if let Ok(c) = column.f64() {
        return c.get(idx);
    }
    if let Ok(c) = column.i64() {
        return c.get(idx).map(|v| v as f64);
    }
    if let Ok(c) = column.i32() {
        return c.get(idx).map(|v| v as f64);
    }
    None
}

/// Read a numeric cell as i64, handling integer and float columns.
fn get_i64(column: &Column, idx: usize) -> Option<i64> {
    if let Ok(c) = column.i64() {
        return c.get(idx);
    }
    if let Ok(c) = column.i32() {
        return c.get(idx).map(|v| v as i64);
    }
    if let Ok(c) = column.f64() {
        return c.get(idx).map(|v| v as i64);
    }
    None
}

fn get_str(column: &Column, idx: usize) -> Option<&str> {
    column.str().ok().and_then(|c| c.get(idx))
}

/// Convert a DataFrame of scraped rows to observations.
///
/// Rows missing the snapshot time, days-to-expiry, spot price, or
/// annualized premium are dropped and counted, never aborting the load.
pub fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<Observation>, LoaderError> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let time_col = df.column("ran_at_utc")?;
    let days_col = df.column("days_to_expiry")?;
    let spot_col = df.column("spot_price")?;
    let ann_col = df.column("annualized_pct")?;

    // Optional bookkeeping columns
    let run_col = df.column("run_main_id").ok();
    let asset_col = df.column("asset").ok();
    let expiry_col = df.column("expiry_date").ok();
    let future_col = df.column("future_price").ok();
    let oi_col = df.column("open_interest").ok();
    let prem_col = df.column("premium_pct").ok();
    let curve_col = df.column("curve").ok();
    let inst_col = df.column("instrument_name").ok();

    let mut observations = Vec::with_capacity(df.height());
    let mut dropped = 0usize;

    for idx in 0..df.height() {
        let snapshot_time = get_time(time_col, idx);
        let days_to_expiry = get_i64(days_col, idx);
        let spot = get_f64(spot_col, idx).filter(|v| v.is_finite());
        let annualized_pct = get_f64(ann_col, idx).filter(|v| v.is_finite());

        let (Some(snapshot_time), Some(days_to_expiry), Some(spot), Some(annualized_pct)) =
            (snapshot_time, days_to_expiry, spot, annualized_pct)
        else {
            dropped += 1;
            continue;
        };

        let future = future_col
            .and_then(|c| get_f64(c, idx))
            .unwrap_or(0.0);
        let premium_pct = prem_col.and_then(|c| get_f64(c, idx)).unwrap_or(0.0);

        let expiry_date = expiry_col
            .and_then(|c| get_str(c, idx))
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        let curve = curve_col
            .and_then(|c| get_str(c, idx))
            .and_then(CurveShape::from_str)
            .unwrap_or_else(|| CurveShape::classify(premium_pct));

        observations.push(Observation {
            run_id: run_col.and_then(|c| get_i64(c, idx)).unwrap_or(0),
            asset: asset_col
                .and_then(|c| get_str(c, idx))
                .unwrap_or("")
                .to_string(),
            snapshot_time,
            expiry_date,
            days_to_expiry,
            spot_price: Decimal::from_f64_retain(spot).unwrap_or_default(),
            future_price: Decimal::from_f64_retain(future).unwrap_or_default(),
            open_interest: oi_col.and_then(|c| get_i64(c, idx)).unwrap_or(0),
            premium_pct,
            annualized_pct,
            curve,
            instrument_name: inst_col
                .and_then(|c| get_str(c, idx))
                .unwrap_or("")
                .to_string(),
        });
    }

    if dropped > 0 {
        warn!(
            "Dropped {} of {} rows with missing time/days/spot/premium",
            dropped,
            df.height()
        );
    }

    Ok(observations)
}
