//! Term-structure analytics module.
//!
//! Provides:
//! - Canonical tenor bucketing around the 270-day anchor
//! - Annualized premium projection and median-deviation signals
//! - Forward log returns and premium/return cross-correlations
//! - The master join producing one denormalized record per snapshot

pub mod correlation;
pub mod master;
pub mod median;
pub mod premium;
pub mod report;
pub mod returns;
pub mod tenor;

pub use correlation::{
    pearson, CorrelationCurve, CrossCorrelationEngine, ReturnHorizon, DEFAULT_MIN_PERIODS_F1,
    DEFAULT_MIN_PERIODS_F5,
};
pub use master::{analyze, analyze_by_asset, AnalyticsRecord, MasterAnalysis, MasterJoiner};
pub use median::{median, DeviationCurve, MedianDeviationCalculator};
pub use premium::{PremiumCurve, PremiumDeriver};
pub use report::{AnalysisReport, Precision};
pub use returns::{
    forward_log_returns, spot_series, ForwardReturn, ForwardReturnCalculator, F1_HORIZON,
    F5_HORIZON,
};
pub use tenor::{
    select_anchor, BucketedContract, SnapshotCurve, TenorBucket, TenorBucketizer, TenorGrid,
    ANCHOR_TENOR_DAYS,
};
