pub mod analytics;
pub mod data;

// Re-export commonly used types
pub use analytics::{
    analyze, analyze_by_asset, AnalysisReport, AnalyticsRecord, CrossCorrelationEngine,
    ForwardReturnCalculator, MasterAnalysis, MasterJoiner, MedianDeviationCalculator, Precision,
    PremiumDeriver, ReturnHorizon, TenorBucket, TenorBucketizer, TenorGrid,
};
pub use data::{CurveShape, DataLoader, LoaderError, Observation};
