//! Recency/frequency/monetary segmentation: aggregate order lines per
//! customer, score each metric against the run's quantiles and classify the
//! score triple through an ordered rule table.

pub mod aggregate;
pub mod domain;
mod engine;
pub mod export;
pub mod report;
pub mod scoring;
pub mod segments;

pub use domain::{
    CustomerMetrics, CustomerSegment, InvalidRecord, OrderBatch, OrderRecord, RejectedRecord,
    RfmError, RfmScores, ScoredCustomer, SegmentedCustomer,
};
pub use engine::{AsOf, RfmConfig, RfmEngine, RfmRun};
pub use export::{read_results, read_results_path, write_summary_path, ExportError, ResultsWriter};
pub use report::SegmentReport;
pub use scoring::{Metric, MetricThresholds, QuantileScorer, DEFAULT_BUCKETS, MAX_BUCKETS};
pub use segments::{RuleTable, RuleTableError, ScoreRange, SegmentClassifier, SegmentRule};
