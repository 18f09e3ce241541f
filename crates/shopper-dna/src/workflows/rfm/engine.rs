use super::aggregate::{aggregate, latest_order_date};
use super::domain::{OrderBatch, OrderRecord, RejectedRecord, RfmError, SegmentedCustomer};
use super::report::SegmentReport;
use super::scoring::{Metric, MetricThresholds, QuantileScorer, DEFAULT_BUCKETS};
use super::segments::{RuleTable, SegmentClassifier};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// How the run's reference ("analysis") date is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsOf {
    /// Latest order date among the valid records.
    #[default]
    MaxOrderDate,
    /// The local calendar date when the run starts.
    Today,
    Fixed(NaiveDate),
}

impl AsOf {
    fn fixed_date(self) -> Option<NaiveDate> {
        match self {
            AsOf::MaxOrderDate => None,
            AsOf::Today => Some(Local::now().date_naive()),
            AsOf::Fixed(date) => Some(date),
        }
    }
}

impl FromStr for AsOf {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "max" | "latest" => Ok(AsOf::MaxOrderDate),
            "today" | "now" => Ok(AsOf::Today),
            _ => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(AsOf::Fixed)
                .map_err(|err| {
                    format!("failed to parse '{raw}' as YYYY-MM-DD, 'today' or 'max' ({err})")
                }),
        }
    }
}

impl fmt::Display for AsOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsOf::MaxOrderDate => write!(f, "max order date"),
            AsOf::Today => write!(f, "today"),
            AsOf::Fixed(date) => write!(f, "{date}"),
        }
    }
}

/// Engine settings threaded explicitly through each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfmConfig {
    pub buckets: u8,
    pub as_of: AsOf,
    /// Falls back to [`RuleTable::standard`] for `buckets` when absent.
    pub rules: Option<RuleTable>,
}

impl Default for RfmConfig {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            as_of: AsOf::default(),
            rules: None,
        }
    }
}

/// Output of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RfmRun {
    pub reference_date: NaiveDate,
    pub buckets: u8,
    pub thresholds: Vec<MetricThresholds>,
    pub customers: Vec<SegmentedCustomer>,
    pub rejected: Vec<RejectedRecord>,
}

impl RfmRun {
    pub fn report(&self) -> SegmentReport {
        SegmentReport::build(&self.customers)
    }
}

/// Aggregate, score and classify a batch of order lines.
#[derive(Debug, Clone)]
pub struct RfmEngine {
    scorer: QuantileScorer,
    classifier: SegmentClassifier,
    as_of: AsOf,
}

impl RfmEngine {
    pub fn new(config: RfmConfig) -> Result<Self, RfmError> {
        let RfmConfig {
            buckets,
            as_of,
            rules,
        } = config;

        let scorer = QuantileScorer::new(buckets)?;
        let table = rules.unwrap_or_else(|| RuleTable::standard(buckets));
        let classifier = SegmentClassifier::new(table, buckets)?;

        Ok(Self {
            scorer,
            classifier,
            as_of,
        })
    }

    pub fn buckets(&self) -> u8 {
        self.scorer.buckets()
    }

    pub fn rules(&self) -> &RuleTable {
        self.classifier.table()
    }

    pub fn run(&self, records: Vec<OrderRecord>) -> Result<RfmRun, RfmError> {
        self.run_batch(OrderBatch::from(records))
    }

    /// Runs over a batch whose loader may already have refused some rows;
    /// those rows are reported alongside the ones refused here. Records that
    /// carry a source line keep it in their rejection, others report their
    /// 1-based position in `records`.
    pub fn run_batch(&self, batch: OrderBatch) -> Result<RfmRun, RfmError> {
        let OrderBatch {
            records,
            mut rejected,
        } = batch;
        info!(
            records = records.len(),
            rejected_upstream = rejected.len(),
            as_of = %self.as_of,
            "starting rfm run"
        );

        let fixed_reference = self.as_of.fixed_date();
        let mut valid = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match record.validate(fixed_reference) {
                Ok(()) => valid.push(record),
                Err(reason) => rejected.push(RejectedRecord {
                    row: record.source_line.unwrap_or(index as u64 + 1),
                    customer_id: Some(record.customer_id).filter(|id| !id.trim().is_empty()),
                    order_id: Some(record.order_id).filter(|id| !id.trim().is_empty()),
                    reason,
                }),
            }
        }

        report_rejections(&rejected);

        let reference_date = match fixed_reference.or_else(|| latest_order_date(&valid)) {
            Some(date) if !valid.is_empty() => date,
            _ => return Err(RfmError::EmptyDataset),
        };

        let metrics = aggregate(&valid, reference_date)?;
        metrics
            .iter()
            .try_fold(Decimal::ZERO, |total, customer| {
                total.checked_add(customer.monetary_value)
            })
            .ok_or_else(|| RfmError::MetricOverflow {
                metric: Metric::Monetary.label(),
                detail: "revenue total across all customers".to_string(),
            })?;
        debug!(customers = metrics.len(), %reference_date, "aggregated customer metrics");

        let thresholds = self.scorer.thresholds(&metrics)?;
        let customers = self
            .scorer
            .score(metrics)?
            .into_iter()
            .map(|scored| {
                let customer_segment = self.classifier.classify(scored.scores)?;
                Ok(SegmentedCustomer {
                    scored,
                    customer_segment,
                })
            })
            .collect::<Result<Vec<_>, RfmError>>()?;

        info!(
            customers = customers.len(),
            rejected = rejected.len(),
            %reference_date,
            "rfm run complete"
        );

        Ok(RfmRun {
            reference_date,
            buckets: self.scorer.buckets(),
            thresholds,
            customers,
            rejected,
        })
    }
}

fn report_rejections(rejected: &[RejectedRecord]) {
    if rejected.is_empty() {
        return;
    }

    warn!(count = rejected.len(), "order records rejected before aggregation");
    for record in rejected {
        warn!(
            row = record.row,
            customer_id = record.customer_id.as_deref().unwrap_or("-"),
            order_id = record.order_id.as_deref().unwrap_or("-"),
            reason = %record.reason,
            "rejected order record"
        );
    }
}
