use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::segments::RuleTableError;

/// A single cleaned order line as handed over by the order store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub order_id: String,
    pub order_date: NaiveDate,
    pub line_revenue: Decimal,
    /// CSV line the record was read from, when it came from an export.
    #[serde(skip)]
    pub source_line: Option<u64>,
}

impl OrderRecord {
    pub fn new(
        customer_id: impl Into<String>,
        order_id: impl Into<String>,
        order_date: NaiveDate,
        line_revenue: Decimal,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            customer_name: None,
            order_id: order_id.into(),
            order_date,
            line_revenue,
            source_line: None,
        }
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_source_line(mut self, line: u64) -> Self {
        self.source_line = Some(line);
        self
    }

    /// Checks the typed invariants that survive parsing. `reference_date` is
    /// only set when the run uses a fixed as-of date.
    pub(crate) fn validate(&self, reference_date: Option<NaiveDate>) -> Result<(), InvalidRecord> {
        if self.customer_id.trim().is_empty() {
            return Err(InvalidRecord::MissingCustomerId);
        }
        if self.order_id.trim().is_empty() {
            return Err(InvalidRecord::MissingOrderId);
        }
        if self.line_revenue < Decimal::ZERO {
            return Err(InvalidRecord::NegativeRevenue {
                value: self.line_revenue,
            });
        }
        if let Some(reference_date) = reference_date {
            if self.order_date > reference_date {
                return Err(InvalidRecord::AfterReferenceDate {
                    order_date: self.order_date,
                    reference_date,
                });
            }
        }
        Ok(())
    }
}

/// Reason an order line was refused before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidRecord {
    #[error("missing customer id")]
    MissingCustomerId,
    #[error("missing order id")]
    MissingOrderId,
    #[error("missing order date")]
    MissingOrderDate,
    #[error("unparseable order date '{value}'")]
    UnparseableDate { value: String },
    #[error("missing line revenue")]
    MissingRevenue,
    #[error("non-numeric line revenue '{value}'")]
    NonNumericRevenue { value: String },
    #[error("negative line revenue {value}")]
    NegativeRevenue { value: Decimal },
    #[error("order dated {order_date} falls after the as-of date {reference_date}")]
    AfterReferenceDate {
        order_date: NaiveDate,
        reference_date: NaiveDate,
    },
    #[error("unreadable row: {detail}")]
    MalformedRow { detail: String },
}

impl InvalidRecord {
    /// Same tag used for the serialized `kind` field.
    pub const fn kind(&self) -> &'static str {
        match self {
            InvalidRecord::MissingCustomerId => "missing_customer_id",
            InvalidRecord::MissingOrderId => "missing_order_id",
            InvalidRecord::MissingOrderDate => "missing_order_date",
            InvalidRecord::UnparseableDate { .. } => "unparseable_date",
            InvalidRecord::MissingRevenue => "missing_revenue",
            InvalidRecord::NonNumericRevenue { .. } => "non_numeric_revenue",
            InvalidRecord::NegativeRevenue { .. } => "negative_revenue",
            InvalidRecord::AfterReferenceDate { .. } => "after_reference_date",
            InvalidRecord::MalformedRow { .. } => "malformed_row",
        }
    }
}

/// A rejected input row together with whatever identity it carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// CSV line number for imported rows, 1-based position for records built
    /// in memory.
    pub row: u64,
    pub customer_id: Option<String>,
    pub order_id: Option<String>,
    pub reason: InvalidRecord,
}

/// Records accepted by the order store plus the rows it already refused.
#[derive(Debug, Clone, Default)]
pub struct OrderBatch {
    pub records: Vec<OrderRecord>,
    pub rejected: Vec<RejectedRecord>,
}

impl From<Vec<OrderRecord>> for OrderBatch {
    fn from(records: Vec<OrderRecord>) -> Self {
        Self {
            records,
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMetrics {
    pub customer_id: String,
    pub customer_name: Option<String>,
    pub last_order_date: NaiveDate,
    pub recency_days: i64,
    pub frequency: u32,
    pub monetary_value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RfmScores {
    #[serde(rename = "r_score")]
    pub recency: u8,
    #[serde(rename = "f_score")]
    pub frequency: u8,
    #[serde(rename = "m_score")]
    pub monetary: u8,
}

impl RfmScores {
    pub const fn new(recency: u8, frequency: u8, monetary: u8) -> Self {
        Self {
            recency,
            frequency,
            monetary,
        }
    }

    /// Concatenated cell code, e.g. `"545"`.
    pub fn code(&self) -> String {
        format!("{}{}{}", self.recency, self.frequency, self.monetary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    #[serde(flatten)]
    pub metrics: CustomerMetrics,
    #[serde(flatten)]
    pub scores: RfmScores,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedCustomer {
    #[serde(flatten)]
    pub scored: ScoredCustomer,
    pub customer_segment: CustomerSegment,
}

impl SegmentedCustomer {
    pub fn metrics(&self) -> &CustomerMetrics {
        &self.scored.metrics
    }

    pub fn scores(&self) -> RfmScores {
        self.scored.scores
    }

    pub fn customer_id(&self) -> &str {
        &self.scored.metrics.customer_id
    }

    pub fn rfm_code(&self) -> String {
        self.scored.scores.code()
    }
}

/// Closed set of behavioral segments consumed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerSegment {
    #[serde(rename = "Champions")]
    Champions,
    #[serde(rename = "Loyal Customers")]
    LoyalCustomers,
    #[serde(rename = "Potential Loyalists")]
    PotentialLoyalists,
    #[serde(rename = "Recent Customers")]
    RecentCustomers,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    #[serde(rename = "Lost Customers")]
    LostCustomers,
}

impl CustomerSegment {
    /// Precedence order of the standard rule table.
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Champions,
            Self::LoyalCustomers,
            Self::PotentialLoyalists,
            Self::RecentCustomers,
            Self::AtRisk,
            Self::NeedsAttention,
            Self::LostCustomers,
        ]
    }

    /// Order used by charts and distribution listings.
    pub const fn display_order() -> [Self; 7] {
        [
            Self::Champions,
            Self::LoyalCustomers,
            Self::PotentialLoyalists,
            Self::RecentCustomers,
            Self::AtRisk,
            Self::LostCustomers,
            Self::NeedsAttention,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Champions => "Champions",
            Self::LoyalCustomers => "Loyal Customers",
            Self::PotentialLoyalists => "Potential Loyalists",
            Self::RecentCustomers => "Recent Customers",
            Self::AtRisk => "At Risk",
            Self::NeedsAttention => "Needs Attention",
            Self::LostCustomers => "Lost Customers",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ordered()
            .into_iter()
            .find(|segment| segment.label().eq_ignore_ascii_case(trimmed))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RfmError {
    #[error("no valid order records to analyze")]
    EmptyDataset,
    #[error("scorer/classifier contract violated: {detail}")]
    UnreachableState { detail: String },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid segment rule table: {0}")]
    Rules(#[from] RuleTableError),
    #[error("{metric} exceeds the exact decimal range: {detail}")]
    MetricOverflow { metric: &'static str, detail: String },
}
