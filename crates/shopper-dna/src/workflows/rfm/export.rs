use super::domain::{CustomerMetrics, CustomerSegment, RfmScores, ScoredCustomer, SegmentedCustomer};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to access results file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid results CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("results row {row}: rfm_code '{found}' does not match scores {expected}")]
    InconsistentRow {
        row: u64,
        found: String,
        expected: String,
    },
}

/// Flat row layout of `rfm_results.csv`.
#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    customer_id: String,
    customer_name: Option<String>,
    last_order_date: NaiveDate,
    recency_days: i64,
    frequency: u32,
    #[serde(with = "rust_decimal::serde::str")]
    monetary_value: Decimal,
    r_score: u8,
    f_score: u8,
    m_score: u8,
    rfm_code: String,
    customer_segment: CustomerSegment,
}

impl From<&SegmentedCustomer> for ResultRow {
    fn from(customer: &SegmentedCustomer) -> Self {
        let metrics = customer.metrics();
        let scores = customer.scores();
        Self {
            customer_id: metrics.customer_id.clone(),
            customer_name: metrics.customer_name.clone(),
            last_order_date: metrics.last_order_date,
            recency_days: metrics.recency_days,
            frequency: metrics.frequency,
            monetary_value: metrics.monetary_value,
            r_score: scores.recency,
            f_score: scores.frequency,
            m_score: scores.monetary,
            rfm_code: scores.code(),
            customer_segment: customer.customer_segment,
        }
    }
}

impl ResultRow {
    fn into_customer(self, row: u64) -> Result<SegmentedCustomer, ExportError> {
        let scores = RfmScores::new(self.r_score, self.f_score, self.m_score);
        if scores.code() != self.rfm_code {
            return Err(ExportError::InconsistentRow {
                row,
                found: self.rfm_code,
                expected: scores.code(),
            });
        }

        Ok(SegmentedCustomer {
            scored: ScoredCustomer {
                metrics: CustomerMetrics {
                    customer_id: self.customer_id,
                    customer_name: self.customer_name,
                    last_order_date: self.last_order_date,
                    recency_days: self.recency_days,
                    frequency: self.frequency,
                    monetary_value: self.monetary_value,
                },
                scores,
            },
            customer_segment: self.customer_segment,
        })
    }
}

/// Writes the segmented customer table for downstream consumers.
pub struct ResultsWriter;

impl ResultsWriter {
    pub fn to_path<P: AsRef<Path>>(
        path: P,
        customers: &[SegmentedCustomer],
    ) -> Result<(), ExportError> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        Self::to_writer(file, customers)?;
        info!(path = %path.display(), rows = customers.len(), "wrote rfm results");
        Ok(())
    }

    pub fn to_writer<W: Write>(writer: W, customers: &[SegmentedCustomer]) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for customer in customers {
            csv_writer.serialize(ResultRow::from(customer))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

pub fn read_results_path<P: AsRef<Path>>(path: P) -> Result<Vec<SegmentedCustomer>, ExportError> {
    let file = std::fs::File::open(path)?;
    read_results(file)
}

pub fn read_results<R: Read>(reader: R) -> Result<Vec<SegmentedCustomer>, ExportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut customers = Vec::new();

    for (index, record) in csv_reader.deserialize::<ResultRow>().enumerate() {
        let row = record?;
        // header is line 1
        customers.push(row.into_customer(index as u64 + 2)?);
    }

    Ok(customers)
}

/// Writes the plain-text segment summary (`summary.txt`).
pub fn write_summary_path<P: AsRef<Path>>(path: P, summary_table: &str) -> Result<(), ExportError> {
    let path = path.as_ref();
    std::fs::write(path, summary_table)?;
    info!(path = %path.display(), "wrote segment summary");
    Ok(())
}
