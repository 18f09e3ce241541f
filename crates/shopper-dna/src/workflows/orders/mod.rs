//! CSV import of order lines (Superstore-style exports).
//!
//! Rows that fail validation are kept on the batch as [`RejectedRecord`]s so
//! callers can report them; only structural problems abort the import.

mod normalizer;
mod parser;

use crate::workflows::rfm::domain::{OrderBatch, RejectedRecord};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
pub enum OrderImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumn(&'static str),
}

impl std::fmt::Display for OrderImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderImportError::Io(err) => write!(f, "failed to read order export: {}", err),
            OrderImportError::Csv(err) => write!(f, "invalid order CSV data: {}", err),
            OrderImportError::MissingColumn(column) => {
                write!(f, "order export is missing required column '{}'", column)
            }
        }
    }
}

impl std::error::Error for OrderImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrderImportError::Io(err) => Some(err),
            OrderImportError::Csv(err) => Some(err),
            OrderImportError::MissingColumn(_) => None,
        }
    }
}

impl From<std::io::Error> for OrderImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for OrderImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct OrderImporter;

impl OrderImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<OrderBatch, OrderImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let batch = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            records = batch.records.len(),
            rejected = batch.rejected.len(),
            "imported order export"
        );
        Ok(batch)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<OrderBatch, OrderImportError> {
        let batch = parser::parse_orders(reader)?;
        if let Some(first) = batch.rejected.first() {
            warn!(
                rejected = batch.rejected.len(),
                first_row = first.row,
                "order export contains invalid rows"
            );
        }
        Ok(batch)
    }
}

/// Rejections grouped by reason kind, for one-line summaries.
pub fn rejection_counts(rejected: &[RejectedRecord]) -> Vec<(&'static str, usize)> {
    let mut counts: std::collections::BTreeMap<&'static str, usize> = Default::default();
    for record in rejected {
        *counts.entry(record.reason.kind()).or_default() += 1;
    }
    counts.into_iter().collect()
}
