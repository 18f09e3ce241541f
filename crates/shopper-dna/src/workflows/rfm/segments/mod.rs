mod rules;
mod standard;

pub use rules::{RuleTable, RuleTableError, ScoreRange, SegmentRule};

use super::domain::{CustomerSegment, RfmError, RfmScores};

impl RuleTable {
    /// Default decision table scaled to `buckets` score levels.
    pub fn standard(buckets: u8) -> Self {
        standard::standard_table(buckets)
    }
}

/// Stateless classifier over an audited rule table.
#[derive(Debug, Clone)]
pub struct SegmentClassifier {
    table: RuleTable,
    buckets: u8,
}

impl SegmentClassifier {
    pub fn new(table: RuleTable, buckets: u8) -> Result<Self, RfmError> {
        table.validate(buckets)?;
        Ok(Self { table, buckets })
    }

    pub fn standard(buckets: u8) -> Result<Self, RfmError> {
        Self::new(RuleTable::standard(buckets), buckets)
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn classify(&self, scores: RfmScores) -> Result<CustomerSegment, RfmError> {
        let range = 1..=self.buckets;
        if ![scores.recency, scores.frequency, scores.monetary]
            .iter()
            .all(|score| range.contains(score))
        {
            return Err(RfmError::UnreachableState {
                detail: format!(
                    "score triple {} outside 1..={}",
                    scores.code(),
                    self.buckets
                ),
            });
        }

        self.table
            .first_match(scores)
            .map(|rule| rule.segment)
            .ok_or_else(|| RfmError::UnreachableState {
                detail: format!("no segment rule matched scores {}", scores.code()),
            })
    }
}
