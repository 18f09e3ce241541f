use super::super::domain::{CustomerSegment, RfmScores};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive score interval used by a rule column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

impl ScoreRange {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    pub const fn any(buckets: u8) -> Self {
        Self::new(1, buckets)
    }

    pub const fn contains(self, score: u8) -> bool {
        self.min <= score && score <= self.max
    }

    fn fits(self, buckets: u8) -> bool {
        1 <= self.min && self.min <= self.max && self.max <= buckets
    }
}

/// One row of the decision table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRule {
    pub segment: CustomerSegment,
    pub recency: ScoreRange,
    pub frequency: ScoreRange,
    pub monetary: ScoreRange,
}

impl SegmentRule {
    pub fn matches(&self, scores: RfmScores) -> bool {
        self.recency.contains(scores.recency)
            && self.frequency.contains(scores.frequency)
            && self.monetary.contains(scores.monetary)
    }
}

/// Ordered decision table; the first matching row decides the segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<SegmentRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<SegmentRule>) -> Self {
        Self { rules }
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleTableError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RuleTableError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn rules(&self) -> &[SegmentRule] {
        &self.rules
    }

    pub fn first_match(&self, scores: RfmScores) -> Option<&SegmentRule> {
        self.rules.iter().find(|rule| rule.matches(scores))
    }

    /// Audits the table against the whole `buckets³` score space.
    pub fn validate(&self, buckets: u8) -> Result<(), RuleTableError> {
        if self.rules.is_empty() {
            return Err(RuleTableError::Empty);
        }

        for (index, rule) in self.rules.iter().enumerate() {
            for range in [rule.recency, rule.frequency, rule.monetary] {
                if !range.fits(buckets) {
                    return Err(RuleTableError::RangeOutOfBounds {
                        index,
                        segment: rule.segment.label(),
                        min: range.min,
                        max: range.max,
                        buckets,
                    });
                }
            }
        }

        for recency in 1..=buckets {
            for frequency in 1..=buckets {
                for monetary in 1..=buckets {
                    let scores = RfmScores::new(recency, frequency, monetary);
                    if self.first_match(scores).is_none() {
                        return Err(RuleTableError::Uncovered {
                            recency,
                            frequency,
                            monetary,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleTableError {
    #[error("rule table has no rules")]
    Empty,
    #[error("rule {index} ({segment}) uses range {min}..={max}, outside 1..={buckets}")]
    RangeOutOfBounds {
        index: usize,
        segment: &'static str,
        min: u8,
        max: u8,
        buckets: u8,
    },
    #[error("no rule matches scores r={recency} f={frequency} m={monetary}")]
    Uncovered {
        recency: u8,
        frequency: u8,
        monetary: u8,
    },
    #[error("failed to read rule table: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed rule table JSON: {0}")]
    Json(#[from] serde_json::Error),
}
