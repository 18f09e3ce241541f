use super::super::domain::CustomerSegment;
use super::rules::{RuleTable, ScoreRange, SegmentRule};

/// Band edges on an N-point scale. On the default five-point scale this gives
/// high 4-5, mid 3-5, low 1-2 and engaged 2-5.
#[derive(Debug, Clone, Copy)]
struct Bands {
    buckets: u8,
    high: u8,
    mid: u8,
    low_max: u8,
    engaged: u8,
}

impl Bands {
    fn for_buckets(buckets: u8) -> Self {
        let n = u16::from(buckets);
        let edge = |value: u16| u8::try_from(value).unwrap_or(buckets);
        Self {
            buckets,
            high: edge(3 * n / 5 + 1).min(buckets),
            mid: edge(2 * n / 5 + 1).min(buckets),
            low_max: edge(2 * n / 5).max(1),
            engaged: edge(n / 5 + 1),
        }
    }

    fn high(self) -> ScoreRange {
        ScoreRange::new(self.high, self.buckets)
    }

    fn mid_up(self) -> ScoreRange {
        ScoreRange::new(self.mid, self.buckets)
    }

    fn low(self) -> ScoreRange {
        ScoreRange::new(1, self.low_max)
    }

    fn engaged(self) -> ScoreRange {
        ScoreRange::new(self.engaged, self.buckets)
    }

    fn lapsing(self) -> ScoreRange {
        ScoreRange::new(self.engaged, self.high.saturating_sub(1).max(self.engaged))
    }

    fn any(self) -> ScoreRange {
        ScoreRange::any(self.buckets)
    }
}

/// Lost Customers is the catch-all row, so besides all-low profiles it also
/// takes mixed ones no earlier row claims, e.g. `(3, 1, 5)` on five points.
pub(crate) fn standard_table(buckets: u8) -> RuleTable {
    let bands = Bands::for_buckets(buckets);
    let rule = |segment, recency, frequency, monetary| SegmentRule {
        segment,
        recency,
        frequency,
        monetary,
    };

    RuleTable::new(vec![
        rule(CustomerSegment::Champions, bands.high(), bands.high(), bands.high()),
        rule(CustomerSegment::LoyalCustomers, bands.mid_up(), bands.high(), bands.high()),
        rule(CustomerSegment::PotentialLoyalists, bands.high(), bands.engaged(), bands.engaged()),
        rule(CustomerSegment::RecentCustomers, bands.high(), bands.any(), bands.any()),
        rule(CustomerSegment::AtRisk, bands.low(), bands.mid_up(), bands.mid_up()),
        rule(CustomerSegment::NeedsAttention, bands.lapsing(), bands.engaged(), bands.engaged()),
        rule(CustomerSegment::LostCustomers, bands.any(), bands.any(), bands.any()),
    ])
}
