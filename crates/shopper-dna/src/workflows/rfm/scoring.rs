use super::domain::{CustomerMetrics, RfmError, RfmScores, ScoredCustomer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BUCKETS: u8 = 5;
/// Rule-table audits walk all `buckets³` score triples.
pub const MAX_BUCKETS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl Metric {
    pub const fn ordered() -> [Self; 3] {
        [Self::Recency, Self::Frequency, Self::Monetary]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Recency => "Recency (days)",
            Self::Frequency => "Frequency (orders)",
            Self::Monetary => "Monetary value",
        }
    }

    /// Smaller recency is better, so its buckets are scored in reverse.
    const fn inverted(self) -> bool {
        matches!(self, Self::Recency)
    }

    fn value(self, metrics: &CustomerMetrics) -> Decimal {
        match self {
            Self::Recency => Decimal::from(metrics.recency_days),
            Self::Frequency => Decimal::from(metrics.frequency),
            Self::Monetary => metrics.monetary_value,
        }
    }
}

/// Quantile boundaries computed for one metric in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricThresholds {
    pub metric: Metric,
    pub metric_label: &'static str,
    /// Ascending boundaries between adjacent buckets, `buckets - 1` entries.
    pub cut_points: Vec<Decimal>,
    /// Every customer shared one value and received the middle score.
    pub degenerate: bool,
}

/// Assigns `1..=buckets` scores per metric from distribution-relative
/// quantile cut-points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantileScorer {
    buckets: u8,
}

impl Default for QuantileScorer {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl QuantileScorer {
    pub fn new(buckets: u8) -> Result<Self, RfmError> {
        if !(2..=MAX_BUCKETS).contains(&buckets) {
            return Err(RfmError::InvalidConfig(format!(
                "score buckets must be between 2 and {MAX_BUCKETS}, got {buckets}"
            )));
        }
        Ok(Self { buckets })
    }

    pub const fn buckets(&self) -> u8 {
        self.buckets
    }

    /// Score handed to everyone when a metric has zero variance.
    pub const fn middle_score(&self) -> u8 {
        (self.buckets + 1) / 2
    }

    pub fn thresholds(
        &self,
        customers: &[CustomerMetrics],
    ) -> Result<Vec<MetricThresholds>, RfmError> {
        Metric::ordered()
            .into_iter()
            .map(|metric| {
                CutPoints::compute(metric, customers, self.buckets)
                    .map(|cuts| cuts.describe(metric))
            })
            .collect()
    }

    /// Fails with [`RfmError::MetricOverflow`] when a metric scaled by the
    /// bucket count no longer fits a `Decimal`.
    pub fn score(&self, customers: Vec<CustomerMetrics>) -> Result<Vec<ScoredCustomer>, RfmError> {
        let recency = CutPoints::compute(Metric::Recency, &customers, self.buckets)?;
        let frequency = CutPoints::compute(Metric::Frequency, &customers, self.buckets)?;
        let monetary = CutPoints::compute(Metric::Monetary, &customers, self.buckets)?;

        customers
            .into_iter()
            .map(|metrics| {
                let scores = RfmScores::new(
                    self.score_value(&recency, Metric::Recency, &metrics)?,
                    self.score_value(&frequency, Metric::Frequency, &metrics)?,
                    self.score_value(&monetary, Metric::Monetary, &metrics)?,
                );
                Ok(ScoredCustomer { metrics, scores })
            })
            .collect()
    }

    fn score_value(
        &self,
        cuts: &CutPoints,
        metric: Metric,
        metrics: &CustomerMetrics,
    ) -> Result<u8, RfmError> {
        if cuts.degenerate {
            return Ok(self.middle_score());
        }

        let bucket = cuts
            .bucket(metric.value(metrics))
            .ok_or_else(|| overflow(metric, &metrics.customer_id))?;
        if metric.inverted() {
            Ok(self.buckets + 1 - bucket)
        } else {
            Ok(bucket)
        }
    }
}

fn overflow(metric: Metric, subject: &str) -> RfmError {
    RfmError::MetricOverflow {
        metric: metric.label(),
        detail: format!("{subject} cannot be scaled for exact quantile scoring"),
    }
}

/// Cut-points held multiplied by the bucket count so interpolation stays exact.
struct CutPoints {
    scaled: Vec<Decimal>,
    buckets: u8,
    degenerate: bool,
}

impl CutPoints {
    fn compute(
        metric: Metric,
        customers: &[CustomerMetrics],
        buckets: u8,
    ) -> Result<Self, RfmError> {
        let mut values: Vec<Decimal> = customers
            .iter()
            .map(|customer| metric.value(customer))
            .collect();
        values.sort_unstable();

        let degenerate = values.first() == values.last();
        if values.is_empty() {
            return Ok(Self {
                scaled: Vec::new(),
                buckets,
                degenerate,
            });
        }

        let steps = usize::from(buckets);
        let scale = Decimal::from(buckets);
        let last = values.len() - 1;
        let scaled = (1..steps)
            .map(|k| {
                // linear interpolation at position last * k / buckets
                let position = last * k;
                let lower = position / steps;
                let remainder = position % steps;
                let base = values[lower].checked_mul(scale)?;
                if remainder == 0 {
                    return Some(base);
                }
                values[lower + 1]
                    .checked_sub(values[lower])?
                    .checked_mul(Decimal::from(remainder))?
                    .checked_add(base)
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| overflow(metric, "cut-point"))?;

        Ok(Self {
            scaled,
            buckets,
            degenerate,
        })
    }

    /// Right-closed buckets: a value equal to a cut-point stays below it, and
    /// equal values always land together. `None` when the scaled value
    /// overflows.
    fn bucket(&self, value: Decimal) -> Option<u8> {
        let scaled_value = value.checked_mul(Decimal::from(self.buckets))?;
        let above = self
            .scaled
            .iter()
            .filter(|cut| scaled_value > **cut)
            .count();
        Some(1 + u8::try_from(above).unwrap_or(self.buckets - 1))
    }

    fn describe(&self, metric: Metric) -> MetricThresholds {
        let scale = Decimal::from(self.buckets);
        MetricThresholds {
            metric,
            metric_label: metric.label(),
            cut_points: self
                .scaled
                .iter()
                .map(|cut| (cut / scale).round_dp(4).normalize())
                .collect(),
            degenerate: self.degenerate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn customer(id: usize, recency_days: i64, frequency: u32, monetary_cents: i64) -> CustomerMetrics {
        let reference = NaiveDate::from_ymd_opt(2017, 12, 30).expect("valid date");
        CustomerMetrics {
            customer_id: format!("C-{id:03}"),
            customer_name: None,
            last_order_date: reference - chrono::Duration::days(recency_days),
            recency_days,
            frequency,
            monetary_value: Decimal::new(monetary_cents, 2),
        }
    }

    fn scores_of(scored: &[ScoredCustomer]) -> Vec<(u8, u8, u8)> {
        scored
            .iter()
            .map(|c| (c.scores.recency, c.scores.frequency, c.scores.monetary))
            .collect()
    }

    #[test]
    fn rejects_bucket_counts_outside_supported_range() {
        assert!(QuantileScorer::new(1).is_err());
        assert!(QuantileScorer::new(0).is_err());
        assert!(QuantileScorer::new(MAX_BUCKETS + 1).is_err());
        assert_eq!(QuantileScorer::new(2).expect("valid").buckets(), 2);
    }

    #[test]
    fn ten_distinct_values_split_into_even_quintiles() {
        let customers: Vec<_> = (0..10)
            .map(|i| customer(i, (i as i64) * 10, i as u32 + 1, (i as i64 + 1) * 1_000))
            .collect();
        let scored = QuantileScorer::default().score(customers).expect("scores");

        let frequency: Vec<u8> = scored.iter().map(|c| c.scores.frequency).collect();
        assert_eq!(frequency, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);

        let recency: Vec<u8> = scored.iter().map(|c| c.scores.recency).collect();
        assert_eq!(recency, vec![5, 5, 4, 4, 3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn tied_values_always_share_a_score() {
        // seven single-order customers straddle three quintile boundaries
        let frequencies = [1, 1, 1, 1, 1, 1, 1, 2, 3, 8];
        let customers: Vec<_> = frequencies
            .iter()
            .enumerate()
            .map(|(i, f)| customer(i, i as i64, *f, 100 * (i as i64 + 1)))
            .collect();
        let scored = QuantileScorer::default().score(customers).expect("scores");

        let frequency: Vec<u8> = scored.iter().map(|c| c.scores.frequency).collect();
        assert_eq!(frequency, vec![1, 1, 1, 1, 1, 1, 1, 4, 5, 5]);
    }

    #[test]
    fn zero_variance_metric_scores_the_middle() {
        let customers: Vec<_> = (0..4).map(|i| customer(i, 30, 2, 5_000)).collect();
        let scored = QuantileScorer::default().score(customers).expect("scores");
        assert!(scores_of(&scored).iter().all(|s| *s == (3, 3, 3)));

        let scorer = QuantileScorer::new(4).expect("valid");
        let scored = scorer.score(vec![customer(0, 1, 1, 1)]).expect("scores");
        assert_eq!(scores_of(&scored), vec![(2, 2, 2)]);
    }

    #[test]
    fn values_on_a_cut_point_fall_into_the_lower_bucket() {
        // six values: quintile positions 1, 2, 3, 4 land exactly on order statistics
        let customers: Vec<_> = (0..6).map(|i| customer(i, 0, 1, (i as i64) * 100)).collect();
        let scorer = QuantileScorer::default();
        let thresholds = scorer.thresholds(&customers).expect("thresholds");
        assert_eq!(
            thresholds[2].cut_points,
            vec![Decimal::ONE, Decimal::TWO, Decimal::from(3), Decimal::from(4)]
        );

        let monetary: Vec<u8> = scorer
            .score(customers)
            .expect("scores")
            .iter()
            .map(|c| c.scores.monetary)
            .collect();
        assert_eq!(monetary, vec![1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn interpolated_cut_points_are_exact() {
        let customers = vec![
            customer(0, 0, 1, 100_000),
            customer(1, 200, 10, 50_000),
            customer(2, 400, 1, 1_000),
        ];
        let thresholds = QuantileScorer::default().thresholds(&customers).expect("thresholds");

        assert_eq!(thresholds[0].metric, Metric::Recency);
        assert_eq!(
            thresholds[0].cut_points,
            vec![
                Decimal::from(80),
                Decimal::from(160),
                Decimal::from(240),
                Decimal::from(320)
            ]
        );
        assert!(!thresholds[0].degenerate);
    }

    #[test]
    fn fewer_distinct_values_than_buckets_still_scores_in_range() {
        let customers: Vec<_> = (0..8)
            .map(|i| customer(i, if i % 2 == 0 { 5 } else { 90 }, 1 + (i % 2) as u32, 1_000))
            .collect();
        let scored = QuantileScorer::default().score(customers).expect("scores");

        for c in &scored {
            for score in [c.scores.recency, c.scores.frequency, c.scores.monetary] {
                assert!((1..=5).contains(&score));
            }
        }
        let recent = scored.iter().find(|c| c.metrics.recency_days == 5).expect("present");
        let lapsed = scored.iter().find(|c| c.metrics.recency_days == 90).expect("present");
        assert!(recent.scores.recency > lapsed.scores.recency);
    }

    #[test]
    fn monetary_values_near_decimal_max_fail_instead_of_panicking() {
        let mut whale = customer(0, 0, 1, 0);
        whale.monetary_value =
            Decimal::from_str_exact("20000000000000000000000000000").expect("fits");
        let customers = vec![whale, customer(1, 10, 1, 100)];
        let scorer = QuantileScorer::default();

        match scorer.thresholds(&customers) {
            Err(RfmError::MetricOverflow { metric, .. }) => {
                assert_eq!(metric, Metric::Monetary.label())
            }
            other => panic!("expected monetary overflow, got {other:?}"),
        }
        assert!(matches!(
            scorer.score(customers),
            Err(RfmError::MetricOverflow { .. })
        ));
    }
}
