use super::super::domain::{CustomerSegment, SegmentedCustomer};
use super::views::{DashboardKpis, SegmentReportSummary, SegmentShareEntry, SegmentSummaryEntry};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SegmentTotals {
    pub customers: usize,
    pub revenue: Decimal,
}

/// Per-segment rollup of a segmented customer table.
#[derive(Debug, Default)]
pub struct SegmentReport {
    pub segment_totals: HashMap<CustomerSegment, SegmentTotals>,
    pub total_customers: usize,
    pub total_revenue: Decimal,
    pub total_recency_days: i64,
}

impl SegmentReport {
    pub fn build(customers: &[SegmentedCustomer]) -> Self {
        let mut report = Self::default();
        for customer in customers {
            let metrics = customer.metrics();
            let totals = report
                .segment_totals
                .entry(customer.customer_segment)
                .or_default();
            totals.customers += 1;
            totals.revenue = totals.revenue.saturating_add(metrics.monetary_value);

            report.total_customers += 1;
            report.total_revenue = report.total_revenue.saturating_add(metrics.monetary_value);
            report.total_recency_days = report
                .total_recency_days
                .saturating_add(metrics.recency_days);
        }
        report
    }

    pub fn summary(&self) -> SegmentReportSummary {
        SegmentReportSummary {
            segments: self.segment_entries(),
            distribution: self.distribution(),
            kpis: self.kpis(),
        }
    }

    /// Segments present in the table, highest total revenue first.
    pub fn segment_entries(&self) -> Vec<SegmentSummaryEntry> {
        let mut entries: Vec<_> = CustomerSegment::ordered()
            .into_iter()
            .filter_map(|segment| {
                self.segment_totals
                    .get(&segment)
                    .map(|totals| SegmentSummaryEntry {
                        segment,
                        segment_label: segment.label(),
                        customer_count: totals.customers,
                        total_revenue: totals.revenue,
                    })
            })
            .collect();
        // stable sort keeps rule precedence for equal revenue
        entries.sort_by_key(|entry| Reverse(entry.total_revenue));
        entries
    }

    pub fn distribution(&self) -> Vec<SegmentShareEntry> {
        CustomerSegment::display_order()
            .into_iter()
            .filter_map(|segment| {
                self.segment_totals.get(&segment).map(|totals| SegmentShareEntry {
                    segment,
                    segment_label: segment.label(),
                    customers: totals.customers,
                    share_pct: if self.total_customers == 0 {
                        0.0
                    } else {
                        totals.customers as f64 * 100.0 / self.total_customers as f64
                    },
                })
            })
            .collect()
    }

    pub fn kpis(&self) -> DashboardKpis {
        let avg_recency_days = if self.total_customers == 0 {
            0.0
        } else {
            self.total_recency_days as f64 / self.total_customers as f64
        };

        DashboardKpis {
            total_customers: self.total_customers,
            total_revenue: self.total_revenue,
            avg_recency_days,
            champions_count: self
                .segment_totals
                .get(&CustomerSegment::Champions)
                .map(|totals| totals.customers)
                .unwrap_or(0),
        }
    }

    /// Highest-value members of `segment`, ties broken by customer id.
    pub fn top_customers(
        customers: &[SegmentedCustomer],
        segment: CustomerSegment,
        limit: usize,
    ) -> Vec<SegmentedCustomer> {
        let mut members: Vec<&SegmentedCustomer> = customers
            .iter()
            .filter(|customer| customer.customer_segment == segment)
            .collect();
        members.sort_by(|a, b| {
            b.metrics()
                .monetary_value
                .cmp(&a.metrics().monetary_value)
                .then_with(|| a.customer_id().cmp(b.customer_id()))
        });
        members.into_iter().take(limit).cloned().collect()
    }
}

/// `$1,234.56` style rendering used by the text summary.
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = rounded.abs().to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded < Decimal::ZERO { "-" } else { "" };
    format!("{sign}${grouped}.{fraction:0<2}")
}

/// Fixed-width table written to `summary.txt`.
pub fn render_summary_table(entries: &[SegmentSummaryEntry]) -> String {
    const SEGMENT: &str = "customer_segment";
    const COUNT: &str = "count";
    const REVENUE: &str = "revenue";

    let revenues: Vec<String> = entries
        .iter()
        .map(|entry| format_currency(entry.total_revenue))
        .collect();
    let segment_width = entries
        .iter()
        .map(|entry| entry.segment_label.len())
        .chain([SEGMENT.len()])
        .max()
        .unwrap_or(SEGMENT.len());
    let count_width = entries
        .iter()
        .map(|entry| entry.customer_count.to_string().len())
        .chain([COUNT.len()])
        .max()
        .unwrap_or(COUNT.len());
    let revenue_width = revenues
        .iter()
        .map(String::len)
        .chain([REVENUE.len()])
        .max()
        .unwrap_or(REVENUE.len());

    let mut table =
        format!("{SEGMENT:<segment_width$}  {COUNT:>count_width$}  {REVENUE:>revenue_width$}\n");
    for (entry, revenue) in entries.iter().zip(&revenues) {
        table.push_str(&format!(
            "{:<segment_width$}  {:>count_width$}  {:>revenue_width$}\n",
            entry.segment_label, entry.customer_count, revenue
        ));
    }
    table
}
