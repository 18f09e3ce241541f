use super::super::domain::CustomerSegment;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummaryEntry {
    pub segment: CustomerSegment,
    pub segment_label: &'static str,
    pub customer_count: usize,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentShareEntry {
    pub segment: CustomerSegment,
    pub segment_label: &'static str,
    pub customers: usize,
    pub share_pct: f64,
}

/// Headline numbers shown above the dashboard charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardKpis {
    pub total_customers: usize,
    pub total_revenue: Decimal,
    pub avg_recency_days: f64,
    pub champions_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentReportSummary {
    pub segments: Vec<SegmentSummaryEntry>,
    pub distribution: Vec<SegmentShareEntry>,
    pub kpis: DashboardKpis,
}
