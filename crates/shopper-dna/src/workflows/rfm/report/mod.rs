mod summary;
pub mod views;

pub use summary::{format_currency, render_summary_table, SegmentReport, SegmentTotals};
