use super::normalizer::{clean_cell, normalize_header};
use super::OrderImportError;
use crate::workflows::rfm::domain::{InvalidRecord, OrderBatch, OrderRecord, RejectedRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::str::FromStr;

const REVENUE_COLUMNS: [&str; 3] = ["line_revenue", "sales", "revenue"];

pub(crate) fn parse_orders<R: Read>(reader: R) -> Result<OrderBatch, OrderImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader
        .byte_headers()?
        .iter()
        .map(|raw| normalize_header(&String::from_utf8_lossy(raw)))
        .collect();
    require_columns(&headers)?;
    let header_record: csv::ByteRecord = headers.iter().collect();
    let identity = RowIdentity::locate(&headers);

    let mut batch = OrderBatch::default();
    let mut record = csv::ByteRecord::new();
    while csv_reader.read_byte_record(&mut record)? {
        let line = record.position().map(|position| position.line()).unwrap_or_default();

        // undecodable cells refuse the row, not the export
        let row: OrderRow = match record.deserialize(Some(&header_record)) {
            Ok(row) => row,
            Err(err) => {
                batch.rejected.push(RejectedRecord {
                    row: line,
                    customer_id: identity.customer_id(&record),
                    order_id: identity.order_id(&record),
                    reason: InvalidRecord::MalformedRow {
                        detail: err.to_string(),
                    },
                });
                continue;
            }
        };

        match row.to_order() {
            Ok(order) => batch.records.push(order.with_source_line(line)),
            Err(reason) => batch.rejected.push(RejectedRecord {
                row: line,
                customer_id: row.customer_id,
                order_id: row.order_id,
                reason,
            }),
        }
    }

    Ok(batch)
}

fn require_columns(headers: &[String]) -> Result<(), OrderImportError> {
    let has = |name: &str| headers.iter().any(|header| header == name);

    for column in ["customer_id", "order_id", "order_date"] {
        if !has(column) {
            return Err(OrderImportError::MissingColumn(column));
        }
    }
    if !REVENUE_COLUMNS.iter().any(|column| has(column)) {
        return Err(OrderImportError::MissingColumn("sales"));
    }
    Ok(())
}

/// Column positions used to label rows that could not be decoded.
struct RowIdentity {
    customer_id: Option<usize>,
    order_id: Option<usize>,
}

impl RowIdentity {
    fn locate(headers: &[String]) -> Self {
        let position = |name: &str| headers.iter().position(|header| header == name);
        Self {
            customer_id: position("customer_id"),
            order_id: position("order_id"),
        }
    }

    fn customer_id(&self, record: &csv::ByteRecord) -> Option<String> {
        Self::lossy_cell(record, self.customer_id)
    }

    fn order_id(&self, record: &csv::ByteRecord) -> Option<String> {
        Self::lossy_cell(record, self.order_id)
    }

    fn lossy_cell(record: &csv::ByteRecord, index: Option<usize>) -> Option<String> {
        let raw = record.get(index?)?;
        clean_cell(Some(String::from_utf8_lossy(raw).into_owned()))
    }
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    customer_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    customer_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    order_id: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    order_date: Option<String>,
    #[serde(
        default,
        alias = "sales",
        alias = "revenue",
        deserialize_with = "empty_string_as_none"
    )]
    line_revenue: Option<String>,
}

impl OrderRow {
    fn to_order(&self) -> Result<OrderRecord, InvalidRecord> {
        let customer_id = self
            .customer_id
            .clone()
            .ok_or(InvalidRecord::MissingCustomerId)?;
        let order_id = self.order_id.clone().ok_or(InvalidRecord::MissingOrderId)?;

        let raw_date = self
            .order_date
            .as_deref()
            .ok_or(InvalidRecord::MissingOrderDate)?;
        let order_date = parse_order_date(raw_date).ok_or_else(|| InvalidRecord::UnparseableDate {
            value: raw_date.to_string(),
        })?;

        let raw_revenue = self
            .line_revenue
            .as_deref()
            .ok_or(InvalidRecord::MissingRevenue)?;
        let line_revenue =
            parse_revenue(raw_revenue).ok_or_else(|| InvalidRecord::NonNumericRevenue {
                value: raw_revenue.to_string(),
            })?;

        let order = OrderRecord {
            customer_id,
            customer_name: self.customer_name.clone(),
            order_id,
            order_date,
            line_revenue,
            source_line: None,
        };
        order.validate(None)?;
        Ok(order)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(clean_cell(opt))
}

/// Accepts ISO dates, ISO date-times (as written by SQLite/pandas), RFC 3339
/// and US month-first dates with two- or four-digit years.
fn parse_order_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    // %Y would read "16" as the year 16, so pick the year width explicitly
    let (_, year) = trimmed.rsplit_once('/')?;
    let format = if year.len() <= 2 { "%m/%d/%y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(trimmed, format).ok()
}

fn parse_revenue(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

#[cfg(test)]
pub(crate) fn parse_order_date_for_tests(value: &str) -> Option<NaiveDate> {
    parse_order_date(value)
}

#[cfg(test)]
pub(crate) fn parse_revenue_for_tests(value: &str) -> Option<Decimal> {
    parse_revenue(value)
}
