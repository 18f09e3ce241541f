use super::domain::{CustomerMetrics, OrderRecord, RfmError};
use super::scoring::Metric;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Latest order date across the whole dataset, the default reference date.
pub fn latest_order_date(records: &[OrderRecord]) -> Option<NaiveDate> {
    records.iter().map(|record| record.order_date).max()
}

/// Reduces order lines to one row per customer, ordered by customer id.
///
/// `reference_date` is fixed for the whole run; callers must not pass lines
/// dated after it. Fails when a customer's revenue total leaves the decimal
/// range.
pub fn aggregate(
    records: &[OrderRecord],
    reference_date: NaiveDate,
) -> Result<Vec<CustomerMetrics>, RfmError> {
    let mut customers: BTreeMap<&str, CustomerAccumulator<'_>> = BTreeMap::new();

    for record in records {
        customers
            .entry(record.customer_id.as_str())
            .or_insert_with(|| CustomerAccumulator::new(record.order_date))
            .absorb(record)?;
    }

    Ok(customers
        .into_iter()
        .map(|(customer_id, accumulator)| accumulator.finish(customer_id, reference_date))
        .collect())
}

struct CustomerAccumulator<'a> {
    orders: BTreeSet<&'a str>,
    monetary_value: Decimal,
    last_order_date: NaiveDate,
    name: Option<(NaiveDate, &'a str)>,
}

impl<'a> CustomerAccumulator<'a> {
    fn new(first_seen: NaiveDate) -> Self {
        Self {
            orders: BTreeSet::new(),
            monetary_value: Decimal::ZERO,
            last_order_date: first_seen,
            name: None,
        }
    }

    fn absorb(&mut self, record: &'a OrderRecord) -> Result<(), RfmError> {
        self.monetary_value = self
            .monetary_value
            .checked_add(record.line_revenue)
            .ok_or_else(|| RfmError::MetricOverflow {
                metric: Metric::Monetary.label(),
                detail: format!("revenue total for customer {}", record.customer_id),
            })?;
        self.orders.insert(record.order_id.as_str());
        self.last_order_date = self.last_order_date.max(record.order_date);

        let Some(name) = record
            .customer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            return Ok(());
        };

        // newest dated name wins, smallest label breaks same-day ties
        let replace = match self.name {
            None => true,
            Some((seen_on, current)) => {
                record.order_date > seen_on || (record.order_date == seen_on && name < current)
            }
        };
        if replace {
            self.name = Some((record.order_date, name));
        }
        Ok(())
    }

    fn finish(self, customer_id: &str, reference_date: NaiveDate) -> CustomerMetrics {
        CustomerMetrics {
            customer_id: customer_id.to_string(),
            customer_name: self.name.map(|(_, name)| name.to_string()),
            last_order_date: self.last_order_date,
            recency_days: (reference_date - self.last_order_date).num_days(),
            frequency: u32::try_from(self.orders.len()).unwrap_or(u32::MAX),
            monetary_value: self.monetary_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn line(customer: &str, order: &str, on: NaiveDate, cents: i64) -> OrderRecord {
        OrderRecord::new(customer, order, on, Decimal::new(cents, 2))
    }

    #[test]
    fn multi_line_orders_count_once_and_revenue_sums_exactly() {
        let records = vec![
            line("CG-12520", "CA-2016-152156", date(2016, 11, 8), 26_196),
            line("CG-12520", "CA-2016-152156", date(2016, 11, 8), 73_194),
            line("CG-12520", "CA-2017-164098", date(2017, 1, 26), 1_810),
            line("DV-13045", "CA-2016-138688", date(2016, 6, 12), 1_462),
        ];

        let metrics = aggregate(&records, date(2017, 1, 31)).expect("aggregates");
        assert_eq!(metrics.len(), 2);

        let claire = &metrics[0];
        assert_eq!(claire.customer_id, "CG-12520");
        assert_eq!(claire.frequency, 2);
        assert_eq!(claire.monetary_value, Decimal::new(101_200, 2));
        assert_eq!(claire.last_order_date, date(2017, 1, 26));
        assert_eq!(claire.recency_days, 5);

        let darrin = &metrics[1];
        assert_eq!(darrin.frequency, 1);
        assert_eq!(darrin.recency_days, 233);
    }

    #[test]
    fn output_is_sorted_and_independent_of_input_order() {
        let mut records = vec![
            line("ZZ-1", "O-3", date(2017, 3, 1), 100),
            line("AA-1", "O-1", date(2017, 1, 1), 250),
            line("MM-1", "O-2", date(2017, 2, 1), 999),
            line("AA-1", "O-4", date(2017, 3, 1), 1),
        ];
        let reference = latest_order_date(&records).expect("non-empty");
        let forward = aggregate(&records, reference).expect("aggregates");
        records.reverse();
        let backward = aggregate(&records, reference).expect("aggregates");

        assert_eq!(forward, backward);
        let ids: Vec<_> = forward.iter().map(|m| m.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["AA-1", "MM-1", "ZZ-1"]);
    }

    #[test]
    fn customer_name_comes_from_latest_named_line() {
        let records = vec![
            line("SO-20335", "O-1", date(2016, 1, 1), 100).with_customer_name("Sean O'Donnell"),
            line("SO-20335", "O-2", date(2017, 1, 1), 100).with_customer_name("Sean ODonnell"),
            line("SO-20335", "O-3", date(2017, 1, 1), 100).with_customer_name("Sean O Donnell"),
            line("SO-20335", "O-4", date(2017, 6, 1), 100).with_customer_name("   "),
        ];

        let metrics = aggregate(&records, date(2017, 6, 1)).expect("aggregates");
        assert_eq!(metrics[0].customer_name.as_deref(), Some("Sean O Donnell"));
        assert_eq!(metrics[0].recency_days, 0);
    }

    #[test]
    fn empty_input_yields_no_customers() {
        assert!(aggregate(&[], date(2017, 1, 1))
            .expect("aggregates")
            .is_empty());
        assert!(latest_order_date(&[]).is_none());
    }

    #[test]
    fn revenue_total_past_decimal_range_is_an_error() {
        let on = date(2017, 1, 1);
        let records = vec![
            OrderRecord::new("BIG-1", "O-1", on, Decimal::MAX),
            OrderRecord::new("BIG-1", "O-2", on, Decimal::ONE),
            OrderRecord::new("SMALL-1", "O-3", on, Decimal::ONE),
        ];

        match aggregate(&records, on) {
            Err(RfmError::MetricOverflow { metric, detail }) => {
                assert_eq!(metric, Metric::Monetary.label());
                assert!(detail.contains("BIG-1"));
            }
            other => panic!("expected monetary overflow, got {other:?}"),
        }
    }
}
