use chrono::NaiveDate;
use clap::Args;
use shopper_dna::config::AppConfig;
use shopper_dna::error::AppError;
use shopper_dna::workflows::orders::{rejection_counts, OrderImporter};
use shopper_dna::workflows::rfm::report::{format_currency, render_summary_table};
use shopper_dna::workflows::rfm::{
    read_results_path, write_summary_path, AsOf, CustomerSegment, MetricThresholds,
    RejectedRecord, ResultsWriter, RfmEngine, RuleTable, SegmentReport, SegmentedCustomer,
};
use crate::infra::AnalysisDefaults;
use std::path::PathBuf;

const MAX_LISTED_REJECTIONS: usize = 10;

#[derive(Args, Debug, Default)]
pub(crate) struct AnalyzeArgs {
    /// Order export to segment (defaults to RFM_ORDERS_PATH or superstore.csv)
    #[arg(long)]
    pub(crate) orders: Option<PathBuf>,
    /// Where to write the per-customer results CSV
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Where to write the plain-text segment summary
    #[arg(long)]
    pub(crate) summary: Option<PathBuf>,
    /// Reference date (YYYY-MM-DD), `today`, or `max` for the latest order date
    #[arg(long, value_parser = crate::infra::parse_as_of)]
    pub(crate) as_of: Option<AsOf>,
    /// Number of score levels per metric
    #[arg(long, value_parser = crate::infra::parse_bucket_count)]
    pub(crate) buckets: Option<u8>,
    /// JSON rule table replacing the standard segment rules; it must be written
    /// for the --buckets scale. A table from RFM_RULES_PATH only applies at
    /// RFM_SCORE_BUCKETS, other scales use the standard rules.
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// How many Champions to list
    #[arg(long, default_value_t = 10)]
    pub(crate) top: usize,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SummaryArgs {
    /// Previously written results CSV (defaults to RFM_RESULTS_PATH)
    #[arg(long)]
    pub(crate) results: Option<PathBuf>,
    /// Also write the summary table to this file
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

pub(crate) fn run_analyze(config: AppConfig, args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        orders,
        output,
        summary,
        as_of,
        buckets,
        rules,
        top,
    } = args;

    let mut settings = config.rfm;
    if let Some(path) = orders {
        settings.orders_path = path;
    }
    if let Some(path) = output {
        settings.results_path = path;
    }
    if let Some(path) = summary {
        settings.summary_path = path;
    }

    let engine_config = match rules {
        Some(path) => {
            settings.rules_path = Some(path);
            settings.buckets = buckets.unwrap_or(settings.buckets);
            settings.as_of = as_of.unwrap_or(settings.as_of);
            settings.engine_config()?
        }
        None => AnalysisDefaults::from_settings(&settings)?.engine_config(buckets, as_of),
    };
    let custom_rules = engine_config.rules.is_some();
    let engine = RfmEngine::new(engine_config)?;
    let batch = OrderImporter::from_path(&settings.orders_path)?;
    let run = engine.run_batch(batch)?;

    ResultsWriter::to_path(&settings.results_path, &run.customers)?;
    let report = run.report();
    let table = render_summary_table(&report.segment_entries());
    write_summary_path(&settings.summary_path, &table)?;

    println!("ShopperDNA RFM analysis");
    println!(
        "Source: {} | Reference date: {} | Score levels: {}",
        settings.orders_path.display(),
        run.reference_date,
        run.buckets
    );
    render_thresholds(&run.thresholds);
    render_report(&report, &table);
    render_top_champions(&run.customers, top);
    render_rejections(&run.rejected);
    if !custom_rules {
        render_rule_legend(engine.rules());
    }

    println!(
        "\nWrote {} customers to {} and the summary to {}",
        run.customers.len(),
        settings.results_path.display(),
        settings.summary_path.display()
    );

    Ok(())
}

pub(crate) fn run_summary(config: AppConfig, args: SummaryArgs) -> Result<(), AppError> {
    let results = args.results.unwrap_or(config.rfm.results_path);
    let customers = read_results_path(&results)?;
    let report = SegmentReport::build(&customers);
    let table = render_summary_table(&report.segment_entries());

    println!("Segment summary for {}", results.display());
    render_report(&report, &table);

    if let Some(path) = args.output {
        write_summary_path(&path, &table)?;
        println!("\nWrote summary to {}", path.display());
    }

    Ok(())
}

fn render_thresholds(thresholds: &[MetricThresholds]) {
    println!("\nQuantile cut-points");
    for threshold in thresholds {
        if threshold.degenerate {
            println!(
                "- {}: every customer shares one value (middle score)",
                threshold.metric_label
            );
            continue;
        }

        let cuts = threshold
            .cut_points
            .iter()
            .map(|cut| cut.round_dp(2).to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        println!("- {}: {}", threshold.metric_label, cuts);
    }
}

fn render_report(report: &SegmentReport, table: &str) {
    let kpis = report.kpis();
    println!(
        "\n{} customers | {} revenue | {:.1} days average recency | {} Champions",
        kpis.total_customers,
        format_currency(kpis.total_revenue),
        kpis.avg_recency_days,
        kpis.champions_count
    );

    println!("\n{}", table.trim_end());

    println!("\nSegment distribution");
    for entry in report.distribution() {
        println!(
            "- {}: {} ({:.1}%)",
            entry.segment_label, entry.customers, entry.share_pct
        );
    }
}

fn render_top_champions(customers: &[SegmentedCustomer], limit: usize) {
    if limit == 0 {
        return;
    }

    let champions = SegmentReport::top_customers(customers, CustomerSegment::Champions, limit);
    if champions.is_empty() {
        println!("\nNo Champions in this run.");
        return;
    }

    println!("\nTop {} Champions", champions.len());
    for champion in &champions {
        let metrics = champion.metrics();
        println!(
            "- {} {} | {} | {} orders | last order {} ({} days) | RFM {}",
            metrics.customer_id,
            metrics.customer_name.as_deref().unwrap_or("(unnamed)"),
            format_currency(metrics.monetary_value),
            metrics.frequency,
            format_date(metrics.last_order_date),
            metrics.recency_days,
            champion.rfm_code()
        );
    }
}

fn render_rejections(rejected: &[RejectedRecord]) {
    if rejected.is_empty() {
        return;
    }

    let counts = rejection_counts(rejected)
        .into_iter()
        .map(|(kind, count)| format!("{kind} x{count}"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("\nRejected {} order lines ({})", rejected.len(), counts);
    for record in rejected.iter().take(MAX_LISTED_REJECTIONS) {
        println!(
            "- row {} customer {} order {}: {}",
            record.row,
            record.customer_id.as_deref().unwrap_or("-"),
            record.order_id.as_deref().unwrap_or("-"),
            record.reason
        );
    }
    if rejected.len() > MAX_LISTED_REJECTIONS {
        println!("- ... {} more", rejected.len() - MAX_LISTED_REJECTIONS);
    }
}

fn render_rule_legend(table: &RuleTable) {
    println!("\nSegment rules (first match wins)");
    for rule in table.rules() {
        println!(
            "- {}: R {}-{} F {}-{} M {}-{}",
            rule.segment.label(),
            rule.recency.min,
            rule.recency.max,
            rule.frequency.min,
            rule.frequency.max,
            rule.monetary.min,
            rule.monetary.max
        );
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopper_dna::config::{AppEnvironment, RfmSettings, ServerConfig, TelemetryConfig};
    use shopper_dna::workflows::rfm::{ScoreRange, SegmentRule};

    fn config_for(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "warn".to_string(),
            },
            rfm: RfmSettings {
                orders_path: dir.join("orders.csv"),
                results_path: dir.join("rfm_results.csv"),
                summary_path: dir.join("summary.txt"),
                ..RfmSettings::default()
            },
        }
    }

    const ORDERS: &str = "Order ID,Order Date,Customer ID,Customer Name,Sales\n\
O-1,2024-01-31,X,Xavier,1000\n\
O-2,2023-07-15,Y,Yolanda,500\n\
O-3,2022-12-27,Z,Zoe,10\n\
O-4,2022-12-27,Z,Zoe,oops\n";

    #[test]
    fn analyze_writes_results_and_summary_then_summary_reads_them_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = config_for(dir.path());
        std::fs::write(&config.rfm.orders_path, ORDERS).expect("orders written");

        run_analyze(
            config.clone(),
            AnalyzeArgs {
                top: 3,
                ..AnalyzeArgs::default()
            },
        )
        .expect("analysis succeeds");

        let customers = read_results_path(&config.rfm.results_path).expect("results readable");
        assert_eq!(customers.len(), 3);
        let summary = std::fs::read_to_string(&config.rfm.summary_path).expect("summary readable");
        assert!(summary.starts_with("customer_segment"));

        let copy = dir.path().join("summary-copy.txt");
        run_summary(
            config,
            SummaryArgs {
                results: None,
                output: Some(copy.clone()),
            },
        )
        .expect("summary succeeds");
        assert_eq!(std::fs::read_to_string(copy).expect("copy readable"), summary);
    }

    #[test]
    fn analyze_flags_override_configured_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = config_for(dir.path());
        let orders = dir.path().join("other.csv");
        let output = dir.path().join("custom.csv");
        std::fs::write(&orders, ORDERS).expect("orders written");

        run_analyze(
            config.clone(),
            AnalyzeArgs {
                orders: Some(orders),
                output: Some(output.clone()),
                buckets: Some(3),
                as_of: Some(AsOf::Fixed(
                    NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"),
                )),
                ..AnalyzeArgs::default()
            },
        )
        .expect("analysis succeeds");

        let customers = read_results_path(&output).expect("results readable");
        assert!(customers
            .iter()
            .all(|customer| customer.scores().recency <= 3));
        assert_eq!(customers[0].metrics().recency_days, 29);
        assert!(!config.rfm.results_path.exists());
    }

    #[test]
    fn missing_orders_file_is_an_import_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = config_for(dir.path());
        match run_analyze(config, AnalyzeArgs::default()) {
            Err(AppError::Import(_)) => {}
            other => panic!("expected import error, got {other:?}"),
        }
    }

    fn write_catch_all_rules(path: &std::path::Path, buckets: u8) {
        let table = RuleTable::new(vec![SegmentRule {
            segment: CustomerSegment::LostCustomers,
            recency: ScoreRange::any(buckets),
            frequency: ScoreRange::any(buckets),
            monetary: ScoreRange::any(buckets),
        }]);
        let json = serde_json::to_string(&table).expect("table serializes");
        std::fs::write(path, json).expect("rules written");
    }

    #[test]
    fn configured_rules_fall_back_to_standard_at_another_scale() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = config_for(dir.path());
        let rules = dir.path().join("rules.json");
        write_catch_all_rules(&rules, 5);
        config.rfm.rules_path = Some(rules.clone());
        std::fs::write(&config.rfm.orders_path, ORDERS).expect("orders written");

        run_analyze(config.clone(), AnalyzeArgs::default()).expect("configured scale");
        let customers = read_results_path(&config.rfm.results_path).expect("results readable");
        assert!(customers
            .iter()
            .all(|customer| customer.customer_segment == CustomerSegment::LostCustomers));

        run_analyze(
            config.clone(),
            AnalyzeArgs {
                buckets: Some(3),
                ..AnalyzeArgs::default()
            },
        )
        .expect("standard rules at another scale");
        let customers = read_results_path(&config.rfm.results_path).expect("results readable");
        assert!(customers
            .iter()
            .any(|customer| customer.customer_segment != CustomerSegment::LostCustomers));

        let explicit = run_analyze(
            config,
            AnalyzeArgs {
                buckets: Some(3),
                rules: Some(rules),
                ..AnalyzeArgs::default()
            },
        );
        assert!(matches!(explicit, Err(AppError::Engine(_))));
    }
}
