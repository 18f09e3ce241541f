use crate::infra::{deserialize_optional_as_of, AnalysisDefaults, AppState};
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shopper_dna::error::AppError;
use shopper_dna::workflows::orders::OrderImporter;
use shopper_dna::workflows::rfm::report::views::SegmentReportSummary;
use shopper_dna::workflows::rfm::{
    AsOf, CustomerSegment, MetricThresholds, QuantileScorer, RejectedRecord, RfmEngine,
    RuleTable, SegmentRule, SegmentReport, SegmentedCustomer,
};
use std::io::Cursor;
use std::sync::Arc;
use tracing::info;

const DEFAULT_TOP_CHAMPIONS: usize = 10;

#[derive(Debug, Deserialize)]
pub(crate) struct AnalyzeRequest {
    pub(crate) orders_csv: String,
    #[serde(default, deserialize_with = "deserialize_optional_as_of")]
    pub(crate) as_of: Option<AsOf>,
    #[serde(default)]
    pub(crate) buckets: Option<u8>,
    #[serde(default)]
    pub(crate) include_customers: bool,
    #[serde(default)]
    pub(crate) top: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeResponse {
    pub(crate) reference_date: NaiveDate,
    pub(crate) buckets: u8,
    pub(crate) thresholds: Vec<MetricThresholds>,
    pub(crate) summary: SegmentReportSummary,
    pub(crate) top_champions: Vec<SegmentedCustomer>,
    pub(crate) rejected: Vec<RejectedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) customers: Option<Vec<SegmentedCustomer>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RulesQuery {
    pub(crate) buckets: Option<u8>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RulesResponse {
    pub(crate) buckets: u8,
    pub(crate) source: RuleSource,
    pub(crate) rules: Vec<SegmentRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RuleSource {
    Configured,
    Standard,
}

pub(crate) fn rfm_routes(defaults: Arc<AnalysisDefaults>) -> axum::Router {
    axum::Router::new()
        .route("/api/v1/rfm/analyze", axum::routing::post(analyze_endpoint))
        .route("/api/v1/rfm/rules", axum::routing::get(rules_endpoint))
        .layer(Extension(defaults))
}

pub(crate) fn with_service_routes(router: axum::Router) -> axum::Router {
    router
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn analyze_endpoint(
    Extension(defaults): Extension<Arc<AnalysisDefaults>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let AnalyzeRequest {
        orders_csv,
        as_of,
        buckets,
        include_customers,
        top,
    } = payload;

    let engine = RfmEngine::new(defaults.engine_config(buckets, as_of))?;
    let batch = OrderImporter::from_reader(Cursor::new(orders_csv.into_bytes()))?;
    let run = engine.run_batch(batch)?;

    let report = run.report();
    let top_champions = SegmentReport::top_customers(
        &run.customers,
        CustomerSegment::Champions,
        top.unwrap_or(DEFAULT_TOP_CHAMPIONS),
    );
    info!(
        customers = run.customers.len(),
        rejected = run.rejected.len(),
        "served rfm analysis"
    );

    Ok(Json(AnalyzeResponse {
        reference_date: run.reference_date,
        buckets: run.buckets,
        thresholds: run.thresholds,
        summary: report.summary(),
        top_champions,
        rejected: run.rejected,
        customers: include_customers.then_some(run.customers),
    }))
}

pub(crate) async fn rules_endpoint(
    Extension(defaults): Extension<Arc<AnalysisDefaults>>,
    Query(query): Query<RulesQuery>,
) -> Result<Json<RulesResponse>, AppError> {
    let buckets = query.buckets.unwrap_or(defaults.buckets);
    QuantileScorer::new(buckets)?;

    let config = defaults.engine_config(Some(buckets), None);
    let (table, source) = match config.rules {
        Some(table) => (table, RuleSource::Configured),
        None => (RuleTable::standard(buckets), RuleSource::Standard),
    };

    Ok(Json(RulesResponse {
        buckets,
        source,
        rules: table.rules().to_vec(),
    }))
}
