use crate::cli::ServeArgs;
use crate::infra::{AnalysisDefaults, AppState};
use crate::routes::{rfm_routes, with_service_routes};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use shopper_dna::config::AppConfig;
use shopper_dna::error::AppError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut config: AppConfig, mut args: ServeArgs) -> Result<(), AppError> {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    let defaults = Arc::new(AnalysisDefaults::from_settings(&config.rfm)?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_service_routes(rfm_routes(defaults.clone()))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        buckets = defaults.buckets,
        as_of = %defaults.as_of,
        custom_rules = defaults.rules.is_some(),
        "shopper dna segmentation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
