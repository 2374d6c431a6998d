use crate::cli::ServeArgs;
use crate::infra::{
    default_matching_config, seed_demo_fixtures, AppState, InMemoryMatchingStore,
    InMemoryProviderDirectory, LoggingDispatcher, LoggingPaymentAdjuster,
};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use sweeply::config::{AppConfig, AppEnvironment};
use sweeply::error::AppError;
use sweeply::matching::MatchingService;
use sweeply::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryMatchingStore::default());
    let providers = Arc::new(InMemoryProviderDirectory::default());
    let dispatcher = Arc::new(LoggingDispatcher::default());
    let payments = Arc::new(LoggingPaymentAdjuster);

    if config.environment != AppEnvironment::Production {
        let booking_id = seed_demo_fixtures(&store, &providers, 1, false);
        info!(booking = %booking_id.0, "seeded development fixtures");
    }

    let matching_service = Arc::new(MatchingService::new(
        store,
        providers,
        dispatcher,
        payments,
        default_matching_config(&config.matching),
    ));

    let app = with_matching_routes(matching_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "matching service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
