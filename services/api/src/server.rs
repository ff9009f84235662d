use crate::cli::ServeArgs;
use crate::infra::{lifecycle_config, AppState, InMemoryLoanStore, InMemoryNotificationStore};
use crate::routes::with_loan_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loanflow::config::AppConfig;
use loanflow::error::AppError;
use loanflow::telemetry;
use loanflow::workflows::loans::{LifecycleEngine, LoanService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let store = Arc::new(InMemoryLoanStore::default());
    let notifications = Arc::new(InMemoryNotificationStore::default());
    let engine_config = lifecycle_config(&config.lifecycle);
    let loan_service = Arc::new(LoanService::new(
        store.clone(),
        notifications.clone(),
        engine_config.clone(),
    ));
    let engine = Arc::new(LifecycleEngine::new(store, notifications, engine_config));
    let sweeper = engine.spawn();

    let app = with_loan_routes(loan_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan lifecycle service ready");

    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;
    Ok(())
}
