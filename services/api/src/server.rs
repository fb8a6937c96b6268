use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredProvider};
use crate::routes::with_credit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use realty_credits::config::AppConfig;
use realty_credits::credits::{CreditService, CreditServiceError, InMemoryCreditRepository};
use realty_credits::error::AppError;
use realty_credits::telemetry;
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

    let seeded = args.seed_wallets.len();
    let repository = Arc::new(InMemoryCreditRepository::with_wallets(args.seed_wallets));
    let provider = ConfiguredProvider::from_config(config.provider.as_ref())
        .map_err(CreditServiceError::from)?;
    let provider_label = provider.label();
    let credit_service = Arc::new(CreditService::new(
        repository,
        Arc::new(provider),
        config.credits.service_settings(),
    ));

    let app = with_credit_routes(credit_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        provider = provider_label,
        seeded_wallets = seeded,
        default_tool_enabled = config.credits.default_tool_enabled,
        "credit ledger service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
