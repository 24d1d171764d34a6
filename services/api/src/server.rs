use crate::cli::ServeArgs;
use crate::infra::{build_portal, AppState};
use crate::routes::{healthcheck, metrics_endpoint, readiness_endpoint, rpc_router};
use axum::routing::get;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use recruit_flow::config::AppConfig;
use recruit_flow::error::AppError;
use recruit_flow::telemetry;
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

    let (portal, events) = build_portal(&config.pipeline);

    // First subscriber: replays anything the pipeline published during
    // startup, then drains live events into the log.
    let notifications = events.subscribe();
    std::thread::spawn(move || {
        while let Ok(notification) = notifications.recv() {
            info!(
                id = %notification.id,
                severity = ?notification.severity,
                "{}: {}",
                notification.title,
                notification.message
            );
        }
    });

    let app = rpc_router(portal)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "recruitment pipeline portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
