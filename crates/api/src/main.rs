use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courier_api::background;
use courier_api::config::ServerConfig;
use courier_api::router::build_app_router;
use courier_api::state::AppState;
use courier_events::EventBus;
use courier_pipeline::Pipeline;

/// Capacity of the in-process settings-change bus.
const EVENT_BUS_CAPACITY: usize = 256;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;

    let pool = courier_db::create_pool(&database_url).await?;
    tracing::info!("Database connection pool created");

    courier_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    courier_db::run_migrations(&pool).await?;

    // --- Pipeline ---
    let pipeline = Pipeline::new(pool.clone(), &config.pipeline)?;
    tracing::info!(
        bridge = config.pipeline.endpoints.mtproto_bridge_url.is_some(),
        "Notification pipeline wired"
    );

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
    let audit_cache_handle = tokio::spawn(background::audit_cache::run(
        Arc::clone(&pipeline.audit),
        event_bus.subscribe(),
    ));

    // --- Background jobs ---
    let jobs_cancel = CancellationToken::new();
    let autopilot_handle = tokio::spawn(background::autopilot::run(
        pipeline.autopilot.clone(),
        config.pipeline.autopilot_check_interval,
        jobs_cancel.clone(),
    ));
    let receipts_handle = tokio::spawn(background::read_receipts::run(
        Arc::clone(&pipeline.reconciler),
        config.pipeline.reconcile_interval,
        jobs_cancel.clone(),
    ));
    tracing::info!("Background jobs started (audit cache, autopilot, read receipts)");

    // --- App state & router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        pipeline,
        event_bus: Arc::clone(&event_bus),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    jobs_cancel.cancel();
    let _ = tokio::time::timeout(grace, autopilot_handle).await;
    let _ = tokio::time::timeout(grace, receipts_handle).await;
    tracing::info!("Background jobs stopped");

    // Dropping the last sender closes the bus and stops the subscriber.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, audit_cache_handle).await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
