//! Safety Monitor - camera safety-event aggregation server
//!
//! Main entry point.

use safety_monitor::{config::AppConfig, state::AppState, web_api};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safety_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Safety Monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        analysis_mode = %config.analysis_mode,
        cobot_url = %config.endpoints.cobot,
        machine_url = %config.endpoints.machine,
        ppe_url = %config.endpoints.ppe,
        poll_interval_secs = config.poll_interval.as_secs(),
        alert_capacity = config.alert_capacity,
        "Configuration loaded"
    );

    let state = AppState::build(config).await?;
    let coordinator = state.coordinator.clone();

    if state.config.autostart_polling {
        coordinator.autostart().await;
    }

    let addr = state.config.bind_addr();
    let app = web_api::create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    coordinator.shutdown().await;
    tracing::info!("Safety Monitor stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
