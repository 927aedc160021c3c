//! loyalty-server binary
//!
//! Serves the user API and runs the accrual poller until SIGINT/SIGTERM.

use std::sync::Arc;

use clap::Parser;
use loyalty_server::accrual::{AccrualPoller, HttpAccrualClient};
use loyalty_server::config::Flags;
use loyalty_server::tasks::BackgroundTasks;
use loyalty_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let flags = Flags::parse();

    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env(&flags)?;

    tracing::info!("Starting loyalty-server (env: {})", config.environment);

    let state = AppState::connect(&config).await?;

    // Accrual poller
    let oracle = HttpAccrualClient::new(
        &config.accrual_system_address,
        config.accrual_request_timeout,
    )?;
    let poller = AccrualPoller::new(
        state.store.clone(),
        Arc::new(oracle),
        config.accrual_poll_interval,
    );

    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();
    tasks.spawn("accrual_poller", poller.run(shutdown));

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.run_address).await?;
    tracing::info!(
        "loyalty-server listening on {}, accrual system at {}",
        config.run_address,
        config.accrual_system_address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
