//! Application entry point and server initialization
//!
//! Loads configuration, opens the database and serves the HTTP API with
//! graceful shutdown support.

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use linkmap::config::Config;
use linkmap::logging::init_tracing;
use linkmap::route::create_app;
use linkmap::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    let addr = config.listen_addr();
    let db_path = config.database_path.clone();
    info!(
        app_name = %config.app_name,
        app_version = %config.app_version,
        env_type = %config.env_type,
        "application started"
    );

    let state = AppState::open(config)
        .with_context(|| format!("failed to initialize database at `{}`", db_path))?;
    let app = create_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, database = %db_path, "server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// In-flight requests are allowed to finish, so no write transaction is cut
/// short.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
