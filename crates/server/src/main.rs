use std::sync::Arc;

use anyhow::{Context, Error as AnyhowError};
use axum::http::HeaderValue;
use remote::{ConfigError, RemoteConfig, SupabaseClient};
use server::{AppState, file_logging, routes};
use thiserror::Error;
use utils::assets::asset_dir;

#[derive(Debug, Error)]
pub enum StrofloError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), StrofloError> {
    dotenvy::dotenv().ok();

    // Held until exit so buffered file logs are flushed
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let config = RemoteConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid backend configuration");
    })?;
    tracing::info!(supabase_url = %config.supabase_url, "Using hosted backend");
    let client = SupabaseClient::new(config)?;

    let mut state = AppState::new(Arc::new(client));
    if let Ok(origin) = std::env::var("STROFLO_ALLOWED_ORIGIN") {
        let origin = HeaderValue::from_str(origin.trim())
            .with_context(|| format!("Invalid STROFLO_ALLOWED_ORIGIN: {origin}"))?;
        tracing::info!(origin = ?origin, "Allowing cross-origin API calls");
        state = state.with_allowed_origin(origin);
    }
    state.session().start().await;

    let port = std::env::var("STROFLO_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or_else(|| {
            tracing::info!("No PORT environment variable set, using port 0 for auto-assignment");
            0
        });
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    let app = routes::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.session().shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
