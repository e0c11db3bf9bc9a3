//! PR Reviewer - reviewer assignment for pull requests inside teams.
//!
//! Assigns up to two reviewers when a pull request is created, lets a
//! reviewer be swapped for another active teammate under a per-record lock,
//! and tracks the pull request from open to merged.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use config::ServerConfig;
use error::AppError;
use services::http_api::ApiState;
use tokio_util::sync::CancellationToken;

/// Start the service with the given configuration and serve until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), AppError> {
    let addr = config.bind_addr()?;

    let pool = db::initialize_with(&config.database_path, config.max_connections).await?;
    let state = ApiState::new(pool.clone(), config.operation_timeout());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[server] Shutdown requested");
        }
        signal_token.cancel();
    });

    services::http_server::serve(addr, state, shutdown).await?;

    pool.close().await;
    Ok(())
}
