use std::sync::Arc;

use anyhow::Context;
use duochat::{app, db, logging, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_tracing(&config);

    let db_pool = db::connect(&config)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let bind_addr = config.bind_addr;
    let app = app(AppState {
        db_pool,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
