use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yellowstone_api::{build_router, AppState, Config};
use yellowstone_events::{open_pool, EventStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    config.log_config();

    let pool = open_pool(&config.database_url, config.db_max_connections).await?;
    let engine = yellowstone_state::open_engine(EventStore::new(pool)).await?;

    let state = Arc::new(AppState::new(engine, config.poll_timeout));
    let app = build_router(state, config.enable_cross_origin);

    let addr = config.bind_addr();
    info!("Yellowstone API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
