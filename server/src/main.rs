//! order-mirror server.
//!
//! Mirrors orders from the order stream into `PostgreSQL` and an in-memory
//! cache, and serves lookups over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL and Redpanda
//! docker compose up -d
//!
//! # Run the server
//! cargo run --bin order-mirror
//! ```

use order_mirror_server::app;
use order_mirror_server::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,order_mirror=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting order-mirror");
    tracing::info!(url = %config.database.url, "Database");
    tracing::info!(brokers = %config.stream.brokers, topic = %config.stream.topic, "Order stream");
    tracing::info!(path = %config.checkpoint_path.display(), "Checkpoint file");

    if let Err(e) = app::run(config).await {
        tracing::error!(error = ?e, "order-mirror stopped with an error");
        return Err(e);
    }

    tracing::info!("order-mirror shut down cleanly");
    Ok(())
}
