use clap::Parser;
use school_erp_api::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up MASTER_DB_*, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    let config = school_erp_api::config::config().clone();
    tracing::info!("Starting School ERP API in {:?} mode", config.environment);

    cli::run(Cli::parse(), config).await
}
