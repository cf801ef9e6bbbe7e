//! Command-line entry points for the server binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::database::{run_migrations, MigrationScope};
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "school-erp-api")]
#[command(about = "Multi-tenant school administration API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply pending schema migrations")]
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
}

#[derive(Subcommand)]
pub enum MigrateTarget {
    #[command(about = "Migrate the master registry database")]
    Master,

    #[command(about = "Migrate one trust schema")]
    Trust {
        #[arg(help = "Trust id")]
        trust_id: i64,
    },
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Migrate { target } => migrate(config, target).await,
    }
}

async fn serve(config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in {:?} mode", config.environment);
    }

    let port = port.unwrap_or(config.server.port);
    let state = AppState::from_config(config);
    let connections = state.connections.clone();
    let app = crate::app::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("School ERP API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    connections.close_all().await;
    Ok(())
}

async fn migrate(config: AppConfig, target: MigrateTarget) -> anyhow::Result<()> {
    let state = AppState::from_config(config);

    let applied = match target {
        MigrateTarget::Master => {
            let master = state.connections.master().await?;
            run_migrations(&master, MigrationScope::Master).await?
        }
        MigrateTarget::Trust { trust_id } => state.trust_service().migrate_trust(trust_id).await?,
    };

    if applied.is_empty() {
        println!("Already up to date");
    } else {
        for version in applied {
            println!("Applied {}", version);
        }
    }

    state.connections.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
