#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use school_erp_api::config::AppConfig;
use school_erp_api::database::{run_migrations, MigrationScope};
use school_erp_api::state::AppState;

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Secret shared with the spawned server so tests can mint tokens.
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // No database is needed for the routes these tests touch; point the
        // master at a closed port so anything that does connect fails fast
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_school-erp-api"));
        cmd.arg("serve")
            .env("PORT", port.to_string())
            .env("NODE_ENV", "development")
            .env("JWT_SECRET", TEST_JWT_SECRET)
            .env("MASTER_DB_HOST", "127.0.0.1")
            .env("MASTER_DB_PORT", "1")
            .env("DATABASE_CONNECTION_TIMEOUT", "2")
            .env("API_ENABLE_RATE_LIMITING", "false")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Library state against a real MySQL server, configured through the usual
/// `MASTER_DB_*` / `TRUST_DB_*` variables. `None` unless `ERP_TEST_MYSQL` is
/// set, so these tests are skipped on machines without a database.
pub async fn mysql_state() -> Result<Option<AppState>> {
    if std::env::var("ERP_TEST_MYSQL").is_err() {
        eprintln!("ERP_TEST_MYSQL not set, skipping database test");
        return Ok(None);
    }
    let state = AppState::from_config(AppConfig::from_env());
    let master = state.connections.master().await?;
    run_migrations(&master, MigrationScope::Master).await?;
    Ok(Some(state))
}

/// Short random suffix so repeated runs never collide on codes or slugs.
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}
