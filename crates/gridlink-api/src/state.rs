//! Shared application state.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::DatabaseConnection;
use tracing::info;

use gridlink_core::config::Config;
use gridlink_core::gateway::wait_for_gateway;
use gridlink_db::{establish_connection, migration};
use gridlink_sge::{SgeClient, SgeServices};

/// Bounded wait for the messaging gateway at startup.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AppState {
    pub config: Config,
    pub db: DatabaseConnection,
    pub sge: Arc<dyn SgeServices>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = establish_connection(&config.db.url)
            .await
            .context("database connection")?;
        migration::migrate(&db, Path::new("migrations"))
            .await
            .context("database migration")?;

        wait_for_gateway(&config.messaging.gateway_url, GATEWAY_TIMEOUT)
            .await
            .context("messaging gateway")?;

        let sge = SgeClient::new(&config.sge).context("SGE client")?;
        info!(
            login = %config.sge.login,
            environment = ?config.sge.environment,
            "SGE client ready"
        );

        Ok(AppState {
            config,
            db,
            sge: Arc::new(sge),
        })
    }

    /// Assemble a state from pre-built parts (tests).
    pub fn with_parts(config: Config, db: DatabaseConnection, sge: Arc<dyn SgeServices>) -> Self {
        AppState { config, db, sge }
    }
}
