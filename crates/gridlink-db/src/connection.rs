//! Database connection management.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::error::Result;

/// Establish a connection pool against the configured PostgreSQL URL.
pub async fn establish_connection(url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .max_connections(10)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    tracing::info!("Connecting to database");
    let connection = Database::connect(options).await?;
    Ok(connection)
}
