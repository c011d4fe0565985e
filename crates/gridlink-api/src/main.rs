use std::time::Duration;

use actix_web::{web, App, HttpServer};
use tracing::info;

use gridlink_api::{logging, routes, workers::RenewalWorker, AppState};
use gridlink_core::config::Config;

/// Upstream orders live for up to a year; checking daily is plenty.
const RENEWAL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GRIDLINK_CONFIG").ok())
        .ok_or_else(|| anyhow::anyhow!("usage: gridlink-api <config.json>"))?;
    let config = Config::load(&config_path)?;

    logging::init_logging(&config.logs_dir, "proxy.log")?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting gridlink proxy");

    let state = AppState::new(config.clone()).await?;

    let worker = RenewalWorker::new(state.db.clone(), state.sge.clone(), RENEWAL_INTERVAL);
    tokio::spawn(worker.run());

    let state = web::Data::new(state);
    let listen = config.messaging.listen.clone();
    info!(%listen, "Command surface listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(listen)?
    .run()
    .await?;

    Ok(())
}
