use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gridlink_core::config::Config;
use gridlink_core::gateway::wait_for_gateway;
use gridlink_db::establish_connection;
use gridlink_streams::crypto::KeyPair;
use gridlink_streams::files::StreamsFiles;
use gridlink_streams::gateway::GatewaySender;
use gridlink_streams::publisher::Publisher;
use gridlink_streams::throttle::Throttle;
use gridlink_streams::{ingest, watch};

struct Args {
    config_path: String,
    publish_archives: bool,
    user: Option<String>,
    filter: Option<String>,
    watch: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config_path: String::new(),
        publish_archives: false,
        user: None,
        filter: None,
        watch: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--publish-archives" => args.publish_archives = true,
            "--watch" => args.watch = true,
            "--user" => args.user = iter.next(),
            "--filter" => args.filter = iter.next(),
            other if args.config_path.is_empty() => args.config_path = other.to_string(),
            other => anyhow::bail!("unexpected argument {other}"),
        }
    }

    if args.config_path.is_empty() {
        anyhow::bail!(
            "usage: gridlink-publisher <config.json> [--publish-archives] [--user JID] [--filter SUBSTR] [--watch]"
        );
    }
    if args.publish_archives && args.user.is_none() {
        // Replaying the whole archive to every subscriber is never
        // what anyone wants.
        anyhow::bail!("please provide a single --user when publishing archives");
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let config = Config::load(&args.config_path)?;

    std::fs::create_dir_all(&config.logs_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.logs_dir.join("publisher.log"))?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().compact())
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(log_file)))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting gridlink publisher");

    let db = establish_connection(&config.db.url).await?;

    let keys = config
        .streams
        .keys
        .iter()
        .map(KeyPair::from_config)
        .collect::<Result<Vec<_>, _>>()?;
    let streams = StreamsFiles {
        inbox_dir: config.streams.inbox_dir.clone(),
        archive_dir: config.streams.archive_dir.clone(),
        errors_dir: config.streams.errors_dir.clone(),
        keys,
        publish_archives: args.publish_archives,
    };

    wait_for_gateway(&config.messaging.gateway_url, Duration::from_secs(10)).await?;
    let sender = GatewaySender::new(&config.messaging.gateway_url, &config.messaging.jid)?;
    let throttle = Throttle::new(config.streams.record_rate);
    let publisher = Publisher {
        db: &db,
        sender: &sender,
        throttle: &throttle,
        chunk_size: config.streams.chunk_size,
        user_filter: args.user.clone(),
    };

    ingest::run_pass(&streams, &db, &publisher, args.filter.as_deref()).await?;

    if args.watch && !args.publish_archives {
        let (_watcher, mut events) = watch::watch_inbox(&config.streams.inbox_dir)?;
        while watch::await_activity(&mut events, Duration::from_secs(2)).await {
            ingest::run_pass(&streams, &db, &publisher, args.filter.as_deref()).await?;
        }
    }

    Ok(())
}
