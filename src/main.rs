use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use panel_sync::config::Config;
use panel_sync::scheduler::Scheduler;
use panel_sync::v2board::{
    ApiClient, DetectRule, EventCallback, NodeInfo, OnlineUser, UserInfo, UserTraffic,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log every panel request and response at info level
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print version information
    Version,
}

/// Logs what the panel hands out. A proxy engine plugs in here.
struct LoggingCallback;

#[async_trait]
impl EventCallback for LoggingCallback {
    fn on_node_info_updated(&self, node_info: NodeInfo) {
        info!(
            "[Callback] Node updated: type={}, port={}, transport={}, tls={}",
            node_info.node_type, node_info.port, node_info.transport_protocol, node_info.enable_tls
        );
    }

    fn on_users_updated(&self, users: Vec<UserInfo>) {
        info!("[Callback] Users updated: {} users", users.len());
    }

    fn on_rules_updated(&self, rules: Vec<DetectRule>) {
        info!("[Callback] Detection rules updated: {} rules", rules.len());
    }

    async fn get_online_users(&self) -> Option<Vec<OnlineUser>> {
        None
    }

    async fn get_traffic_data(&self) -> Option<Vec<UserTraffic>> {
        None
    }
}

fn show_version() {
    println!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION")
    );
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();
    if let Some(Command::Version) = args.command {
        show_version();
        return Ok(());
    }

    info!("Starting panel sync...");
    info!("Loading configuration from: {}", args.config);

    let config = Config::load_from_file(&args.config)?;
    debug!("Sync settings: {:?}", config.sync);

    // Create API client
    let api_client = ApiClient::new(config.api.clone()).context("cannot create API client")?;
    api_client.set_debug(args.debug);
    let info = api_client.describe();
    info!("Node {} ({}) on {}", info.node_id, info.node_type, info.api_host);

    let scheduler = Scheduler::new(Arc::new(api_client), Arc::new(LoggingCallback), &config.sync);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    info!("Starting scheduler...");
    scheduler.run(cancel).await;

    Ok(())
}
