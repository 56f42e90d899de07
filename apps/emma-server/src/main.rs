//! Emma Slack Server: receives Events API webhooks and replies in Slack.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use emma_server::config::ServerConfig;
use emma_server::responder::CannedResponder;
use emma_server::server;
use emma_server::slack_client::SlackClient;
use emma_server::state::AppState;

/// Emma - Slack Events API responder
#[derive(Parser)]
#[command(name = "emma-server")]
#[command(author, version, about = "Emma - Slack Events API responder")]
struct Cli {
    /// Path to a YAML config file (default: ~/.emma-server/config.yml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on; overrides config and EMMA_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Values from .env never override the real environment
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("emma_server=info")),
        )
        .init();

    let mut server_config =
        ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        server_config.server.port = port;
    }

    info!("Configuration loaded successfully");

    let slack = SlackClient::with_api_base(
        server_config.slack.bot_token.clone(),
        server_config.slack.api_base.clone(),
    );

    // Startup continues whatever the outcome
    slack.verify_identity(&server_config.slack.bot_user_id).await;

    let app_state = Arc::new(AppState::new(
        Arc::new(slack),
        Arc::new(CannedResponder),
        server_config.slack.bot_user_id.clone(),
        server_config.dedup_ttl(),
    ));

    // Setup graceful shutdown on SIGINT/SIGTERM
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "Cannot register SIGTERM handler");
                ctrl_c.await.ok();
                let _ = shutdown_tx.send(true);
                return;
            }
        };

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT, shutting down...");
        }

        let _ = shutdown_tx.send(true);
    });

    let addr = server_config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, app_state, shutdown_rx)
        .await
        .context("HTTP server failed")?;

    info!("Server shut down cleanly");
    Ok(())
}
