// Copyright 2026 The Parley Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use parley::completion::CompletionSession;
use parley::config::{self, ConfigSource};
use parley::gateway;
use parley::upstream;

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "parley", about = "Streaming character-chat relay")]
struct Cli {
    /// Path to the parley.yaml config file
    #[arg(long, default_value = "parley.yaml", env = "PARLEY_CONFIG")]
    config: String,

    /// Port to listen on
    #[arg(long, default_value_t = gateway::BIND_ADDR.1, env = "PARLEY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::from((gateway::BIND_ADDR.0, cli.port));
    tracing::info!(%addr, "parley starting");

    let source = config::FileSource::new(&cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        source = %source.describe(),
        version = %config.version,
        environment = %config.environment,
        upstream = ?config.upstream,
        trailing_fragment = ?config.stream.trailing_fragment,
        "config loaded"
    );

    let client = Arc::new(upstream::build_upstream_client(config.upstream.clone()));
    let completion = CompletionSession::from_config(client, &config);
    let app = gateway::build_router(gateway::AppState::new(completion));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "parley listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
