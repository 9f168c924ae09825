//! `tgate`: the Tenantgate gateway binary.

mod cli;
mod http;
mod state;

use std::path::PathBuf;

use clap::Parser;
use tenantgate_infra::config::{load_gateway_config, resolve_config_dir};
use tenantgate_observe::tracing_setup::{
    TracingOptions, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        default_filter: filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config_dir = cli.config_dir.clone().unwrap_or_else(resolve_config_dir);

    let result = match cli.command {
        Commands::Serve { host, port } => serve(config_dir, host, port, cli.quiet).await,
        Commands::Check => cli::check::check(&config_dir, cli.json).await,
    };

    shutdown_tracing();
    result
}

async fn serve(
    config_dir: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = load_gateway_config(&config_dir).await;
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| config.server.host.clone()),
        port.unwrap_or(config.server.port)
    );

    let state = AppState::init(config)?;
    state.provision_all().await?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, sessions = state.registry.len(), "gateway listening");
    if !quiet {
        println!("  Tenantgate listening on http://{addr}");
        println!("  Press Ctrl+C to stop");
    }

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    if !quiet {
        println!("\n  Gateway stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
