mod api;
mod cli;
mod live;
mod router;
mod startup;
mod state;


use std::sync::Arc;

use clap::Parser;
use leadsync_core::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn load_config() -> anyhow::Result<Config> {
    leadsync_core::config::load_dotenv();
    let config = Config::from_env();
    config.validate()?;
    config.log_summary();
    Ok(config)
}

async fn serve(config: &Config, no_poll: bool) -> anyhow::Result<()> {
    let state = startup::build_state(config)?;
    let app = router::build_router(state.clone(), router::cors_layer(&config.server.cors_origin));

    if no_poll {
        warn!("scheduler not started (--no-poll); use POST /api/poller/trigger");
    } else {
        state.scheduler.start();
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("  API:    http://{}/api", addr);
    info!("  Live:   ws://{}/ws", addr);
    info!("  Health: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.scheduler.stop();
    info!("Server closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully...");
}

async fn poll_once(config: &Config) -> anyhow::Result<()> {
    let sink = Arc::new(startup::build_dispatcher(config, None)?);
    let scheduler = startup::build_scheduler(config, sink)?;

    let outcome = scheduler.trigger().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if let leadsync_poller::CycleOutcome::Failed { error } = outcome {
        anyhow::bail!("polling cycle failed: {error}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command() {
        Command::Serve { no_poll } => serve(&config, no_poll).await,
        Command::PollOnce => poll_once(&config).await,
    }
}
