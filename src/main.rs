use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use contact_gateway::config::Args;
use contact_gateway::state::AppState;
use contact_gateway::sweeper::sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    let state = Arc::new(AppState::from_args(&args));

    // spawn the background sweeper
    tokio::spawn(sweeper(state.clone(), args.sweep_interval()));

    let app = contact_gateway::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("Contact gateway running on http://localhost:{}", args.port);
    info!(
        "Contact limit: {} submissions per {} seconds",
        args.contact_limit, args.contact_window
    );
    info!("API limit: {} requests per {} seconds", args.api_limit, args.api_window);
    match &args.mail_api_url {
        Some(url) => info!("Delivering mail via {url}"),
        None => info!("No mail provider configured, messages will only be logged"),
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Contact gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
