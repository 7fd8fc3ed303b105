use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod error;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::config::settings::AppConfig;
use crate::infrastructure::telegram::client::BotApiClient;
use crate::modules::transcode::encoder::Encoder;
use crate::modules::transcode::orchestrator::Orchestrator;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting rendition bot...");

    let config = Arc::new(AppConfig::new()?);
    let encoder = Arc::new(Encoder::discover(&config).await?);

    if let Some(text) = &config.watermark_text {
        warn!("WATERMARK_TEXT is set ({:?}) but watermarking is not applied", text);
    }
    info!(
        "Profiles: {} | fan-out: {} (up to {} at once) | work dir: {}",
        config
            .profiles
            .iter()
            .map(|p| p.label)
            .collect::<Vec<_>>()
            .join(", "),
        config.fan_out,
        config.encode_concurrency(),
        config.work_dir.display()
    );

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("cannot create {}", config.work_dir.display()))?;

    let client = BotApiClient::from_config(&config)?;
    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        Arc::new(client.clone()),
        encoder.clone(),
    )?);

    let state = AppState::new(config.clone(), encoder.version().to_string());

    tokio::spawn(workers::transcoder::start_transcoder_worker(
        state.clone(),
        client,
        orchestrator,
    ));

    let app = app::create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!("Ops API running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
