mod app_state;
mod config;
mod db;
mod error;
mod handlers;
mod middlewares;
mod models;
mod queries;
mod repository;
mod routes;
mod services;
mod video;
mod websocket;
mod workers;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::repository::{MemoryRepository, PgRepository, Repository};
use crate::services::{
    CallService, CallSettings, ContactService, HistoryService, ParticipantService,
    ScheduledService, UserService,
};
use crate::video::{LiveKitClient, VideoBackend};
use crate::websocket::manager::ConnectionHub;
use crate::workers::reminders::{ReminderSettings, ReminderWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calling_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(?config, "starting calling backend");

    let repo: Arc<dyn Repository> = if config.uses_memory_store() {
        info!("using in-memory repository");
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(PgRepository::new(db::connect_to_db(&config.database_url).await?))
    };
    let video: Arc<dyn VideoBackend> = Arc::new(LiveKitClient::new(
        &config.livekit_host,
        config.livekit_api_key.clone(),
        config.livekit_api_secret.clone(),
    )?);
    let hub = ConnectionHub::new(config.hub_buffer_size);

    let settings = CallSettings::from(&config);
    let calls = CallService::new(repo.clone(), video.clone(), hub.clone(), settings.clone());
    let scheduled = ScheduledService::new(repo.clone(), calls.clone(), hub.clone(), settings);
    let history = HistoryService::new(repo.clone());
    let participants = ParticipantService::new(repo.clone(), video, hub.clone());
    let users = UserService::new(repo.clone());
    let contacts = ContactService::new(repo.clone());

    let cancel_token = CancellationToken::new();
    let worker = ReminderWorker::new(
        repo,
        hub.clone(),
        ReminderSettings::with_interval(config.reminder_interval),
    );
    let worker_handle = tokio::spawn(worker.run(cancel_token.clone()));

    let bind_address = config.bind_address.clone();
    let state = app_state::AppState {
        config: Arc::new(config),
        hub,
        calls,
        scheduled,
        history,
        participants,
        users,
        contacts,
    };
    let app = routes::create_routes(state.clone()).with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(address = %bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone()))
        .await
        .context("Server error")?;

    cancel_token.cancel();
    let _ = worker_handle.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    cancel_token.cancel();
}
