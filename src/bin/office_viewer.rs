//! Headless office viewer
//!
//! Mirrors a hub through the sync client and logs what a renderer would
//! draw: agent moves, walk frames and connection changes.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use office_realtime::animation::{run_frame_loop, EngineSettings, WalkEngine};
use office_realtime::config::SyncConfig;
use office_realtime::domain::office::LocationTable;
use office_realtime::sync::{HttpSnapshotSource, SyncClient, SyncNotification, WsConnector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = SyncConfig::from_env()?;
    info!(ws_url = %config.ws_url, rest_url = %config.rest_url, "Starting viewer");

    let engine = WalkEngine::shared(EngineSettings {
        frame_rate: config.frame_rate,
        ..EngineSettings::default()
    });
    let snapshots =
        HttpSnapshotSource::new(config.rest_url.clone(), config.options.connect_timeout)?;
    let client = Arc::new(SyncClient::new(
        config.options.clone(),
        Arc::new(WsConnector::new(config.ws_url.clone())),
        Arc::new(snapshots),
        Arc::clone(&engine),
        Arc::new(LocationTable::office_default()),
    ));

    let cancel = CancellationToken::new();
    let mut notifications = client.subscribe();
    let frames = tokio::spawn(run_frame_loop(engine, cancel.clone()));
    let sync = tokio::spawn(Arc::clone(&client).run(cancel.clone()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            notification = notifications.recv() => match notification {
                Ok(notification) => render(notification),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Viewer fell behind"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    for (name, handle) in [("sync", sync), ("frames", frames)] {
        if let Err(e) = handle.await {
            warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }
    info!(status = ?client.status().await, "Viewer stopped");

    Ok(())
}

fn render(notification: SyncNotification) {
    match notification {
        SyncNotification::AgentsSync { agents, source, .. } => {
            info!(agents = agents.len(), ?source, "Agents synced");
        }
        SyncNotification::AgentStateChange { event, animated } => {
            info!(
                agent_id = %event.agent_id,
                state = %event.new_state.state,
                location = %event.new_state.location,
                animated,
                "Agent moved"
            );
        }
        SyncNotification::AnimationUpdate(update) => {
            debug!(
                agent_id = %update.agent_id,
                x = update.position.x,
                y = update.position.y,
                progress = update.progress,
                direction = %update.direction,
                "Frame"
            );
        }
        SyncNotification::AnimationComplete(done) => {
            info!(agent_id = %done.agent_id, x = done.position.x, y = done.position.y, "Arrived");
        }
        SyncNotification::ConnectionChanged { state, retry_count } => {
            info!(%state, retry_count, "Connection");
        }
    }
}
