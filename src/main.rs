use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use office_realtime::agents::{
    run_simulation, spawn_forwarder, HttpPublisher, HubPublisher, OfficeEventBus,
    OfficeStateManager, OfficeWorkflows, PhaseTimings, TransitionPublisher,
};
use office_realtime::api;
use office_realtime::config::HubConfig;
use office_realtime::domain::office::LocationTable;
use office_realtime::domain::repositories::OfficeRepository;
use office_realtime::hub::EventHub;
use office_realtime::infrastructure::repositories::{
    InMemoryOfficeRepository, PostgresOfficeRepository,
};

const OFFICE_KEY: &str = "office";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = HubConfig::from_env()?;
    let hub = Arc::new(EventHub::new(config.history_capacity, config.subscriber_buffer));
    let shutdown = CancellationToken::new();

    let simulation = if config.simulate {
        Some(start_simulation(&config, Arc::clone(&hub), shutdown.clone()).await?)
    } else {
        None
    };

    let app = api::router(Arc::clone(&hub));

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handles) = simulation {
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }
    }

    Ok(())
}

async fn start_simulation(
    config: &HubConfig,
    hub: Arc<EventHub>,
    shutdown: CancellationToken,
) -> Result<Vec<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error>> {
    let repository: Arc<dyn OfficeRepository> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
            let repository = PostgresOfficeRepository::new(pool, OFFICE_KEY);
            repository.ensure_schema().await?;
            tracing::info!("Database connected successfully");
            Arc::new(repository)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, office state will not survive restarts");
            Arc::new(InMemoryOfficeRepository::new())
        }
    };

    let bus = OfficeEventBus::default();
    let publisher: Arc<dyn TransitionPublisher> = match &config.publish_url {
        Some(url) => {
            tracing::info!(url = %url, "Forwarding transitions to remote hub");
            Arc::new(HttpPublisher::new(url.clone(), Duration::from_secs(10))?)
        }
        None => Arc::new(HubPublisher::new(hub)),
    };
    let forwarder = spawn_forwarder(&bus, publisher, shutdown.clone());

    let locations = Arc::new(LocationTable::office_default());
    let manager = OfficeStateManager::load_or_seed(repository, locations, bus).await?;
    let workflows = Arc::new(OfficeWorkflows::new(Arc::new(manager), PhaseTimings::default()));

    let simulation = tokio::spawn(run_simulation(workflows, config.work_duration, shutdown));

    Ok(vec![forwarder, simulation])
}
