// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::completion::TextCompletion;
use crate::application::forecast_service::ForecastService;
use crate::application::live_forecast_service::LiveForecastService;
use crate::application::reading_repository::ReadingRepository;
use crate::application::reading_simulator::start_reading_simulation;
use crate::application::sensor_service::SensorService;
use crate::infrastructure::config::{load_config, AppConfig, StorageBackend};
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::infrastructure::memory_repository::MemoryRepository;
use crate::infrastructure::openai_client::OpenAiCompletion;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    forecast_sensor, health_check, list_sensors, sensor_history, stream_forecast,
};

fn build_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn ReadingRepository>> {
    match config.storage.backend {
        StorageBackend::Influx => {
            let settings = config
                .influx
                .clone()
                .context("storage.backend = \"influx\" requires an [influx] section")?;
            tracing::info!("Using InfluxDB at {}", settings.host);
            Ok(Arc::new(InfluxRepository::new(settings)))
        }
        StorageBackend::Memory => {
            tracing::info!(
                "Using in-memory reading store ({}h retention)",
                config.storage.retention_hours
            );
            let sensors = config.simulator.sensors.iter().map(|s| s.id.clone());
            Ok(Arc::new(
                MemoryRepository::with_sensors(sensors).retaining_hours(config.storage.retention_hours),
            ))
        }
    }
}

fn build_completion(config: &AppConfig) -> Option<Arc<dyn TextCompletion>> {
    match &config.openai {
        Some(settings) if !settings.api_key.is_empty() => {
            tracing::info!("Language-model forecasts enabled ({})", settings.model);
            Some(Arc::new(OpenAiCompletion::new(settings.clone())))
        }
        _ => {
            tracing::info!("No OpenAI key configured; forecasting with the trend model only");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_config()?;

    // Create repository and capabilities (infrastructure layer)
    let repository = build_repository(&config)?;
    let completion = build_completion(&config);

    // Create services (application layer)
    let sensor_service = SensorService::new(repository.clone());
    let forecast_service =
        ForecastService::new(repository.clone(), completion, config.forecast.clone());
    let live_forecast_service = LiveForecastService::new(forecast_service.clone());

    if config.simulator.enabled {
        start_reading_simulation(repository.clone(), config.simulator.clone());
    }

    let state = Arc::new(AppState {
        sensor_service,
        forecast_service,
        live_forecast_service,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/api/temperatures", get(list_sensors))
        .route("/api/temperatures/:id", get(sensor_history))
        .route("/api/temperatures/:id/forecast", get(forecast_sensor))
        .route("/api/temperatures/:id/forecast/live", get(stream_forecast))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid server.bind_addr {:?}", config.server.bind_addr))?;
    tracing::info!("Starting fishydex-forecast on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
