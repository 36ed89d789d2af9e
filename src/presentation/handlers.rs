// HTTP request handlers
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_HISTORY_POINTS: usize = 150;
const MAX_HISTORY_HOURS: u32 = 24 * 366;
const MAX_STEP_MINUTES: u32 = 7 * 24 * 60;

#[derive(Deserialize)]
pub struct ListQuery {
    /// Attach each sensor's most recent reading
    pub latest: Option<bool>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
    pub max_points: Option<usize>,
}

#[derive(Deserialize)]
pub struct ForecastQuery {
    pub points: Option<usize>,
    pub step: Option<u32>,
}

#[derive(Deserialize)]
pub struct LiveQuery {
    pub points: Option<usize>,
    pub interval_secs: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

async fn respond<T: Serialize>(status: StatusCode, data: &T, headers: &HeaderMap) -> Response {
    match json_response(status, data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

async fn error(status: StatusCode, message: &str, headers: &HeaderMap) -> Response {
    respond(status, &ErrorBody { error: message }, headers).await
}

fn check_points(points: Option<usize>, max_points: usize) -> Result<(), String> {
    match points {
        Some(p) if p < 1 || p > max_points => {
            Err(format!("points must be between 1 and {}", max_points))
        }
        _ => Ok(()),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all temperature sensors
pub async fn list_sensors(
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if query.latest.unwrap_or(false) {
        return match state.sensor_service.list_sensors_with_latest().await {
            Ok(sensors) => respond(StatusCode::OK, &sensors, &headers).await,
            Err(e) => list_failed(e, &headers).await,
        };
    }

    match state.sensor_service.list_sensors().await {
        Ok(sensors) => respond(StatusCode::OK, &sensors, &headers).await,
        Err(e) => list_failed(e, &headers).await,
    }
}

async fn list_failed(e: anyhow::Error, headers: &HeaderMap) -> Response {
    tracing::error!("Error fetching sensors: {:#}", e);
    error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch temperature sensors", headers).await
}

/// Reading history for one sensor
pub async fn sensor_history(
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hours = query
        .hours
        .unwrap_or(state.forecast_service.settings().history_hours);
    let max_points = query.max_points.unwrap_or(DEFAULT_HISTORY_POINTS);
    if hours < 1 || max_points < 1 {
        return error(StatusCode::BAD_REQUEST, "hours and max_points must be at least 1", &headers).await;
    }
    if hours > MAX_HISTORY_HOURS {
        let message = format!("hours must be at most {}", MAX_HISTORY_HOURS);
        return error(StatusCode::BAD_REQUEST, &message, &headers).await;
    }

    match state.sensor_service.history(&id, hours, max_points).await {
        Ok(Some(history)) => respond(StatusCode::OK, &history, &headers).await,
        Ok(None) => error(StatusCode::NOT_FOUND, "Temperature sensor not found", &headers).await,
        Err(e) => {
            tracing::error!("Error fetching readings for {}: {:#}", id, e);
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch temperature sensor", &headers).await
        }
    }
}

/// Forecast the next readings for one sensor
pub async fn forecast_sensor(
    Path(id): Path<String>,
    Query(query): Query<ForecastQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(message) = check_points(query.points, state.forecast_service.settings().max_points) {
        return error(StatusCode::BAD_REQUEST, &message, &headers).await;
    }
    if let Some(step) = query.step {
        if step < 1 || step > MAX_STEP_MINUTES {
            let message = format!("step must be between 1 and {} minutes", MAX_STEP_MINUTES);
            return error(StatusCode::BAD_REQUEST, &message, &headers).await;
        }
    }

    match state
        .forecast_service
        .forecast_for_sensor(&id, query.points, query.step)
        .await
    {
        Ok(Some(forecast)) => respond(StatusCode::OK, &forecast, &headers).await,
        Ok(None) => error(StatusCode::NOT_FOUND, "Temperature sensor not found", &headers).await,
        Err(e) => {
            tracing::error!("Error forecasting {}: {:#}", id, e);
            error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to forecast temperature", &headers).await
        }
    }
}

/// Stream reconciled forecasts for one sensor as newline-delimited JSON
pub async fn stream_forecast(
    Path(id): Path<String>,
    Query(query): Query<LiveQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let settings = state.forecast_service.settings();
    if let Err(message) = check_points(query.points, settings.max_points) {
        return error(StatusCode::BAD_REQUEST, &message, &headers).await;
    }
    let interval_secs = query.interval_secs.unwrap_or(settings.live_poll_secs);
    if interval_secs < 1 {
        return error(StatusCode::BAD_REQUEST, "interval_secs must be at least 1", &headers).await;
    }

    match state.forecast_service.repository().sensor_exists(&id).await {
        Ok(true) => {}
        Ok(false) => return error(StatusCode::NOT_FOUND, "Temperature sensor not found", &headers).await,
        Err(e) => {
            tracing::error!("Error looking up sensor {}: {:#}", id, e);
            return error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch temperature sensor", &headers).await;
        }
    }

    let rx = state
        .live_forecast_service
        .stream_forecast(&id, query.points, Duration::from_secs(interval_secs));
    stream_from_receiver(rx).into_response()
}
