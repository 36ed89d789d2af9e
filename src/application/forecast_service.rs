// Forecast service - Use case for forecasting one sensor's temperature
use crate::application::completion::{TextCompletion, TimeoutCompletion};
use crate::application::forecast::{forecast, Forecast, Forecaster, StrategyKind};
use crate::application::reading_repository::ReadingRepository;
use crate::domain::reading::{ForecastPoint, Reading};
use crate::infrastructure::config::ForecastSettings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorForecast {
    pub sensor_id: String,
    pub step_minutes: u32,
    pub model: Option<StrategyKind>,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Clone)]
pub struct ForecastService {
    repository: Arc<dyn ReadingRepository>,
    completion: Option<Arc<dyn TextCompletion>>,
    settings: ForecastSettings,
}

impl ForecastService {
    pub fn new(
        repository: Arc<dyn ReadingRepository>,
        completion: Option<Arc<dyn TextCompletion>>,
        settings: ForecastSettings,
    ) -> Self {
        let completion = completion.map(|inner| {
            Arc::new(TimeoutCompletion::new(
                inner,
                Duration::from_secs(settings.completion_timeout_secs),
            )) as Arc<dyn TextCompletion>
        });

        Self {
            repository,
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub fn repository(&self) -> Arc<dyn ReadingRepository> {
        self.repository.clone()
    }

    /// `None` when the sensor is unknown
    pub async fn forecast_for_sensor(
        &self,
        sensor_id: &str,
        points: Option<usize>,
        default_step_minutes: Option<u32>,
    ) -> anyhow::Result<Option<SensorForecast>> {
        if !self.repository.sensor_exists(sensor_id).await? {
            return Ok(None);
        }

        let readings = self
            .repository
            .fetch_readings(sensor_id, self.settings.history_hours)
            .await?;

        let outcome = self
            .forecast_readings(&readings, points, default_step_minutes)
            .await?;

        tracing::info!(
            "Forecast for {}: {} points via {} from {} readings",
            sensor_id,
            outcome.points.len(),
            outcome.strategy.map(|s| s.as_str()).unwrap_or("none"),
            readings.len()
        );

        Ok(Some(SensorForecast {
            sensor_id: sensor_id.to_string(),
            step_minutes: outcome.step_minutes,
            model: outcome.strategy,
            forecast: outcome.points,
        }))
    }

    pub async fn forecast_readings(
        &self,
        readings: &[Reading],
        points: Option<usize>,
        default_step_minutes: Option<u32>,
    ) -> anyhow::Result<Forecast> {
        let outcome = Forecaster::from_completion(self.completion.as_deref())
            .run(
                readings,
                points.unwrap_or(self.settings.points),
                default_step_minutes.unwrap_or(self.settings.default_step_minutes),
            )
            .await?;

        Ok(outcome)
    }

    /// Forecast points only, at the configured default step
    pub async fn forecast_points(
        &self,
        readings: &[Reading],
        points: Option<usize>,
    ) -> anyhow::Result<Vec<ForecastPoint>> {
        Ok(forecast(
            readings,
            points.unwrap_or(self.settings.points),
            self.settings.default_step_minutes,
            self.completion.as_deref(),
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::completion::mock::MockCompletion;
    use crate::infrastructure::memory_repository::MemoryRepository;
    use chrono::{Duration as ChronoDuration, Utc};

    async fn repository_with(values: &[f64]) -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::with_sensors(["empty"]));
        let start = Utc::now() - ChronoDuration::minutes(10 * values.len() as i64);
        for (i, v) in values.iter().enumerate() {
            repo.append_reading("reef", Reading::new(start + ChronoDuration::minutes(10 * i as i64), *v))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_forecast_uses_configured_count_and_inferred_step() {
        let service = ForecastService::new(
            repository_with(&[24.0, 24.2, 24.1, 24.5]).await,
            None,
            ForecastSettings::default(),
        );

        let result = service.forecast_for_sensor("reef", None, None).await.unwrap().unwrap();
        assert_eq!(result.forecast.len(), 12);
        assert_eq!(result.step_minutes, 10);
        assert_eq!(result.model, Some(StrategyKind::HoltLinear));
    }

    #[tokio::test]
    async fn test_unknown_sensor() {
        let service = ForecastService::new(repository_with(&[]).await, None, ForecastSettings::default());
        assert!(service.forecast_for_sensor("wreck", None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sensor_without_readings_gets_empty_forecast() {
        let service = ForecastService::new(repository_with(&[]).await, None, ForecastSettings::default());
        let result = service.forecast_for_sensor("empty", Some(4), None).await.unwrap().unwrap();
        assert!(result.forecast.is_empty());
        assert_eq!(result.model, None);
    }

    #[tokio::test]
    async fn test_points_only_matches_detailed_forecast() {
        let service = ForecastService::new(
            repository_with(&[24.0, 24.2, 24.1, 24.5]).await,
            None,
            ForecastSettings::default(),
        );
        let readings = service.repository().fetch_readings("reef", 24).await.unwrap();

        let points = service.forecast_points(&readings, Some(5)).await.unwrap();
        let detailed = service.forecast_readings(&readings, Some(5), None).await.unwrap();
        assert_eq!(points, detailed.points);
    }

    #[tokio::test]
    async fn test_unreachable_horizon_is_an_invalid_argument() {
        let service = ForecastService::new(repository_with(&[24.0]).await, None, ForecastSettings::default());
        let err = service
            .forecast_for_sensor("reef", Some(40), Some(u32::MAX))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::application::forecast::engine::ForecastError>(),
            Some(crate::application::forecast::engine::ForecastError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_count_is_an_error() {
        let service = ForecastService::new(
            repository_with(&[24.0, 24.2]).await,
            None,
            ForecastSettings::default(),
        );
        assert!(service.forecast_for_sensor("reef", Some(0), None).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_completion_times_out_into_trend_model() {
        let completion: Arc<dyn TextCompletion> =
            Arc::new(MockCompletion::replying("[]").with_delay(std::time::Duration::from_secs(120)));
        let settings = ForecastSettings {
            completion_timeout_secs: 1,
            ..ForecastSettings::default()
        };
        let service = ForecastService::new(
            repository_with(&[24.0, 24.2, 24.1, 24.5]).await,
            Some(completion),
            settings,
        );

        let result = service.forecast_for_sensor("reef", Some(3), None).await.unwrap().unwrap();
        assert_eq!(result.model, Some(StrategyKind::HoltLinear));
        assert_eq!(result.forecast.len(), 3);
    }

    #[test]
    fn test_response_shape() {
        let forecast = SensorForecast {
            sensor_id: "reef".to_string(),
            step_minutes: 5,
            model: Some(StrategyKind::HoltLinear),
            forecast: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&forecast).unwrap(),
            serde_json::json!({"sensorId": "reef", "stepMinutes": 5, "model": "holt_linear", "forecast": []})
        );
    }
}
