// Live forecast service - Periodic forecast refresh reconciled against new readings
use crate::application::forecast_service::ForecastService;
use crate::domain::reading::{reconcile_forecast, ForecastPoint, Reading};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Serialize)]
pub struct LiveForecastUpdate {
    pub latest: Option<Reading>,
    pub forecast: Vec<ForecastPoint>,
    /// Previously sent forecast points that real readings have overtaken
    pub replaced: usize,
}

#[derive(Clone)]
pub struct LiveForecastService {
    forecast_service: ForecastService,
}

impl LiveForecastService {
    pub fn new(forecast_service: ForecastService) -> Self {
        Self { forecast_service }
    }

    /// Emit a reconciled forecast every `poll_interval` until the receiver is dropped
    pub fn stream_forecast(
        &self,
        sensor_id: &str,
        points: Option<usize>,
        poll_interval: Duration,
    ) -> mpsc::Receiver<LiveForecastUpdate> {
        let (tx, rx) = mpsc::channel(16);
        let service = self.forecast_service.clone();
        let sensor_id = sensor_id.to_string();

        tokio::spawn(async move {
            let mut ticks = IntervalStream::new(tokio::time::interval(poll_interval));
            let mut displayed: Vec<ForecastPoint> = Vec::new();

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    tick = ticks.next() => {
                        if tick.is_none() {
                            break;
                        }
                    }
                }

                let update = match Self::refresh(&service, &sensor_id, points, &displayed).await {
                    Ok(update) => update,
                    Err(e) => {
                        tracing::error!("Live forecast refresh for {} failed: {:#}", sensor_id, e);
                        continue;
                    }
                };

                displayed = update.forecast.clone();
                if tx.send(update).await.is_err() {
                    break;
                }
            }

            tracing::debug!("Live forecast stream for {} closed", sensor_id);
        });

        rx
    }

    async fn refresh(
        service: &ForecastService,
        sensor_id: &str,
        points: Option<usize>,
        displayed: &[ForecastPoint],
    ) -> anyhow::Result<LiveForecastUpdate> {
        let repository = service.repository();
        let readings = repository
            .fetch_readings(sensor_id, service.settings().history_hours)
            .await?;
        let latest = readings.iter().max_by_key(|r| r.timestamp).cloned();

        let fresh = service.forecast_points(&readings, points).await?;

        let (forecast, replaced) = match &latest {
            Some(latest) => {
                let overtaken = displayed
                    .iter()
                    .filter(|p| p.timestamp <= latest.timestamp)
                    .count();
                (reconcile_forecast(displayed, latest.timestamp, &fresh), overtaken)
            }
            None => (fresh, 0),
        };

        Ok(LiveForecastUpdate {
            latest,
            forecast,
            replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reading_repository::ReadingRepository;
    use crate::infrastructure::config::ForecastSettings;
    use crate::infrastructure::memory_repository::MemoryRepository;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stream_reconciles_as_readings_arrive() {
        let repo = Arc::new(MemoryRepository::default());
        let start = Utc::now() - ChronoDuration::minutes(30);
        for i in 0..3 {
            repo.append_reading("reef", Reading::new(start + ChronoDuration::minutes(5 * i), 24.0))
                .await
                .unwrap();
        }

        let forecast_service = ForecastService::new(repo.clone(), None, ForecastSettings::default());
        let live = LiveForecastService::new(forecast_service);
        let mut rx = live.stream_forecast("reef", Some(4), Duration::from_millis(10));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.forecast.len(), 4);
        assert_eq!(first.replaced, 0);

        // A real reading lands on the first forecast timestamp
        let overtaking = first.forecast[0].timestamp;
        repo.append_reading("reef", Reading::new(overtaking, 24.0)).await.unwrap();

        // Skip refreshes that ran before the append landed
        let second = loop {
            let update = rx.recv().await.unwrap();
            if update.latest.as_ref().map(|r| r.timestamp) == Some(overtaking) {
                break update;
            }
            assert_eq!(update.forecast, first.forecast);
        };
        assert_eq!(second.replaced, 1);
        assert_eq!(second.forecast.len(), 4);
        assert!(second.forecast.iter().all(|p| p.timestamp > overtaking));
        assert_eq!(second.forecast[0..3], first.forecast[1..4]);
    }

    #[tokio::test]
    async fn test_stream_for_sensor_without_readings() {
        let repo = Arc::new(MemoryRepository::with_sensors(["lagoon"]));
        let live = LiveForecastService::new(ForecastService::new(repo, None, ForecastSettings::default()));
        let mut rx = live.stream_forecast("lagoon", Some(4), Duration::from_millis(10));

        let update = rx.recv().await.unwrap();
        assert!(update.latest.is_none());
        assert!(update.forecast.is_empty());
    }
}
