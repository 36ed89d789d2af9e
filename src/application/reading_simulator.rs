// Reading simulator - Periodic synthetic temperature readings
use crate::application::reading_repository::ReadingRepository;
use crate::domain::reading::Reading;
use crate::infrastructure::config::{SimulatedSensor, SimulatorSettings};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the simulation loop. Each tick appends one reading per configured sensor.
pub fn start_reading_simulation(
    repository: Arc<dyn ReadingRepository>,
    settings: SimulatorSettings,
) -> JoinHandle<()> {
    let period = Duration::from_secs(settings.interval_minutes.max(1) * 60);

    tracing::info!(
        "Temperature simulation started for {} sensors every {} minutes",
        settings.sensors.len(),
        settings.interval_minutes.max(1)
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            for sensor in &settings.sensors {
                if let Err(e) = simulate_once(repository.as_ref(), sensor, settings.max_step).await {
                    tracing::error!("Simulated reading for {} failed: {:#}", sensor.id, e);
                }
            }
        }
    })
}

pub async fn simulate_once(
    repository: &dyn ReadingRepository,
    sensor: &SimulatedSensor,
    max_step: f64,
) -> anyhow::Result<Reading> {
    let previous = repository
        .latest_reading(&sensor.id)
        .await?
        .map(|r| r.value)
        .unwrap_or(sensor.base_temperature);

    // thread_rng is not Send; draw before the next await
    let delta = if max_step > 0.0 {
        rand::thread_rng().gen_range(-max_step..=max_step)
    } else {
        0.0
    };

    let reading = Reading::new(Utc::now(), next_value(previous, delta, sensor.min, sensor.max));
    repository.append_reading(&sensor.id, reading.clone()).await?;

    tracing::debug!("Simulated {} -> {:.2}", sensor.id, reading.value);
    Ok(reading)
}

fn next_value(previous: f64, delta: f64, min: f64, max: f64) -> f64 {
    let value = (previous + delta).clamp(min.min(max), max.max(min));
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_repository::MemoryRepository;

    fn sensor(base: f64) -> SimulatedSensor {
        SimulatedSensor {
            id: "north_reef".to_string(),
            base_temperature: base,
            min: 20.0,
            max: 30.0,
        }
    }

    #[test]
    fn test_next_value_clamps_and_rounds() {
        assert_eq!(next_value(29.9, 0.5, 20.0, 30.0), 30.0);
        assert_eq!(next_value(20.1, -0.5, 20.0, 30.0), 20.0);
        assert_eq!(next_value(24.0, 0.123, 20.0, 30.0), 24.12);
    }

    #[tokio::test]
    async fn test_first_reading_walks_from_base() {
        let repo = MemoryRepository::default();
        let reading = simulate_once(&repo, &sensor(25.0), 0.3).await.unwrap();
        assert!((reading.value - 25.0).abs() <= 0.3 + 1e-9);
        assert_eq!(repo.fetch_readings("north_reef", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_walk_continues_from_latest() {
        let repo = MemoryRepository::default();
        repo.append_reading("north_reef", Reading::new(Utc::now(), 22.0))
            .await
            .unwrap();

        let reading = simulate_once(&repo, &sensor(25.0), 0.0).await.unwrap();
        assert_eq!(reading.value, 22.0);
        assert!(repo.latest_reading("north_reef").await.unwrap().unwrap().timestamp >= reading.timestamp);
    }

    #[tokio::test]
    async fn test_values_stay_in_range() {
        let repo = MemoryRepository::default();
        for _ in 0..50 {
            let reading = simulate_once(&repo, &sensor(29.9), 2.0).await.unwrap();
            assert!((20.0..=30.0).contains(&reading.value));
        }
    }
}
