// Sensor service - Use cases for listing sensors and reading history
use crate::application::reading_repository::ReadingRepository;
use crate::domain::reading::Reading;
use crate::domain::sensor::{Sensor, SensorHistory};
use std::sync::Arc;

#[derive(Clone)]
pub struct SensorService {
    repository: Arc<dyn ReadingRepository>,
}

impl SensorService {
    pub fn new(repository: Arc<dyn ReadingRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_sensors(&self) -> anyhow::Result<Vec<Sensor>> {
        let ids = self.repository.list_sensor_ids().await?;
        Ok(ids.into_iter().map(Sensor::new).collect())
    }

    /// Every sensor paired with its most recent reading, if any
    pub async fn list_sensors_with_latest(&self) -> anyhow::Result<Vec<SensorHistory>> {
        let ids = self.repository.list_sensor_ids().await?;
        let mut sensors = Vec::with_capacity(ids.len());
        for id in ids {
            let latest = self.repository.latest_reading(&id).await?;
            sensors.push(SensorHistory::new(Sensor::new(id), latest.into_iter().collect()));
        }
        Ok(sensors)
    }

    /// Readings for the last `hours`, oldest first, bucket-averaged down to `max_points`.
    /// `None` when the sensor is unknown.
    pub async fn history(
        &self,
        sensor_id: &str,
        hours: u32,
        max_points: usize,
    ) -> anyhow::Result<Option<SensorHistory>> {
        if !self.repository.sensor_exists(sensor_id).await? {
            return Ok(None);
        }

        let mut readings = self.repository.fetch_readings(sensor_id, hours).await?;
        readings.sort_by_key(|r| r.timestamp);

        let readings = if readings.len() > max_points {
            downsample(readings, max_points)
        } else {
            readings
        };

        Ok(Some(SensorHistory::new(Sensor::new(sensor_id.to_string()), readings)))
    }
}

/// Downsample readings using bucket averaging
fn downsample(readings: Vec<Reading>, max_points: usize) -> Vec<Reading> {
    if readings.is_empty() || max_points == 0 || readings.len() <= max_points {
        return readings;
    }

    let bucket_size = (readings.len() as f64 / max_points as f64).ceil() as usize;

    readings
        .chunks(bucket_size)
        .map(|chunk| {
            // Middle reading's timestamp, average value
            let avg_value = chunk.iter().map(|r| r.value).sum::<f64>() / chunk.len() as f64;
            Reading::new(chunk[chunk.len() / 2].timestamp, avg_value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory_repository::MemoryRepository;
    use chrono::{Duration, Utc};

    async fn seeded(count: usize) -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::with_sensors(["lagoon"]));
        let now = Utc::now();
        // Appended newest first
        for i in 0..count {
            repo.append_reading("north_reef", Reading::new(now - Duration::minutes(i as i64), i as f64))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_list_sensors() {
        let service = SensorService::new(seeded(1).await);
        let sensors = service.list_sensors().await.unwrap();
        let names: Vec<&str> = sensors.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["lagoon", "north reef"]);
    }

    #[tokio::test]
    async fn test_list_sensors_with_latest() {
        let service = SensorService::new(seeded(3).await);
        let sensors = service.list_sensors_with_latest().await.unwrap();

        assert_eq!(sensors.len(), 2);
        assert!(sensors[0].readings.is_empty());
        assert_eq!(sensors[1].sensor.id, "north_reef");
        let values: Vec<f64> = sensors[1].readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0.0]);
    }

    #[tokio::test]
    async fn test_history_sorted_oldest_first() {
        let service = SensorService::new(seeded(5).await);
        let history = service.history("north_reef", 24, 100).await.unwrap().unwrap();
        let values: Vec<f64> = history.readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![4.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_history_unknown_sensor() {
        let service = SensorService::new(seeded(1).await);
        assert!(service.history("wreck", 24, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_is_downsampled() {
        let service = SensorService::new(seeded(10).await);
        let history = service.history("north_reef", 24, 4).await.unwrap().unwrap();
        // bucket size ceil(10 / 4) = 3 -> buckets of 3, 3, 3, 1
        let values: Vec<f64> = history.readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![8.0, 5.0, 2.0, 0.0]);
    }

    #[test]
    fn test_downsample_keeps_short_series() {
        let now = Utc::now();
        let readings = vec![Reading::new(now, 1.0), Reading::new(now, 2.0)];
        assert_eq!(downsample(readings.clone(), 5), readings);
    }
}
