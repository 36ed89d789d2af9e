// In-process reading store for local runs and tests
use crate::application::reading_repository::ReadingRepository;
use crate::domain::reading::Reading;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Readings per sensor, kept sorted by timestamp
#[derive(Debug, Default)]
pub struct MemoryRepository {
    readings: RwLock<BTreeMap<String, Vec<Reading>>>,
    retention: Option<Duration>,
}

/// `now - span`, or the earliest representable instant when that underflows
fn cutoff(span: Option<Duration>) -> DateTime<Utc> {
    span.and_then(|span| Utc::now().checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl MemoryRepository {
    /// Register sensors up front so they are listed before their first reading
    pub fn with_sensors<I, S>(sensor_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let readings = sensor_ids
            .into_iter()
            .map(|id| (id.into(), Vec::new()))
            .collect();
        Self {
            readings: RwLock::new(readings),
            retention: None,
        }
    }

    /// Drop readings older than `hours` whenever a new one is appended
    pub fn retaining_hours(mut self, hours: u32) -> Self {
        self.retention = Duration::try_hours(i64::from(hours));
        self
    }
}

#[async_trait]
impl ReadingRepository for MemoryRepository {
    async fn list_sensor_ids(&self) -> Result<Vec<String>> {
        Ok(self.readings.read().await.keys().cloned().collect())
    }

    async fn fetch_readings(&self, sensor_id: &str, hours: u32) -> Result<Vec<Reading>> {
        let since = cutoff(Duration::try_hours(i64::from(hours)));
        let store = self.readings.read().await;
        Ok(store
            .get(sensor_id)
            .map(|readings| {
                let first = readings.partition_point(|r| r.timestamp < since);
                readings[first..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn latest_reading(&self, sensor_id: &str) -> Result<Option<Reading>> {
        let store = self.readings.read().await;
        Ok(store.get(sensor_id).and_then(|readings| readings.last()).cloned())
    }

    async fn append_reading(&self, sensor_id: &str, reading: Reading) -> Result<()> {
        let mut store = self.readings.write().await;
        let readings = store.entry(sensor_id.to_string()).or_default();

        let at = readings.partition_point(|r| r.timestamp <= reading.timestamp);
        readings.insert(at, reading);

        if self.retention.is_some() {
            let since = cutoff(self.retention);
            let stale = readings.partition_point(|r| r.timestamp < since);
            if stale > 0 {
                readings.drain(..stale);
                tracing::debug!("Evicted {} readings for {}", stale, sensor_id);
            }
        }
        Ok(())
    }

    async fn sensor_exists(&self, sensor_id: &str) -> Result<bool> {
        Ok(self.readings.read().await.contains_key(sensor_id))
    }
}
