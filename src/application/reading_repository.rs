// Repository trait for sensor reading access
use crate::domain::reading::Reading;
use async_trait::async_trait;

#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// List all known sensor IDs
    async fn list_sensor_ids(&self) -> anyhow::Result<Vec<String>>;

    /// Readings for one sensor over the last `hours`, in storage order
    async fn fetch_readings(&self, sensor_id: &str, hours: u32) -> anyhow::Result<Vec<Reading>>;

    /// Most recent reading regardless of age
    async fn latest_reading(&self, sensor_id: &str) -> anyhow::Result<Option<Reading>>;

    async fn append_reading(&self, sensor_id: &str, reading: Reading) -> anyhow::Result<()>;

    async fn sensor_exists(&self, sensor_id: &str) -> anyhow::Result<bool> {
        Ok(self.list_sensor_ids().await?.iter().any(|id| id == sensor_id))
    }
}
