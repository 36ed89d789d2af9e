// InfluxDB repository implementation
use crate::application::reading_repository::ReadingRepository;
use crate::domain::reading::{iso8601, Reading};
use crate::infrastructure::config::{prepare_query, InfluxSettings, QueryTemplates};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct InfluxRepository {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
    measurement: String,
    queries: QueryTemplates,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    results: Vec<InfluxQLResult>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxRepository {
    pub fn new(settings: InfluxSettings) -> Self {
        Self {
            host: settings.host.trim_end_matches('/').to_string(),
            token: settings.token,
            database: settings.database,
            retention_policy: settings.retention_policy,
            measurement: settings.measurement,
            queries: settings.queries,
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, query: &str) -> String {
        format!(
            "{}/query?db={}&rp={}&q={}&epoch=ms",
            self.host,
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.retention_policy),
            urlencoding::encode(query)
        )
    }

    fn build_write_url(&self) -> String {
        format!(
            "{}/write?db={}&rp={}&precision=ms",
            self.host,
            urlencoding::encode(&self.database),
            urlencoding::encode(&self.retention_policy)
        )
    }

    fn render(&self, template: &str, sensor_id: Option<&str>, hours: Option<u32>) -> String {
        let mut vars = HashMap::new();
        vars.insert("measurement".to_string(), self.measurement.clone());
        if let Some(sensor_id) = sensor_id {
            vars.insert("sensor".to_string(), escape_tag_literal(sensor_id));
        }
        if let Some(hours) = hours {
            vars.insert("hours".to_string(), hours.to_string());
        }
        prepare_query(template, &vars)
    }

    async fn execute_query(&self, query: &str) -> Result<InfluxQLResponse> {
        let url = self.build_query_url(query);
        tracing::debug!("Executing InfluxQL: {}", query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB query failed with status {}: {}", status, body);
        }

        let data = response
            .json::<InfluxQLResponse>()
            .await
            .context("Failed to parse InfluxDB response")?;

        // Check for errors in the response
        if let Some(result) = data.results.first() {
            if let Some(error) = &result.error {
                anyhow::bail!("InfluxDB query error: {}", error);
            }
        }

        Ok(data)
    }

    fn readings_from(response: &InfluxQLResponse) -> Vec<Reading> {
        let mut readings = Vec::new();
        let Some(series) = response.results.first().and_then(|r| r.series.as_ref()) else {
            return readings;
        };

        for s in series {
            let time_idx = s.columns.iter().position(|c| c == "time").unwrap_or(0);
            let value_idx = s.columns.iter().position(|c| c == "value").unwrap_or(1);

            for row in &s.values {
                let (Some(time), Some(value)) = (row.get(time_idx), row.get(value_idx).and_then(|v| v.as_f64()))
                else {
                    continue;
                };
                if let Some(timestamp) = parse_time(time) {
                    readings.push(Reading::new(timestamp, value));
                }
            }
        }

        readings
    }
}

/// `epoch=ms` yields integers; RFC 3339 strings are accepted for proxies that drop the flag
fn parse_time(value: &serde_json::Value) -> Option<chrono::DateTime<chrono::Utc>> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(chrono::DateTime::from_timestamp_millis),
        serde_json::Value::String(s) => iso8601::parse(s),
        _ => None,
    }
}

fn escape_tag_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Line protocol for one reading: `measurement,sensor=<id> value=<v> <ms>`
fn line_protocol(measurement: &str, sensor_id: &str, reading: &Reading) -> String {
    let escape = |s: &str| s.replace(',', "\\,").replace(' ', "\\ ").replace('=', "\\=");
    format!(
        "{},sensor={} value={} {}",
        escape(measurement),
        escape(sensor_id),
        reading.value,
        reading.timestamp.timestamp_millis()
    )
}

#[async_trait]
impl ReadingRepository for InfluxRepository {
    async fn list_sensor_ids(&self) -> Result<Vec<String>> {
        let query = self.render(&self.queries.sensors, None, None);
        let response = self.execute_query(&query).await?;

        let mut sensors = Vec::new();
        if let Some(series) = response.results.first().and_then(|r| r.series.as_ref()) {
            for s in series {
                for row in &s.values {
                    // SHOW TAG VALUES rows are [key, value]
                    if let Some(id) = row.get(1).and_then(|v| v.as_str()) {
                        sensors.push(id.to_string());
                    }
                }
            }
        }

        tracing::debug!("Found {} sensors", sensors.len());
        Ok(sensors)
    }

    async fn fetch_readings(&self, sensor_id: &str, hours: u32) -> Result<Vec<Reading>> {
        let query = self.render(&self.queries.readings, Some(sensor_id), Some(hours));
        let response = self.execute_query(&query).await?;
        Ok(Self::readings_from(&response))
    }

    async fn latest_reading(&self, sensor_id: &str) -> Result<Option<Reading>> {
        let query = self.render(&self.queries.latest, Some(sensor_id), None);
        let response = self.execute_query(&query).await?;
        Ok(Self::readings_from(&response).pop())
    }

    async fn append_reading(&self, sensor_id: &str, reading: Reading) -> Result<()> {
        let body = line_protocol(&self.measurement, sensor_id, &reading);

        let response = self
            .client
            .post(self.build_write_url())
            .header("Authorization", format!("Token {}", self.token))
            .body(body)
            .send()
            .await
            .context("Failed to send write to InfluxDB")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("InfluxDB write failed with status {}: {}", status, body);
        }

        Ok(())
    }
}
