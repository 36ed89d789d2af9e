// Reading and forecast domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "temperature")]
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
}

impl ForecastPoint {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64) -> Self {
        Self {
            timestamp,
            temperature,
        }
    }
}

/// Merge a freshly computed forecast into the one a chart is already showing.
///
/// Displayed points at or before `latest_reading` have been overtaken by real
/// data and are dropped; the gap is filled from `fresh` so the number of
/// displayed forecast points stays the same.
pub fn reconcile_forecast(
    displayed: &[ForecastPoint],
    latest_reading: DateTime<Utc>,
    fresh: &[ForecastPoint],
) -> Vec<ForecastPoint> {
    let target = if displayed.is_empty() {
        fresh.len()
    } else {
        displayed.len()
    };

    let mut merged: Vec<ForecastPoint> = displayed
        .iter()
        .filter(|p| p.timestamp > latest_reading)
        .cloned()
        .collect();

    let horizon = merged
        .last()
        .map(|p| p.timestamp)
        .unwrap_or(latest_reading);

    let needed = target.saturating_sub(merged.len());
    merged.extend(
        fresh
            .iter()
            .filter(|p| p.timestamp > horizon)
            .take(needed)
            .cloned(),
    );

    merged
}

/// RFC 3339 timestamps in UTC with millisecond precision, e.g. `2025-01-01T00:05:00.000Z`
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
