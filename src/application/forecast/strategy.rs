// Forecast strategy seam
use crate::domain::reading::{ForecastPoint, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Inputs shared by every strategy in one forecast invocation
#[derive(Debug, Clone, Copy)]
pub struct ForecastContext<'a> {
    /// Readings sorted ascending by timestamp
    pub series: &'a [Reading],
    pub count: usize,
    pub step_minutes: u32,
}

impl ForecastContext<'_> {
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.series.last().map(|r| r.timestamp)
    }

    /// Timestamp of the `j`-th future point (1-based); `None` past the representable range
    pub fn future_timestamp(&self, origin: DateTime<Utc>, j: usize) -> Option<DateTime<Utc>> {
        let minutes = i64::from(self.step_minutes).checked_mul(i64::try_from(j).ok()?)?;
        origin.checked_add_signed(Duration::try_minutes(minutes)?)
    }

    /// All `count` future timestamps after `origin`, or `None` if any overflows
    pub fn future_timestamps(&self, origin: DateTime<Utc>) -> Option<Vec<DateTime<Utc>>> {
        (1..=self.count)
            .map(|j| self.future_timestamp(origin, j))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Success(Vec<ForecastPoint>),
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    LanguageModel,
    HoltLinear,
    Linear,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::LanguageModel => "language_model",
            StrategyKind::HoltLinear => "holt_linear",
            StrategyKind::Linear => "linear",
        }
    }
}

#[async_trait]
pub trait ForecastStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn attempt(&self, ctx: &ForecastContext<'_>) -> Attempt;
}

/// Round to two decimals; magnitudes too large to scale are returned as-is
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}
