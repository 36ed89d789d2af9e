// Holt trend model - Linear (double exponential) smoothing
//
//   level_t = α·x_t + (1 - α)·(level_{t-1} + trend_{t-1})
//   trend_t = β·(level_t - level_{t-1}) + (1 - β)·trend_{t-1}
//   F_{t+h} = level_t + h·trend_t
use super::strategy::{round2, Attempt, ForecastContext, ForecastStrategy, StrategyKind};
use crate::domain::reading::{ForecastPoint, Reading};
use async_trait::async_trait;

pub const LEVEL_SMOOTHING: f64 = 0.4;
pub const TREND_SMOOTHING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendState {
    pub level: f64,
    pub trend: f64,
}

impl TrendState {
    pub fn project(&self, steps_ahead: usize) -> f64 {
        self.level + self.trend * steps_ahead as f64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HoltLinear {
    alpha: f64,
    beta: f64,
}

impl Default for HoltLinear {
    fn default() -> Self {
        Self {
            alpha: LEVEL_SMOOTHING,
            beta: TREND_SMOOTHING,
        }
    }
}

impl HoltLinear {
    /// Run one smoothing pass over `sorted`. `None` for an empty series.
    pub fn smooth(&self, sorted: &[Reading]) -> Option<TrendState> {
        let first = sorted.first()?;
        let mut state = TrendState {
            level: first.value,
            trend: sorted.get(1).map(|second| second.value - first.value).unwrap_or(0.0),
        };

        for reading in &sorted[1..] {
            let prior_level = state.level;
            state.level = self.alpha * reading.value + (1.0 - self.alpha) * (state.level + state.trend);
            state.trend = self.beta * (state.level - prior_level) + (1.0 - self.beta) * state.trend;
        }

        Some(state)
    }
}

#[async_trait]
impl ForecastStrategy for HoltLinear {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HoltLinear
    }

    async fn attempt(&self, ctx: &ForecastContext<'_>) -> Attempt {
        let (Some(state), Some(origin)) = (self.smooth(ctx.series), ctx.last_timestamp()) else {
            return Attempt::Unavailable;
        };

        if !state.level.is_finite() || !state.trend.is_finite() {
            tracing::warn!("Trend model diverged (level={}, trend={})", state.level, state.trend);
            return Attempt::Unavailable;
        }

        let Some(timestamps) = ctx.future_timestamps(origin) else {
            return Attempt::Unavailable;
        };
        let points: Vec<ForecastPoint> = timestamps
            .into_iter()
            .zip(1..)
            .map(|(timestamp, j)| ForecastPoint::new(timestamp, round2(state.project(j))))
            .collect();

        if points.iter().any(|p| !p.temperature.is_finite()) {
            return Attempt::Unavailable;
        }

        Attempt::Success(points)
    }
}
