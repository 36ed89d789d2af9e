// Forecast engine - strategy chain over one sensor's readings
use super::holt::HoltLinear;
use super::language_model::LanguageModelStrategy;
use super::linear::LinearExtrapolation;
use super::step::infer_step_minutes;
use super::strategy::{Attempt, ForecastContext, ForecastStrategy, StrategyKind};
use crate::application::completion::TextCompletion;
use crate::domain::reading::{ForecastPoint, Reading};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ForecastError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    pub step_minutes: u32,
    /// Strategy that produced `points`; `None` when there was nothing to forecast from
    pub strategy: Option<StrategyKind>,
}

/// Project `count` points past the end of `series`.
///
/// An empty series yields an empty forecast. Completion failures and
/// unusable replies fall through to the trend model and are never returned.
pub async fn forecast(
    series: &[Reading],
    count: usize,
    default_step_minutes: u32,
    completion: Option<&dyn TextCompletion>,
) -> Result<Vec<ForecastPoint>, ForecastError> {
    let outcome = Forecaster::from_completion(completion)
        .run(series, count, default_step_minutes)
        .await?;
    Ok(outcome.points)
}

pub struct Forecaster<'a> {
    strategies: Vec<Box<dyn ForecastStrategy + 'a>>,
}

impl Default for Forecaster<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Forecaster<'a> {
    pub fn new() -> Self {
        Self {
            strategies: vec![Box::new(HoltLinear::default()), Box::new(LinearExtrapolation)],
        }
    }

    pub fn with_completion(completion: &'a dyn TextCompletion) -> Self {
        let mut forecaster = Self::new();
        forecaster
            .strategies
            .insert(0, Box::new(LanguageModelStrategy::new(completion)));
        forecaster
    }

    /// Trend chain, preceded by the language model when a completion capability is present
    pub fn from_completion(completion: Option<&'a dyn TextCompletion>) -> Self {
        match completion {
            Some(completion) => Self::with_completion(completion),
            None => Self::new(),
        }
    }

    pub async fn run(
        &self,
        series: &[Reading],
        count: usize,
        default_step_minutes: u32,
    ) -> Result<Forecast, ForecastError> {
        validate(series, count, default_step_minutes)?;

        let mut sorted = series.to_vec();
        sorted.sort_by_key(|r| r.timestamp);

        let ctx = ForecastContext {
            series: &sorted,
            count,
            step_minutes: infer_step_minutes(&sorted, default_step_minutes),
        };
        if let Some(last) = ctx.last_timestamp() {
            if ctx.future_timestamp(last, count).is_none() {
                return Err(ForecastError::InvalidArgument(format!(
                    "{} points at {} minute steps run past the last representable date",
                    count, ctx.step_minutes
                )));
            }
        }

        for strategy in &self.strategies {
            if let Attempt::Success(points) = strategy.attempt(&ctx).await {
                tracing::debug!(
                    "Forecast of {} points via {} (step {}m, {} readings)",
                    points.len(),
                    strategy.kind().as_str(),
                    ctx.step_minutes,
                    sorted.len()
                );
                return Ok(Forecast {
                    points,
                    step_minutes: ctx.step_minutes,
                    strategy: Some(strategy.kind()),
                });
            }
        }

        Ok(Forecast {
            points: Vec::new(),
            step_minutes: ctx.step_minutes,
            strategy: None,
        })
    }
}

fn validate(series: &[Reading], count: usize, default_step_minutes: u32) -> Result<(), ForecastError> {
    if count < 1 {
        return Err(ForecastError::InvalidArgument(
            "point count must be at least 1".to_string(),
        ));
    }
    if default_step_minutes < 1 {
        return Err(ForecastError::InvalidArgument(
            "default step must be at least 1 minute".to_string(),
        ));
    }
    if let Some(bad) = series.iter().find(|r| !r.value.is_finite() || r.value < 0.0) {
        return Err(ForecastError::InvalidArgument(format!(
            "reading at {} has invalid value {}",
            bad.timestamp, bad.value
        )));
    }
    Ok(())
}
