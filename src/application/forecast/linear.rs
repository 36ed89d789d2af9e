// Linear extrapolation from the last two readings
use super::strategy::{round2, Attempt, ForecastContext, ForecastStrategy, StrategyKind};
use crate::domain::reading::ForecastPoint;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearExtrapolation;

#[async_trait]
impl ForecastStrategy for LinearExtrapolation {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Linear
    }

    async fn attempt(&self, ctx: &ForecastContext<'_>) -> Attempt {
        let Some(last) = ctx.series.last() else {
            return Attempt::Unavailable;
        };

        let slope_per_ms = match ctx.series.len() {
            1 => 0.0,
            n => {
                let prev = &ctx.series[n - 2];
                let elapsed_ms = (last.timestamp - prev.timestamp).num_milliseconds().max(1);
                (last.value - prev.value) / elapsed_ms as f64
            }
        };
        let step_ms = ctx.step_minutes as f64 * 60_000.0;

        let Some(timestamps) = ctx.future_timestamps(last.timestamp) else {
            return Attempt::Unavailable;
        };

        let mut value = last.value;
        let mut points = Vec::with_capacity(ctx.count);
        for timestamp in timestamps {
            value += slope_per_ms * step_ms;
            points.push(ForecastPoint::new(timestamp, round2(value)));
        }

        if points.iter().any(|p| !p.temperature.is_finite()) {
            return Attempt::Unavailable;
        }

        Attempt::Success(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::forecast::holt::HoltLinear;
    use crate::domain::reading::Reading;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_continues_last_slope() {
        // +0.5 degrees over 10 minutes, projected at 5 minute steps
        let series = vec![
            Reading::new(start(), 18.0),
            Reading::new(start() + Duration::minutes(10), 20.0),
            Reading::new(start() + Duration::minutes(20), 20.5),
        ];
        let ctx = ForecastContext {
            series: &series,
            count: 3,
            step_minutes: 5,
        };

        let Attempt::Success(points) = LinearExtrapolation.attempt(&ctx).await else {
            panic!("linear fallback should succeed");
        };
        let values: Vec<f64> = points.iter().map(|p| p.temperature).collect();
        assert_eq!(values, vec![20.75, 21.0, 21.25]);
        assert_eq!(points[2].timestamp, start() + Duration::minutes(35));
    }

    #[tokio::test]
    async fn test_duplicate_timestamps_do_not_divide_by_zero() {
        let series = vec![Reading::new(start(), 18.0), Reading::new(start(), 18.0)];
        let ctx = ForecastContext {
            series: &series,
            count: 2,
            step_minutes: 1,
        };
        let Attempt::Success(points) = LinearExtrapolation.attempt(&ctx).await else {
            panic!("linear fallback should succeed");
        };
        assert!(points.iter().all(|p| p.temperature == 18.0));
    }

    #[tokio::test]
    async fn test_empty_series_is_unavailable() {
        let ctx = ForecastContext {
            series: &[],
            count: 2,
            step_minutes: 5,
        };
        assert_eq!(LinearExtrapolation.attempt(&ctx).await, Attempt::Unavailable);
    }

    #[tokio::test]
    async fn test_single_reading_matches_trend_model() {
        let series = vec![Reading::new(start(), 24.8)];
        let ctx = ForecastContext {
            series: &series,
            count: 6,
            step_minutes: 10,
        };

        let repeated = LinearExtrapolation.attempt(&ctx).await;
        let smoothed = HoltLinear::default().attempt(&ctx).await;
        assert_eq!(repeated, smoothed);
        assert!(matches!(repeated, Attempt::Success(ref p) if p.iter().all(|x| x.temperature == 24.8)));
    }
}
