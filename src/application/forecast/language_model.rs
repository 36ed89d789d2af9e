// Pattern continuation through a text completion capability
use super::strategy::{Attempt, ForecastContext, ForecastStrategy, StrategyKind};
use crate::application::completion::TextCompletion;
use crate::domain::reading::{iso8601, ForecastPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fewer readings than this give the model nothing to continue
pub const MIN_READINGS: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseFailure {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response is not a JSON array")]
    NotAnArray,
    #[error("element {index} is malformed: {reason}")]
    BadElement { index: usize, reason: String },
    #[error("expected {expected} points, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("point {index} does not advance past {after}")]
    NotIncreasing { index: usize, after: String },
}

pub struct LanguageModelStrategy<'a> {
    completion: &'a dyn TextCompletion,
}

impl<'a> LanguageModelStrategy<'a> {
    pub fn new(completion: &'a dyn TextCompletion) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl ForecastStrategy for LanguageModelStrategy<'_> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LanguageModel
    }

    async fn attempt(&self, ctx: &ForecastContext<'_>) -> Attempt {
        if ctx.series.len() < MIN_READINGS {
            return Attempt::Unavailable;
        }
        let Some(last_reading) = ctx.last_timestamp() else {
            return Attempt::Unavailable;
        };

        let prompt = build_prompt(ctx);
        let reply = match self.completion.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    "Completion via {} failed, falling back to trend model: {}",
                    self.completion.name(),
                    e
                );
                return Attempt::Unavailable;
            }
        };

        match parse_points(&reply).and_then(|points| validate(points, ctx.count, last_reading)) {
            Ok(points) => Attempt::Success(points),
            Err(e) => {
                tracing::warn!("Discarding {} forecast reply: {}", self.completion.name(), e);
                Attempt::Unavailable
            }
        }
    }
}

pub fn build_prompt(ctx: &ForecastContext<'_>) -> String {
    let history = ctx
        .series
        .iter()
        .map(|r| format!("{} => {:.2}", iso8601::format(&r.timestamp), r.value))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Below is a series of water temperature readings, one per line as \
         ISO8601 timestamp => temperature in °C. Continue the pattern with the next {} readings, \
         spaced {} minutes apart. Reply only with a JSON array of objects shaped like \
         [{{\"timestamp\":\"ISO8601\",\"temperature\":number}}, ...] and nothing else.\n\
         History:\n{}",
        ctx.count, ctx.step_minutes, history
    )
}

/// Pull the first JSON array out of a model reply, tolerating prose around it
pub fn parse_points(reply: &str) -> Result<Vec<ForecastPoint>, ParseFailure> {
    let json_text = reply.find('[').map(|i| &reply[i..]).unwrap_or(reply);

    let value = serde_json::Deserializer::from_str(json_text)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ParseFailure::InvalidJson("empty response".to_string()))?
        .map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(ParseFailure::NotAnArray);
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_element(item).map_err(|reason| ParseFailure::BadElement { index, reason }))
        .collect()
}

fn parse_element(item: &Value) -> Result<ForecastPoint, String> {
    let timestamp = match item.get("timestamp") {
        Some(Value::String(raw)) => {
            iso8601::parse(raw).ok_or_else(|| format!("unparseable timestamp {:?}", raw))?
        }
        Some(Value::Number(ms)) => ms
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| format!("epoch millis out of range: {}", ms))?,
        Some(other) => return Err(format!("timestamp has unexpected type: {}", other)),
        None => return Err("missing timestamp".to_string()),
    };

    let temperature = match item.get("temperature") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|t| t.is_finite())
    .ok_or_else(|| "missing or non-numeric temperature".to_string())?;

    Ok(ForecastPoint::new(timestamp, temperature))
}

fn validate(
    points: Vec<ForecastPoint>,
    expected: usize,
    last_reading: DateTime<Utc>,
) -> Result<Vec<ForecastPoint>, ParseFailure> {
    if points.len() != expected {
        return Err(ParseFailure::WrongCount {
            expected,
            actual: points.len(),
        });
    }

    let mut previous = last_reading;
    for (index, point) in points.iter().enumerate() {
        if point.timestamp <= previous {
            return Err(ParseFailure::NotIncreasing {
                index,
                after: iso8601::format(&previous),
            });
        }
        previous = point.timestamp;
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::completion::mock::MockCompletion;
    use crate::domain::reading::Reading;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn readings(n: usize) -> Vec<Reading> {
        (0..n)
            .map(|i| Reading::new(start() + Duration::minutes(5 * i as i64), 20.0 + i as f64 * 0.5))
            .collect()
    }

    #[test]
    fn test_prompt_lists_history_lines() {
        let series = readings(3);
        let ctx = ForecastContext {
            series: &series,
            count: 4,
            step_minutes: 5,
        };
        let prompt = build_prompt(&ctx);
        assert!(prompt.contains("next 4 readings"));
        assert!(prompt.contains("5 minutes apart"));
        assert!(prompt.ends_with(
            "2025-06-01T12:00:00.000Z => 20.00\n\
             2025-06-01T12:05:00.000Z => 20.50\n\
             2025-06-01T12:10:00.000Z => 21.00"
        ));
    }

    #[test]
    fn test_parse_tolerates_surrounding_prose() {
        let reply = "Sure! Here is the forecast:\n\
            [{\"timestamp\":\"2025-06-01T12:15:00Z\",\"temperature\":21.4}]\n\
            Let me know if you need more.";
        let points = parse_points(reply).unwrap();
        assert_eq!(points, vec![ForecastPoint::new(start() + Duration::minutes(15), 21.4)]);
    }

    #[test]
    fn test_parse_coerces_field_types() {
        let millis = (start() + Duration::minutes(15)).timestamp_millis();
        let reply = format!("[{{\"timestamp\":{},\"temperature\":\"21.40\"}}]", millis);
        let points = parse_points(&reply).unwrap();
        assert_eq!(points[0].temperature, 21.4);
        assert_eq!(points[0].timestamp, start() + Duration::minutes(15));
    }

    #[test]
    fn test_parse_rejects_bad_replies() {
        assert!(matches!(parse_points("no idea"), Err(ParseFailure::InvalidJson(_))));
        assert!(matches!(parse_points("[{\"timestamp\": "), Err(ParseFailure::InvalidJson(_))));
        assert_eq!(parse_points("{\"temperature\": 3}"), Err(ParseFailure::NotAnArray));
        assert!(matches!(
            parse_points("[{\"temperature\": 3}]"),
            Err(ParseFailure::BadElement { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_success_returns_reply_points() {
        let reply = r#"[
            {"timestamp":"2025-06-01T12:15:00.000Z","temperature":21.5},
            {"timestamp":"2025-06-01T12:20:00.000Z","temperature":22.25}
        ]"#;
        let completion = MockCompletion::replying(reply);
        let series = readings(3);
        let ctx = ForecastContext {
            series: &series,
            count: 2,
            step_minutes: 5,
        };

        let outcome = LanguageModelStrategy::new(&completion).attempt(&ctx).await;
        assert_eq!(
            outcome,
            Attempt::Success(vec![
                ForecastPoint::new(start() + Duration::minutes(15), 21.5),
                ForecastPoint::new(start() + Duration::minutes(20), 22.25),
            ])
        );
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_short_series_skips_completion() {
        let completion = MockCompletion::replying("[]");
        let series = readings(2);
        let ctx = ForecastContext {
            series: &series,
            count: 2,
            step_minutes: 5,
        };
        let outcome = LanguageModelStrategy::new(&completion).attempt(&ctx).await;
        assert_eq!(outcome, Attempt::Unavailable);
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_completion_failure_is_unavailable() {
        let completion = MockCompletion::failing("connection reset");
        let series = readings(4);
        let ctx = ForecastContext {
            series: &series,
            count: 2,
            step_minutes: 5,
        };
        let outcome = LanguageModelStrategy::new(&completion).attempt(&ctx).await;
        assert_eq!(outcome, Attempt::Unavailable);
    }

    #[tokio::test]
    async fn test_wrong_count_is_unavailable() {
        let completion = MockCompletion::replying(
            r#"[{"timestamp":"2025-06-01T12:15:00Z","temperature":21.5}]"#,
        );
        let series = readings(3);
        let ctx = ForecastContext {
            series: &series,
            count: 3,
            step_minutes: 5,
        };
        let outcome = LanguageModelStrategy::new(&completion).attempt(&ctx).await;
        assert_eq!(outcome, Attempt::Unavailable);
    }

    #[test]
    fn test_validate_rejects_points_in_the_past() {
        let points = vec![
            ForecastPoint::new(start() + Duration::minutes(5), 20.0),
            ForecastPoint::new(start() + Duration::minutes(15), 20.0),
        ];
        let err = validate(points, 2, start() + Duration::minutes(10)).unwrap_err();
        assert!(matches!(err, ParseFailure::NotIncreasing { index: 0, .. }));
    }
}
