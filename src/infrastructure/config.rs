use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    pub influx: Option<InfluxSettings>,
    #[serde(default)]
    pub forecast: ForecastSettings,
    pub openai: Option<OpenAiSettings>,
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Influx,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// How long the memory backend keeps readings
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            retention_hours: default_retention_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default)]
    pub queries: QueryTemplates,
}

/// InfluxQL templates; `${measurement}`, `${sensor}` and `${hours}` are substituted
#[derive(Debug, Deserialize, Clone)]
pub struct QueryTemplates {
    #[serde(default = "default_sensors_query")]
    pub sensors: String,
    #[serde(default = "default_readings_query")]
    pub readings: String,
    #[serde(default = "default_latest_query")]
    pub latest: String,
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            sensors: default_sensors_query(),
            readings: default_readings_query(),
            latest: default_latest_query(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastSettings {
    #[serde(default = "default_points")]
    pub points: usize,
    #[serde(default = "default_step_minutes")]
    pub default_step_minutes: u32,
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,
    #[serde(default = "default_live_poll_secs")]
    pub live_poll_secs: u64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            points: default_points(),
            default_step_minutes: default_step_minutes(),
            max_points: default_max_points(),
            history_hours: default_history_hours(),
            completion_timeout_secs: default_completion_timeout_secs(),
            live_poll_secs: default_live_poll_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_simulator_interval")]
    pub interval_minutes: u64,
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    #[serde(default)]
    pub sensors: Vec<SimulatedSensor>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_simulator_interval(),
            max_step: default_max_step(),
            sensors: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatedSensor {
    pub id: String,
    pub base_temperature: f64,
    #[serde(default = "default_min_temperature")]
    pub min: f64,
    #[serde(default = "default_max_temperature")]
    pub max: f64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5555".to_string()
}

fn default_retention_hours() -> u32 {
    24 * 7
}

fn default_measurement() -> String {
    "water_temperature".to_string()
}

fn default_sensors_query() -> String {
    "SHOW TAG VALUES FROM \"${measurement}\" WITH KEY = \"sensor\"".to_string()
}

fn default_readings_query() -> String {
    "SELECT \"value\" FROM \"${measurement}\" WHERE \"sensor\"='${sensor}' AND time >= now() - ${hours}h ORDER BY time ASC"
        .to_string()
}

fn default_latest_query() -> String {
    "SELECT LAST(\"value\") AS \"value\" FROM \"${measurement}\" WHERE \"sensor\"='${sensor}'".to_string()
}

fn default_points() -> usize {
    12
}

fn default_step_minutes() -> u32 {
    5
}

fn default_max_points() -> usize {
    288
}

fn default_history_hours() -> u32 {
    24
}

fn default_completion_timeout_secs() -> u64 {
    15
}

fn default_live_poll_secs() -> u64 {
    60
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_temperature() -> f64 {
    0.2
}

fn default_simulator_interval() -> u64 {
    5
}

fn default_max_step() -> f64 {
    0.3
}

fn default_min_temperature() -> f64 {
    0.0
}

fn default_max_temperature() -> f64 {
    35.0
}

/// Load `config/forecast.{toml,...}` (optional) overlaid with `FISHYDEX__SECTION__KEY`
/// environment variables. `OPENAI_API_KEY` fills in the OpenAI key when set.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/forecast").required(false))
        .add_source(
            config::Environment::with_prefix("FISHYDEX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("openai.api_key", std::env::var("OPENAI_API_KEY").ok())?
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
