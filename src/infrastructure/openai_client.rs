// OpenAI client - Chat completion capability over an OpenAI-compatible API
use crate::application::completion::{CompletionError, TextCompletion};
use crate::infrastructure::config::OpenAiSettings;
use async_trait::async_trait;
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You are a helpful assistant specialized in time series extrapolation.";

pub struct OpenAiCompletion {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAiCompletion {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            api_key: settings.api_key,
            model: settings.model,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }

    pub fn parse_response(json: &Value) -> Result<String, CompletionError> {
        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| CompletionError::Malformed("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl TextCompletion for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if self.api_key.is_empty() {
            return Err(CompletionError::NotConfigured);
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp.json().await?;
        Self::parse_response(&json)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
