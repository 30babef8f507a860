use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};

use crate::error::VisionError;
use crate::imaging::{self, Image};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Immutable settings captured by [`GptInferencer`] at construction.
#[derive(Clone)]
pub struct OpenAiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    /// No timeout when `None`; callers that need bounded latency set one.
    pub timeout: Option<Duration>,
    /// Where in-memory images are written before encoding.
    pub temp_dir: PathBuf,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: None,
            temp_dir: std::env::temp_dir(),
        }
    }
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

/// Build a single-turn chat-completions body: one user message with a text
/// part followed by a base64 JPEG part.
pub fn build_payload(model: &str, prompt: &str, image_b64: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": prompt
                    },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:image/jpeg;base64,{}", image_b64)
                        }
                    }
                ]
            }
        ],
        "max_tokens": max_tokens
    })
}

/// Pull the answer text out of the first choice.
///
/// Reads the `pred_answer` string and falls back to the standard
/// `message.content` string when `pred_answer` is absent or not a string.
pub fn extract_answer(response: &Value) -> Result<String, VisionError> {
    let choices = response
        .get("choices")
        .and_then(Value::as_array)
        .ok_or_else(|| VisionError::MalformedResponse("missing `choices` list".to_string()))?;

    let first = choices
        .first()
        .ok_or_else(|| VisionError::MalformedResponse("empty `choices` list".to_string()))?;

    first
        .get("pred_answer")
        .and_then(Value::as_str)
        .or_else(|| first.pointer("/message/content").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| {
            VisionError::MalformedResponse("first choice carries no answer text".to_string())
        })
}

/// Something that can answer a prompt about an image.
///
/// Tools only talk to the API through this trait.
#[async_trait::async_trait]
pub trait Inferencer: Send + Sync {
    /// Returns the raw response body.
    async fn infer(&self, image: &Image, prompt: &str) -> Result<Value, VisionError>;
}

/// Client for the OpenAI chat-completions endpoint.
pub struct GptInferencer {
    settings: OpenAiSettings,
    client: reqwest::Client,
}

impl GptInferencer {
    pub fn new(settings: OpenAiSettings) -> Result<Self, VisionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { settings, client })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn request(&self, payload: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(payload)
    }

    /// Send one prompt + base64 JPEG and return the decoded JSON body.
    pub async fn chat(&self, image_b64: &str, prompt: &str) -> Result<Value, VisionError> {
        let payload = build_payload(
            &self.settings.model,
            prompt,
            image_b64,
            self.settings.max_tokens,
        );

        log::info!(
            "OpenAI: POST {} (model={}, image={} bytes b64)",
            self.settings.endpoint,
            self.settings.model,
            image_b64.len()
        );

        let response = self.request(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("OpenAI: request failed with HTTP {}", status);
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| VisionError::InvalidJson(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Inferencer for GptInferencer {
    async fn infer(&self, image: &Image, prompt: &str) -> Result<Value, VisionError> {
        let image_b64 = imaging::encode_image(image, &self.settings.temp_dir)?;
        self.chat(&image_b64, prompt).await
    }
}
