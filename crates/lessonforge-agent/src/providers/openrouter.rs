//! OpenRouter lesson generator
//!
//! Talks to an OpenAI-compatible chat-completions endpoint (OpenRouter by
//! default). The system prompt is fixed; the user prompt is either the
//! initial outline prompt or a repair prompt carrying the previous draft.
//!
//! # Usage
//!
//! ```text
//! let generator = OpenRouterGenerator::from_config(&GeneratorConfig::default())?;
//! let raw = generator.generate(&request, None).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use lessonforge_core::GenerationRequest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::generator::{LessonGenerator, RepairContext};
use crate::prompts::{initial_prompt, repair_prompt, SYSTEM_PROMPT};

/// OpenRouter chat completions endpoint
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Environment variable holding the API key unless configured otherwise
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Provider settings, the `generator` section of the gateway config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub model: String,
    /// Name of the environment variable that holds the key; the key itself
    /// never lives in a config file
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: OPENROUTER_API_URL.to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: 8192,
            temperature: 0.4,
            request_timeout_secs: 180,
        }
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    total_tokens: Option<u32>,
}

/// [`LessonGenerator`] backed by an OpenAI-compatible chat API
pub struct OpenRouterGenerator {
    api_key: String,
    api_url: String,
    model: String,
    http_client: reqwest::Client,
    temperature: f64,
    max_tokens: u32,
}

impl OpenRouterGenerator {
    /// Create a generator for `model` with default sampling settings
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            api_key: api_key.into(),
            api_url: defaults.api_url,
            model: model.into(),
            http_client: build_client(defaults.request_timeout_secs),
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }

    /// Build from config, reading the key from `config.api_key_env`
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self {
            api_key,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            http_client: build_client(config.request_timeout_secs),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_completion(
        &self,
        system_prompt: &str,
        user_prompt: String,
    ) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::new("system", system_prompt.to_string()),
                ChatMessage::new("user", user_prompt),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/lessonforge/lessonforge")
            .header("X-Title", "LessonForge")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("invalid completion body: {}", e)))?;

        if let Some(tokens) = completion.usage.as_ref().and_then(|u| u.total_tokens) {
            debug!(model = %self.model, tokens, "completion received");
        }

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyResponse)?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!(model = %self.model, "completion truncated at max_tokens");
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(GenerationError::EmptyResponse),
        }
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl std::fmt::Debug for OpenRouterGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterGenerator")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[async_trait]
impl LessonGenerator for OpenRouterGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        repair: Option<&RepairContext>,
    ) -> Result<String, GenerationError> {
        let prompt = match repair {
            Some(repair) => repair_prompt(request, repair),
            None => initial_prompt(request),
        };
        self.request_completion(SYSTEM_PROMPT, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_api_key() {
        let generator = OpenRouterGenerator::new("sk-or-secret", "some/model");
        let rendered = format!("{:?}", generator);
        assert!(!rendered.contains("sk-or-secret"));
        assert!(rendered.contains("some/model"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = GeneratorConfig {
            api_key_env: "LESSONFORGE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..GeneratorConfig::default()
        };
        let err = OpenRouterGenerator::from_config(&config).unwrap_err();
        assert_eq!(
            err,
            GenerationError::MissingApiKey("LESSONFORGE_TEST_KEY_THAT_IS_NEVER_SET".to_string())
        );
    }

    #[test]
    fn test_request_serialization_skips_unset_options() {
        let request = ChatCompletionRequest {
            model: "m",
            messages: vec![ChatMessage::new("user", "hi".to_string())],
            max_tokens: None,
            temperature: Some(0.2),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_without_content_parses() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
