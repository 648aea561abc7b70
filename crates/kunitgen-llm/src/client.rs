//! OpenAI-compatible chat completion client.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kunitgen_core::config::GenerationConfig;
use kunitgen_core::prompt::render_prompt;
use kunitgen_core::{CollaboratorError, GenerationRequest, TestGenerator};

use crate::error::LlmError;
use crate::Result;

/// Connection settings for [`OpenAiCompatibleClient`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL up to and including the API version, e.g. `https://host/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    /// Source file generated tests are told to `#include`.
    pub include_directive: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            include_directive: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Build from generation settings, reading the key from `api_key_env`.
    pub fn from_generation(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key,
            include_directive: config.include_directive.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn with_include_directive(mut self, file: impl Into<String>) -> Self {
        self.include_directive = Some(file.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("include_directive", &self.include_directive)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Test generator backed by a `/chat/completions` endpoint.
pub struct OpenAiCompatibleClient {
    config: ClientConfig,
    http_client: Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("kunitgen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one user message and return the first choice's content.
    pub async fn complete(&self, prompt: String, temperature: f32, max_tokens: u32) -> Result<String> {
        let url = self.config.completions_url();
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        debug!(url = %url, model = %self.config.model, prompt_len = request.messages[0].content.len(), "Sending completion request");
        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout.as_secs())
                } else {
                    LlmError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion endpoint returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        info!(
            model = %self.config.model,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Completion received"
        );
        Ok(content)
    }
}

#[async_trait]
impl TestGenerator for OpenAiCompatibleClient {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, CollaboratorError> {
        let prompt = render_prompt(request, self.config.include_directive.as_deref());
        self.complete(prompt, request.temperature, request.max_tokens)
            .await
            .map_err(CollaboratorError::from)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

impl fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}
