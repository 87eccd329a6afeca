//! LLM completion client.
//!
//! [`CompletionClient`] wraps a single system+user completion with bounded
//! retries and linear backoff. The HTTP work lives behind the
//! [`CompletionBackend`] trait; [`HttpBackend`] talks to the OpenAI and
//! Anthropic APIs, selected via settings or environment variables.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::error::{CompletionError, TransportError};
use crate::settings::LlmSettings;

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-5.2",
            Self::Anthropic => "claude-sonnet-4-5",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// One completion request as sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Correlation id for logs; has no effect on the output.
    pub request_id: String,
}

/// Raw backend answer. `content` is `None` when the model returned no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub total_tokens: Option<u64>,
    pub model: String,
}

impl CompletionResponse {
    /// Response carrying the given text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            total_tokens: None,
            model: String::new(),
        }
    }

    /// Response without any text.
    pub fn empty() -> Self {
        Self {
            content: None,
            total_tokens: None,
            model: String::new(),
        }
    }
}

/// A transport able to run one completion call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError>;
}

/// Retry budget for network-class failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit; retry `n` waits `n * base_delay_ms`.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Wait before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Generate a request id of the form `req_<millis>_<random>`.
pub fn new_request_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("req_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

/// Completion client with retry/backoff around a backend.
#[derive(Clone)]
pub struct CompletionClient {
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one completion and return the generated text.
    ///
    /// Network-class failures are retried up to `max_retries` times with a
    /// linear backoff. Any other failure, including an empty completion body,
    /// is returned immediately.
    pub async fn generate_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        request_id: Option<&str>,
    ) -> Result<String, CompletionError> {
        if system_prompt.trim().is_empty() {
            return Err(CompletionError::InvalidRequest(
                "system prompt is empty".to_string(),
            ));
        }
        if user_prompt.trim().is_empty() {
            return Err(CompletionError::InvalidRequest(
                "user prompt is empty".to_string(),
            ));
        }

        let request = CompletionRequest {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
            request_id: request_id.map(str::to_string).unwrap_or_else(new_request_id),
        };
        let started = Instant::now();

        info!(
            request_id = %request.request_id,
            system_prompt_length = request.system.len(),
            user_prompt_length = request.user.len(),
            "Completion request started"
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let failure = match self.backend.complete(&request).await {
                Ok(response) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    return match response.content.filter(|c| !c.is_empty()) {
                        Some(content) => {
                            info!(
                                request_id = %request.request_id,
                                model = %response.model,
                                duration_ms,
                                tokens_used = ?response.total_tokens,
                                attempt,
                                "Completion request completed"
                            );
                            Ok(content)
                        }
                        None => {
                            error!(
                                request_id = %request.request_id,
                                duration_ms,
                                attempt,
                                "Completion returned an empty body"
                            );
                            Err(CompletionError::EmptyResponse)
                        }
                    };
                }
                Err(err) => err,
            };

            if failure.is_retryable() && attempt <= self.policy.max_retries {
                let wait = self.policy.delay_for(attempt);
                warn!(
                    request_id = %request.request_id,
                    attempt,
                    kind = failure.kind(),
                    error = %failure,
                    wait_ms = wait.as_millis() as u64,
                    "Completion request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            error!(
                request_id = %request.request_id,
                duration_ms = started.elapsed().as_millis() as u64,
                attempt,
                kind = failure.kind(),
                error = %failure,
                "Completion request failed"
            );
            return Err(CompletionError::Transport {
                attempts: attempt,
                source: failure,
            });
        }
    }
}

/// HTTP backend for hosted chat-completion APIs.
pub struct HttpBackend {
    provider: LlmProvider,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend with explicit configuration
    pub fn new(
        provider: LlmProvider,
        api_key: String,
        settings: &LlmSettings,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| CompletionError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            provider,
            api_key,
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client,
        })
    }

    /// Create a backend from settings and environment variables
    ///
    /// An explicit provider in settings requires its key. Otherwise checks in
    /// order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    pub fn from_env(settings: &LlmSettings) -> Result<Self, CompletionError> {
        let read_key = |provider: LlmProvider| {
            std::env::var(provider.api_key_var())
                .ok()
                .filter(|key| !key.is_empty())
        };

        let candidates = match settings.provider {
            Some(provider) => vec![provider],
            None => vec![LlmProvider::OpenAI, LlmProvider::Anthropic],
        };

        for provider in candidates {
            if let Some(api_key) = read_key(provider) {
                return Self::new(provider, api_key, settings);
            }
        }

        Err(CompletionError::NotConfigured)
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    // OpenAI chat completion
    async fn complete_openai(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let url = "https://api.openai.com/v1/chat/completions";

        let body = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let result: OpenAIResponse = decode(response).await?;

        Ok(CompletionResponse {
            content: result.choices.into_iter().next().and_then(|c| c.message.content),
            total_tokens: result.usage.map(|u| u.total_tokens),
            model: self.model.clone(),
        })
    }

    // Anthropic messages API
    async fn complete_anthropic(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let url = "https://api.anthropic.com/v1/messages";

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: request.system.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: request.user.clone(),
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let result: AnthropicResponse = decode(response).await?;

        let text: String = result
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        Ok(CompletionResponse {
            content: Some(text).filter(|t| !t.is_empty()),
            total_tokens: result.usage.map(|u| u.input_tokens + u.output_tokens),
            model: self.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(request).await,
            LlmProvider::Anthropic => self.complete_anthropic(request).await,
        }
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();

    if status.as_u16() == 429 {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::RateLimited(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Api {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| TransportError::from_reqwest(&e))
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}
