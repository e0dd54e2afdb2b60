//! Generic LLM client infrastructure.
//!
//! This module provides the completion trait and the HTTP clients for the
//! supported backends. Prompting and response parsing for commit assessment
//! live in [`crate::assess`].
//!
//! # Configuration
//!
//! Backend and model are layered, later sources winning:
//! - the `[ai]` section of the configuration file
//! - environment: `GIT_EFFICIENCY_AI_BACKEND`, `GIT_EFFICIENCY_AI_MODEL`
//! - CLI arguments: `--backend`, `--model`
//!
//! Credentials only come from the environment: `OPENAI_API_KEY` or
//! `OPENROUTER_API_KEY` (plus the optional `OPENROUTER_REFERER` and
//! `OPENROUTER_TITLE` attribution headers).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AiSettings;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const SYSTEM_PROMPT: &str =
    "You are an experienced code reviewer who evaluates code quality and engineering effort.";

/// Available LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions (default)
    #[default]
    OpenAi,
    /// OpenRouter, OpenAI-compatible
    OpenRouter,
}

impl LlmProvider {
    fn endpoint(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_URL,
            Self::OpenRouter => OPENROUTER_URL,
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::OpenRouter => "openai/gpt-4o-mini",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::OpenRouter => write!(f, "openrouter"),
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(format!(
                "Unknown AI backend: '{}'. Valid options: openai, openrouter",
                s
            )),
        }
    }
}

/// Configuration for LLM clients.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// The backend to use.
    pub provider: LlmProvider,
    /// Optional model override.
    pub model: Option<String>,
    /// API key for the selected backend.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// OpenRouter `HTTP-Referer` header.
    pub referer: Option<String>,
    /// OpenRouter `X-Title` header.
    pub title: Option<String>,
}

impl LlmConfig {
    /// Start from the `[ai]` section of the configuration file.
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self {
            provider: settings.backend,
            model: settings.model.clone(),
            api_key: None,
            timeout: Duration::from_secs(settings.request_timeout),
            referer: None,
            title: None,
        }
    }

    /// Apply environment overrides and read credentials.
    ///
    /// Reads:
    /// - `GIT_EFFICIENCY_AI_BACKEND` - backend name (openai, openrouter)
    /// - `GIT_EFFICIENCY_AI_MODEL` - model name
    /// - `OPENAI_API_KEY` / `OPENROUTER_API_KEY` - credentials for the backend
    /// - `OPENROUTER_REFERER`, `OPENROUTER_TITLE` - OpenRouter attribution
    pub fn with_env(mut self) -> Self {
        if let Some(provider) = env::var("GIT_EFFICIENCY_AI_BACKEND")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.provider = provider;
        }
        if let Ok(model) = env::var("GIT_EFFICIENCY_AI_MODEL") {
            self.model = Some(model);
        }
        self.referer = env::var("OPENROUTER_REFERER").ok();
        self.title = env::var("OPENROUTER_TITLE").ok();
        self.resolve_api_key()
    }

    /// Merge with CLI overrides. CLI values take precedence.
    pub fn with_overrides(mut self, provider: Option<LlmProvider>, model: Option<String>) -> Self {
        let provider_changed = provider.is_some_and(|p| p != self.provider);
        if let Some(p) = provider {
            self.provider = p;
        }
        if let Some(m) = model {
            self.model = Some(m);
        }
        if provider_changed {
            self = self.resolve_api_key();
        }
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn resolve_api_key(mut self) -> Self {
        self.api_key = env::var(self.provider.api_key_var())
            .ok()
            .filter(|k| !k.trim().is_empty());
        self
    }

    /// The model requests are sent to; also part of the verdict cache key.
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Create an LLM client from this configuration.
    pub fn create_client(&self) -> Result<Arc<dyn LlmClient>, LlmError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(LlmError::MissingApiKey(self.provider.api_key_var()))?;

        let mut extra_headers = Vec::new();
        if self.provider == LlmProvider::OpenRouter {
            if let Some(ref referer) = self.referer {
                extra_headers.push(("HTTP-Referer".to_string(), referer.clone()));
            }
            if let Some(ref title) = self.title {
                extra_headers.push(("X-Title".to_string(), title.clone()));
            }
        }

        let client = ChatCompletionClient::new(
            self.provider.endpoint(),
            api_key,
            self.model_name(),
            self.timeout,
        )?
        .with_headers(extra_headers);
        Ok(Arc::new(client))
    }
}

/// Trait for LLM completion clients.
pub trait LlmClient: Send + Sync {
    /// Send a prompt to the LLM and return the completion response.
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints.
pub struct ChatCompletionClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
    model: String,
    headers: Vec<(String, String)>,
}

impl ChatCompletionClient {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ClientError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            headers: Vec::new(),
        })
    }

    /// Extra headers sent with every request.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }
}

impl LlmClient for ChatCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 1024,
        };

        let mut builder = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().map_err(LlmError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = resp.json().map_err(LlmError::from_reqwest)?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".into()))?;

        debug!("{} returned {} chars", self.model, content.len());
        Ok(content)
    }
}

/// Errors from LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM client error: {0}")]
    ClientError(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::ClientError(err.to_string())
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Rate limiting (429), server errors (5xx), timeouts and connection
    /// failures are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Timeout(_) | Self::Connection(_) => true,
            _ => false,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_client() {
        let client = test_support::MockLlmClient::new("test response");
        let result = client.complete("test prompt").unwrap();
        assert_eq!(result, "test response");
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!(
            "OpenRouter".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenRouter
        );
        assert!("claude".parse::<LlmProvider>().is_err());
        assert_eq!(LlmProvider::OpenRouter.to_string(), "openrouter");
    }

    #[test]
    fn test_config_overrides() {
        let config = LlmConfig::from_settings(&AiSettings::default()).with_api_key("sk-test");
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.model_name(), "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(120));

        let updated = config.with_overrides(None, Some("gpt-4.1".to_string()));
        assert_eq!(updated.provider, LlmProvider::OpenAi);
        assert_eq!(updated.model_name(), "gpt-4.1");
        assert_eq!(updated.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_missing_key_fails_client_creation() {
        let config = LlmConfig::from_settings(&AiSettings::default());
        assert!(matches!(
            config.create_client(),
            Err(LlmError::MissingApiKey("OPENAI_API_KEY"))
        ));
    }

    #[test]
    fn test_transient_classification() {
        let http = |status| LlmError::Http {
            status,
            body: String::new(),
        };
        assert!(http(429).is_transient());
        assert!(http(500).is_transient());
        assert!(http(503).is_transient());
        assert!(!http(401).is_transient());
        assert!(!http(400).is_transient());
        assert!(LlmError::Timeout("slow".into()).is_transient());
        assert!(LlmError::Connection("refused".into()).is_transient());
        assert!(!LlmError::InvalidResponse("empty".into()).is_transient());
        assert!(!LlmError::MissingApiKey("OPENAI_API_KEY").is_transient());
    }
}
