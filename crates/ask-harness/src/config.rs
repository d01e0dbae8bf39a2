use std::fmt;
use std::time::Duration;

use crate::errors::AskError;

/// Model requested for every question.
pub const MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";

/// Chat-completions endpoint (OpenAI-compatible, served by OpenRouter).
pub const API_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Environment variable holding the bearer token.
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Value of the `X-Title` header identifying this client to the provider.
pub const CLIENT_TITLE: &str = "ask";

/// Whole-request timeout, streaming included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Ceiling for live redraws while the answer streams in.
pub const REFRESH_PER_SECOND: u32 = 10;

/// Configuration for one invocation.
#[derive(Clone)]
pub struct AskConfig {
    /// Bearer token sent in the `Authorization` header.
    pub api_key: String,
    /// Chat-completions URL.
    pub endpoint: String,
    /// Model identifier placed in the request body.
    pub model: String,
    /// `X-Title` header value.
    pub title: String,
    /// HTTP timeout covering connect, headers and the streamed body.
    pub timeout: Duration,
    /// Maximum live redraws per second.
    pub refresh_per_second: u32,
}

impl AskConfig {
    /// Creates a config from the compile-time defaults and a bearer token.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: API_ENDPOINT.to_string(),
            model: MODEL.to_string(),
            title: CLIENT_TITLE.to_string(),
            timeout: REQUEST_TIMEOUT,
            refresh_per_second: REFRESH_PER_SECOND,
        }
    }

    /// Builds a config from `OPENROUTER_API_KEY`.
    pub fn from_env() -> Result<Self, AskError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AskConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AskError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(API_KEY_ENV_VAR) {
            Some(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(AskError::MissingCredential {
                var: API_KEY_ENV_VAR,
            }),
        }
    }

    /// Overrides the endpoint (for proxies or test servers).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Overrides the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Minimum spacing between two live redraws.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(1) / self.refresh_per_second.max(1)
    }
}

impl fmt::Debug for AskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AskConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("title", &self.title)
            .field("timeout", &self.timeout)
            .field("refresh_per_second", &self.refresh_per_second)
            .finish()
    }
}
