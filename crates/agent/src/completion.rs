//! Completion-service boundary.
//!
//! Stages talk to a [`CompletionClient`] trait object. Concrete providers
//! live in [`crate::providers`]; retry, timeout and cancellation are layered
//! on by [`crate::resilient::ResilientClient`].

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const JSON_TEMPERATURE: f32 = 0.3;

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), system_prompt: None, temperature: None, max_tokens: None }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("provider `{0}` is not configured or API key is missing")]
    Unavailable(String),
    #[error("{provider}: authentication failed")]
    Authentication { provider: String },
    #[error("{provider}: rate limited: {message}")]
    RateLimited { provider: String, message: String },
    #[error("{provider}: HTTP {status}: {body}")]
    Http { provider: String, status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("could not parse provider response: {0}")]
    Parse(String),
    #[error("AI returned invalid JSON")]
    InvalidJson { content: String },
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<CompletionError> },
    #[error("request cancelled")]
    Cancelled,
}

impl CompletionError {
    /// Transient failures are worth another attempt; the rest are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Failures that mean the service cannot be reached at all.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Authentication { .. } => true,
            Self::Exhausted { .. } => true,
            _ => false,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;

    fn provider(&self) -> &str;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Asks for JSON only and deserializes the answer into `T`.
pub async fn extract_json<T>(
    client: &(dyn CompletionClient + '_),
    prompt: &str,
    schema: &str,
    system_prompt: Option<&str>,
) -> Result<T, CompletionError>
where
    T: DeserializeOwned,
{
    let system_prompt = format!(
        "{}\n\nYou must respond with valid JSON only. No markdown, no explanation. Schema: {schema}",
        system_prompt.unwrap_or_default()
    );
    let request = CompletionRequest::new(prompt)
        .with_system_prompt(system_prompt)
        .with_temperature(JSON_TEMPERATURE);

    let completion = client.complete(&request).await?;
    let content = strip_code_fences(&completion.content);
    serde_json::from_str(content)
        .map_err(|_| CompletionError::InvalidJson { content: content.to_string() })
}

/// Removes a surrounding markdown code fence, with or without a `json` tag in any case.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
        _ => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Client for a provider whose credentials are missing. Every call fails.
#[derive(Clone, Debug)]
pub struct UnconfiguredClient {
    provider: String,
}

impl UnconfiguredClient {
    pub fn new(provider: impl Into<String>) -> Self {
        Self { provider: provider.into() }
    }
}

#[async_trait]
impl CompletionClient for UnconfiguredClient {
    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CompletionError> {
        Err(CompletionError::Unavailable(self.provider.clone()))
    }

    fn provider(&self) -> &str {
        &self.provider
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Replays queued answers in order and records every request it saw.
#[derive(Debug, Default)]
pub struct ScriptedCompletionClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|reply| Ok(reply.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: CompletionError) {
        lock(&self.replies).push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        lock(&self.requests).push(request.clone());
        let reply = lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Unavailable("scripted".to_string())))?;
        Ok(Completion { content: reply, model: "scripted".to_string(), tokens_used: None })
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
