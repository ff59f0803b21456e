//! HTTP completion providers: OpenAI chat completions, Anthropic messages
//! and a local Ollama chat endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tenderdesk_core::config::{LlmConfig, LlmProvider};

use crate::completion::{
    Completion, CompletionClient, CompletionError, CompletionRequest, UnconfiguredClient,
};
use crate::resilient::{ResilientClient, RetryPolicy};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OLLAMA_CHAT_PATH: &str = "/api/chat";

pub struct HttpCompletionClient {
    provider: LlmProvider,
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: &LlmConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| CompletionError::Network(error.to_string()))?;
        Ok(Self {
            provider: config.provider,
            api_key: config.api_key.clone(),
            endpoint: endpoint_for(config.provider, config.base_url.as_deref()),
            model: config.model.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn bearer(&self) -> Result<&str, CompletionError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CompletionError::Unavailable(self.provider.as_str().to_string()))
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        build_request_body(self.provider, &self.model, request)
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = self.request_body(request);
        let builder = self.client.post(&self.endpoint).json(&body);
        let builder = match self.provider {
            LlmProvider::OpenAi => builder.bearer_auth(self.bearer()?),
            LlmProvider::Anthropic => builder
                .header("x-api-key", self.bearer()?)
                .header("anthropic-version", ANTHROPIC_VERSION),
            LlmProvider::Ollama => builder,
        };

        let response =
            builder.send().await.map_err(|error| CompletionError::Network(error.to_string()))?;
        let status = response.status().as_u16();
        let text =
            response.text().await.map_err(|error| CompletionError::Network(error.to_string()))?;

        if status != 200 {
            return Err(parse_http_error(status, &text, self.provider.as_str()));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let body = self.send(request).await?;
        parse_response(self.provider, &self.model, &body)
    }

    fn provider(&self) -> &str {
        self.provider.as_str()
    }
}

/// Builds the client stack for `config`: the provider wrapped in the retry
/// and timeout decorator, or an always-unavailable client without credentials.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    if !config.is_configured() {
        return Ok(Arc::new(UnconfiguredClient::new(config.provider.as_str())));
    }

    let provider = HttpCompletionClient::new(config)?;
    let policy = RetryPolicy {
        max_retries: config.max_retries,
        base_delay: Duration::from_millis(config.retry_base_delay_ms),
        ..RetryPolicy::default()
    };
    Ok(Arc::new(ResilientClient::new(
        provider,
        Duration::from_secs(config.timeout_secs),
        policy,
    )))
}

fn endpoint_for(provider: LlmProvider, base_url: Option<&str>) -> String {
    let base = base_url.map(|url| url.trim_end_matches('/'));
    match (provider, base) {
        (LlmProvider::OpenAi, Some(base)) => format!("{base}/v1/chat/completions"),
        (LlmProvider::OpenAi, None) => OPENAI_API_URL.to_string(),
        (LlmProvider::Anthropic, Some(base)) => format!("{base}/v1/messages"),
        (LlmProvider::Anthropic, None) => ANTHROPIC_API_URL.to_string(),
        (LlmProvider::Ollama, Some(base)) => format!("{base}{OLLAMA_CHAT_PATH}"),
        (LlmProvider::Ollama, None) => format!("http://localhost:11434{OLLAMA_CHAT_PATH}"),
    }
}

fn build_request_body(provider: LlmProvider, model: &str, request: &CompletionRequest) -> Value {
    let temperature = request.temperature_or_default();
    let max_tokens = request.max_tokens_or_default();

    match provider {
        LlmProvider::Anthropic => {
            let mut body = json!({
                "model": model,
                "max_tokens": max_tokens,
                "temperature": temperature,
                "messages": [{ "role": "user", "content": request.prompt }],
            });
            if let Some(system) = &request.system_prompt {
                body["system"] = json!(system);
            }
            body
        }
        LlmProvider::OpenAi => json!({
            "model": model,
            "temperature": temperature,
            "max_tokens": max_tokens,
            "messages": chat_messages(request),
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "stream": false,
            "messages": chat_messages(request),
            "options": { "temperature": temperature, "num_predict": max_tokens },
        }),
    }
}

fn chat_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));
    messages
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: ChatMessage,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

fn parse_response(
    provider: LlmProvider,
    model: &str,
    body: &str,
) -> Result<Completion, CompletionError> {
    let parse_error = |error: serde_json::Error| CompletionError::Parse(error.to_string());

    let (content, tokens_used) = match provider {
        LlmProvider::OpenAi => {
            let response: OpenAiResponse = serde_json::from_str(body).map_err(parse_error)?;
            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .unwrap_or_default();
            (content, response.usage.map(|usage| usage.total_tokens))
        }
        LlmProvider::Anthropic => {
            let response: AnthropicResponse = serde_json::from_str(body).map_err(parse_error)?;
            let content = response
                .content
                .into_iter()
                .next()
                .filter(|block| block.kind == "text")
                .and_then(|block| block.text)
                .unwrap_or_default();
            (content, response.usage.map(|usage| usage.input_tokens + usage.output_tokens))
        }
        LlmProvider::Ollama => {
            let response: OllamaResponse = serde_json::from_str(body).map_err(parse_error)?;
            let tokens = match (response.prompt_eval_count, response.eval_count) {
                (Some(prompt), Some(eval)) => Some(prompt + eval),
                (None, eval) => eval,
                (prompt, None) => prompt,
            };
            (response.message.content.unwrap_or_default(), tokens)
        }
    };

    Ok(Completion { content, model: model.to_string(), tokens_used })
}

pub fn parse_http_error(status: u16, body: &str, provider: &str) -> CompletionError {
    let provider = provider.to_string();
    match status {
        401 | 403 => CompletionError::Authentication { provider },
        429 => CompletionError::RateLimited { provider, message: body.to_string() },
        _ => CompletionError::Http { provider, status, body: body.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use tenderdesk_core::config::{LlmConfig, LlmProvider};

    use super::{
        build_request_body, client_from_config, endpoint_for, parse_http_error, parse_response,
    };
    use crate::completion::{CompletionError, CompletionRequest};

    fn llm(provider: LlmProvider, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: key.map(|value| SecretString::from(value.to_string())),
            base_url: None,
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            retry_base_delay_ms: 1,
        }
    }

    #[test]
    fn endpoints_follow_provider_and_base_url() {
        assert_eq!(
            endpoint_for(LlmProvider::OpenAi, None),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            endpoint_for(LlmProvider::Ollama, Some("http://gpu-box:11434/")),
            "http://gpu-box:11434/api/chat"
        );
        assert_eq!(
            endpoint_for(LlmProvider::Anthropic, Some("https://proxy.internal")),
            "https://proxy.internal/v1/messages"
        );
    }

    #[test]
    fn anthropic_body_carries_system_prompt_out_of_band() {
        let request = CompletionRequest::new("scope?")
            .with_system_prompt("cable expert")
            .with_temperature(0.3)
            .with_max_tokens(200);
        let body = build_request_body(LlmProvider::Anthropic, "claude", &request);

        assert_eq!(body["system"], "cable expert");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));

        let openai = build_request_body(LlmProvider::OpenAi, "gpt", &request);
        assert_eq!(openai["messages"][0]["role"], "system");
        assert_eq!(openai["messages"][1]["content"], "scope?");
    }

    #[test]
    fn responses_are_parsed_per_provider() {
        let openai = parse_response(
            LlmProvider::OpenAi,
            "gpt",
            r#"{"choices":[{"message":{"content":"hello"}}],"usage":{"total_tokens":12}}"#,
        )
        .expect("openai shape");
        assert_eq!((openai.content.as_str(), openai.tokens_used), ("hello", Some(12)));

        let anthropic = parse_response(
            LlmProvider::Anthropic,
            "claude",
            r#"{"content":[{"type":"text","text":"hi"}],"usage":{"input_tokens":3,"output_tokens":4}}"#,
        )
        .expect("anthropic shape");
        assert_eq!((anthropic.content.as_str(), anthropic.tokens_used), ("hi", Some(7)));

        let ollama = parse_response(
            LlmProvider::Ollama,
            "llama",
            r#"{"message":{"role":"assistant","content":"local"},"eval_count":5}"#,
        )
        .expect("ollama shape");
        assert_eq!((ollama.content.as_str(), ollama.tokens_used), ("local", Some(5)));
    }

    #[test]
    fn http_errors_are_classified() {
        assert_eq!(
            parse_http_error(401, "nope", "openai"),
            CompletionError::Authentication { provider: "openai".to_string() }
        );
        assert!(parse_http_error(429, "slow down", "openai").is_retryable());
        assert!(parse_http_error(502, "bad gateway", "anthropic").is_retryable());
    }

    #[test]
    fn missing_key_yields_an_unconfigured_client() {
        let client = client_from_config(&llm(LlmProvider::OpenAi, None)).expect("builds");
        assert!(!client.is_configured());

        let client = client_from_config(&llm(LlmProvider::Ollama, None)).expect("builds");
        assert!(client.is_configured());
        assert_eq!(client.provider(), "ollama");
    }
}
