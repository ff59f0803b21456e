use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use tenderdesk_core::config::AppConfig;
use toml::Value;

use crate::commands::{load_config, CommandResult};

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields(&config).into_iter().map(|field| {
        let source = field_source(
            field.key,
            Some(field.env_key),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        render_line(field.key, &field.value, source)
    }));

    CommandResult::success("config", lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let field = |key, env_key, value: String| Field { key, env_key, value };
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|secret| redact_token(secret.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        field("database.url", "TENDERDESK_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "TENDERDESK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "TENDERDESK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field("llm.provider", "TENDERDESK_LLM_PROVIDER", config.llm.provider.as_str().to_string()),
        field("llm.model", "TENDERDESK_LLM_MODEL", config.llm.model.clone()),
        field(
            "llm.base_url",
            "TENDERDESK_LLM_BASE_URL",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        field("llm.api_key", "TENDERDESK_LLM_API_KEY", api_key),
        field("llm.timeout_secs", "TENDERDESK_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        field("llm.max_retries", "TENDERDESK_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        field(
            "llm.retry_base_delay_ms",
            "TENDERDESK_LLM_RETRY_BASE_DELAY_MS",
            config.llm.retry_base_delay_ms.to_string(),
        ),
        field(
            "server.bind_address",
            "TENDERDESK_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field("server.port", "TENDERDESK_SERVER_PORT", config.server.port.to_string()),
        field(
            "server.graceful_shutdown_secs",
            "TENDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field(
            "pipeline.compatibility_threshold",
            "TENDERDESK_PIPELINE_COMPATIBILITY_THRESHOLD",
            config.pipeline.compatibility_threshold.to_string(),
        ),
        field(
            "pipeline.default_quantity",
            "TENDERDESK_PIPELINE_DEFAULT_QUANTITY",
            config.pipeline.default_quantity.to_string(),
        ),
        field(
            "pipeline.default_services",
            "TENDERDESK_PIPELINE_DEFAULT_SERVICES",
            config.pipeline.default_services.join(","),
        ),
        field(
            "pipeline.volume_discounts",
            "TENDERDESK_PIPELINE_VOLUME_DISCOUNTS",
            config.pipeline.volume_discounts.to_string(),
        ),
        field(
            "pipeline.margins.recommended",
            "TENDERDESK_PIPELINE_RECOMMENDED_MARGIN",
            config.pipeline.margins.recommended.to_string(),
        ),
        field("logging.level", "TENDERDESK_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "TENDERDESK_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tenderdesk.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tenderdesk.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognisable key prefix such as `sk-` and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
