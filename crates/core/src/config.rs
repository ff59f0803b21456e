use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::TargetMargins;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl LlmConfig {
    /// Hosted providers cannot be called without a key; the local provider can.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Anthropic => self
                .api_key
                .as_ref()
                .map(|value| !value.expose_secret().trim().is_empty())
                .unwrap_or(false),
            LlmProvider::Ollama => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub compatibility_threshold: u8,
    /// Meters priced when the tender text states no quantity.
    pub default_quantity: u32,
    pub default_services: Vec<String>,
    pub scope_char_limit: usize,
    pub quantity_char_limit: usize,
    pub margins: TargetMargins,
    pub volume_discounts: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub compatibility_threshold: Option<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tenderdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                retry_base_delay_ms: 250,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            pipeline: PipelineConfig {
                compatibility_threshold: 70,
                default_quantity: 1000,
                default_services: vec!["Documentation".to_string(), "Delivery".to_string()],
                scope_char_limit: 8000,
                quantity_char_limit: 4000,
                margins: TargetMargins::default(),
                volume_discounts: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tenderdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(retry_base_delay_ms) = llm.retry_base_delay_ms {
                self.llm.retry_base_delay_ms = retry_base_delay_ms;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(threshold) = pipeline.compatibility_threshold {
                self.pipeline.compatibility_threshold = threshold;
            }
            if let Some(default_quantity) = pipeline.default_quantity {
                self.pipeline.default_quantity = default_quantity;
            }
            if let Some(default_services) = pipeline.default_services {
                self.pipeline.default_services = default_services;
            }
            if let Some(scope_char_limit) = pipeline.scope_char_limit {
                self.pipeline.scope_char_limit = scope_char_limit;
            }
            if let Some(quantity_char_limit) = pipeline.quantity_char_limit {
                self.pipeline.quantity_char_limit = quantity_char_limit;
            }
            if let Some(volume_discounts) = pipeline.volume_discounts {
                self.pipeline.volume_discounts = volume_discounts;
            }
            if let Some(margins) = pipeline.margins {
                let target = &mut self.pipeline.margins;
                if let Some(aggressive) = margins.aggressive {
                    target.aggressive = aggressive;
                }
                if let Some(recommended) = margins.recommended {
                    target.recommended = recommended;
                }
                if let Some(premium) = margins.premium {
                    target.premium = premium;
                }
                if let Some(optimal) = margins.optimal {
                    target.optimal = optimal;
                }
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TENDERDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TENDERDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TENDERDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TENDERDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERDESK_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("TENDERDESK_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TENDERDESK_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("TENDERDESK_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TENDERDESK_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TENDERDESK_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("TENDERDESK_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_LLM_RETRY_BASE_DELAY_MS") {
            self.llm.retry_base_delay_ms =
                parse_u64("TENDERDESK_LLM_RETRY_BASE_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("TENDERDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TENDERDESK_SERVER_PORT") {
            self.server.port = parse_u16("TENDERDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TENDERDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TENDERDESK_PIPELINE_COMPATIBILITY_THRESHOLD") {
            self.pipeline.compatibility_threshold =
                parse_u8("TENDERDESK_PIPELINE_COMPATIBILITY_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_PIPELINE_DEFAULT_QUANTITY") {
            self.pipeline.default_quantity =
                parse_u32("TENDERDESK_PIPELINE_DEFAULT_QUANTITY", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_PIPELINE_DEFAULT_SERVICES") {
            self.pipeline.default_services = value
                .split(',')
                .map(str::trim)
                .filter(|service| !service.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = read_env("TENDERDESK_PIPELINE_VOLUME_DISCOUNTS") {
            self.pipeline.volume_discounts =
                parse_bool("TENDERDESK_PIPELINE_VOLUME_DISCOUNTS", &value)?;
        }
        if let Some(value) = read_env("TENDERDESK_PIPELINE_RECOMMENDED_MARGIN") {
            self.pipeline.margins.recommended =
                parse_decimal("TENDERDESK_PIPELINE_RECOMMENDED_MARGIN", &value)?;
        }

        let log_level =
            read_env("TENDERDESK_LOGGING_LEVEL").or_else(|| read_env("TENDERDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TENDERDESK_LOGGING_FORMAT").or_else(|| read_env("TENDERDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(threshold) = overrides.compatibility_threshold {
            self.pipeline.compatibility_threshold = threshold;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_pipeline(&self.pipeline)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tenderdesk.toml"), PathBuf::from("config/tenderdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 10 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 10".to_string()));
    }

    if llm.retry_base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "llm.retry_base_delay_ms must be greater than zero".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.provider == LlmProvider::Ollama {
        let missing = llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.base_url is required for ollama provider".to_string(),
            ));
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.compatibility_threshold > 100 {
        return Err(ConfigError::Validation(
            "pipeline.compatibility_threshold must be in range 0..=100".to_string(),
        ));
    }

    if pipeline.default_quantity == 0 {
        return Err(ConfigError::Validation(
            "pipeline.default_quantity must be greater than zero".to_string(),
        ));
    }

    if pipeline.scope_char_limit == 0 || pipeline.quantity_char_limit == 0 {
        return Err(ConfigError::Validation(
            "pipeline character limits must be greater than zero".to_string(),
        ));
    }

    pipeline
        .margins
        .validate()
        .map_err(|error| ConfigError::Validation(format!("pipeline.margins: {error}")))
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| invalid_override(key, value))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    pipeline: Option<PipelinePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_base_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    compatibility_threshold: Option<u8>,
    default_quantity: Option<u32>,
    default_services: Option<Vec<String>>,
    scope_char_limit: Option<usize>,
    quantity_char_limit: Option<usize>,
    volume_discounts: Option<bool>,
    margins: Option<MarginsPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct MarginsPatch {
    aggressive: Option<Decimal>,
    recommended: Option<Decimal>,
    premium: Option<Decimal>,
    optimal: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
