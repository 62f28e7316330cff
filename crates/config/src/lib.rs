//! Configuration loading, validation, and management for the IIoT assistant.
//!
//! Loads configuration from `~/.iiot-assistant/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup; every field has a default so a missing file is not an error.

use iiot_assistant_core::agent::{ToolFailurePolicy, UnknownToolPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a assistant that can help analyze IIoT data that is coming from a factory and perform tasks like check it for outliers etc.
Besides the analysis of numerical data, that you can retrieve using the tools that are given to you (API calls), you can also retrieve
textual information using RAG (Retrieval Augmented Generation) to explain potential circumstances that are outside of the norm.
The \"normal\" range of values can be looked up in the documentation (RAG-tool).

When you return data, you always return it in the markdown format.
Please try to format your answeres in markdown to create a better user experience, thank you!

You do know the current time because the timestamp is always passed together with the user's message!
";

/// Description of the factory database returned by the `get_db_info` tool.
pub const DEFAULT_DATABASE_DESCRIPTION: &str = "\
The following tables are available to you via the API:
- machine
- ambient
- input
- qa

The tables have the following fields.
- machine: id, time_stamp, motor_rpm, material_pressure, material_temperature, combiner_operation_temperature_1/_2/_3
- ambient: id, time_stamp, ambient_humidity, ambient_temperature, zone_1_temperature
- input: id, time_stamp, shininess
- qa: id, time_stamp, floatiness
";

/// The root configuration structure.
///
/// Maps directly to `~/.iiot-assistant/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per model response (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// strftime format of the timestamp appended to every prompt
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,

    /// Fixed system prompt opening every session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Human-readable description of the telemetry tables
    #[serde(default = "default_database_description")]
    pub database_description: String,

    /// Response loop policies
    #[serde(default)]
    pub agent: AgentSettings,

    /// Which tools are offered to the model
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Factory telemetry API
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Document search service
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".into()
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_database_description() -> String {
    DEFAULT_DATABASE_DESCRIPTION.into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("datetime_format", &self.datetime_format)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("telemetry", &self.telemetry)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub unknown_tool_policy: UnknownToolPolicy,

    #[serde(default)]
    pub tool_failure_policy: ToolFailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool names offered to the model, e.g. `["get_db_info", "get_logs"]`
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,
}

fn default_enabled_tools() -> Vec<String> {
    vec![
        "get_db_info".into(),
        "get_iiot_data".into(),
        "get_logs".into(),
        "query_documentation".into(),
    ]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Base URL of the factory API
    #[serde(default = "default_telemetry_url")]
    pub base_url: String,

    /// Array responses are cut to this many entries before reaching the model
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_telemetry_url() -> String {
    "http://localhost:8080/".into()
}
fn default_max_entries() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: default_telemetry_url(),
            max_entries: default_max_entries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Azure AI Search service name (`<name>.search.windows.net`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Full service URL; takes precedence over `service_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Field of each search hit holding the chunk text
    #[serde(default = "default_content_key")]
    pub content_key: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Chunks scoring below this are dropped; 0 keeps everything
    #[serde(default)]
    pub min_score: f64,

    #[serde(default = "default_search_api_version")]
    pub api_version: String,
}

fn default_content_key() -> String {
    "content".into()
}
fn default_top_k() -> usize {
    10
}
fn default_search_api_version() -> String {
    "2023-11-01".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            service_name: None,
            endpoint: None,
            index_name: None,
            api_key: None,
            content_key: default_content_key(),
            top_k: default_top_k(),
            min_score: 0.0,
            api_version: default_search_api_version(),
        }
    }
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("service_name", &self.service_name)
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("api_key", &redact(&self.api_key))
            .field("content_key", &self.content_key)
            .field("top_k", &self.top_k)
            .field("min_score", &self.min_score)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl RetrievalConfig {
    /// Whether enough is configured to reach the search service.
    pub fn is_configured(&self) -> bool {
        (self.endpoint.is_some() || self.service_name.is_some())
            && self.index_name.is_some()
            && self.api_key.is_some()
    }

    /// The document search URL, if the service is configured.
    pub fn search_url(&self) -> Option<String> {
        let base = match (&self.endpoint, &self.service_name) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(service)) => format!("https://{service}.search.windows.net"),
            (None, None) => return None,
        };
        let index = self.index_name.as_ref()?;
        Some(format!(
            "{base}/indexes/{index}/docs/search?api-version={}",
            self.api_version
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Sessions kept in memory before the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// Environment variables override file values:
    /// - `IIOT_ASSISTANT_API_KEY`, then `OPENAI_API_KEY` (if no key is configured)
    /// - `IIOT_ASSISTANT_PROVIDER`, `IIOT_ASSISTANT_MODEL`
    /// - `IIOT_ASSISTANT_TELEMETRY_URL`
    /// - `AZURE_SEARCH_KEY` (if no search key is configured)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("IIOT_ASSISTANT_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(provider) = lookup("IIOT_ASSISTANT_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("IIOT_ASSISTANT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = lookup("IIOT_ASSISTANT_TELEMETRY_URL") {
            self.telemetry.base_url = url;
        }
        if self.retrieval.api_key.is_none() {
            self.retrieval.api_key = lookup("AZURE_SEARCH_KEY");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".iiot-assistant")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.datetime_format.trim().is_empty() || !is_valid_strftime(&self.datetime_format) {
            return Err(ConfigError::ValidationError(format!(
                "datetime_format '{}' is not a valid strftime format",
                self.datetime_format
            )));
        }

        if self.system_prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError("system_prompt must not be empty".into()));
        }

        if !self.telemetry.base_url.starts_with("http://")
            && !self.telemetry.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "telemetry.base_url must start with http:// or https://".into(),
            ));
        }

        if self.telemetry.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.max_entries must be at least 1".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if self.retrieval.min_score < 0.0 {
            return Err(ConfigError::ValidationError(
                "retrieval.min_score must not be negative".into(),
            ));
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: None,
            datetime_format: default_datetime_format(),
            system_prompt: default_system_prompt(),
            database_description: default_database_description(),
            agent: AgentSettings::default(),
            tools: ToolsConfig::default(),
            telemetry: TelemetryConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn is_valid_strftime(format: &str) -> bool {
    use chrono::format::{Item, StrftimeItems};
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
