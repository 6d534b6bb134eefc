//! Configuration for Outreach

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Send pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Outbound SMTP client settings
    #[serde(default)]
    pub smtp: SmtpClientConfig,

    /// AI backend settings
    #[serde(default)]
    pub ai: AiConfig,

    /// Batch re-invocation policy
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname, also used as the EHLO name unless overridden
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            bind_address: default_bind_address(),
        }
    }
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database backend, only "postgres" is supported
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_db_backend() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// CORS allowed origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Hex SHA-256 digests of accepted bearer tokens. Empty disables the check.
    #[serde(default)]
    pub service_token_hashes: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            cors_origins: Vec::new(),
            service_token_hashes: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Whether callers must present a service token. Without one the
    /// `X-User-Id` header is trusted as-is.
    pub fn requires_service_token(&self) -> bool {
        !self.service_token_hashes.is_empty()
    }
}

fn default_api_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Send pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Recipients claimed per invocation, 0 means unbounded
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Persist campaign progress every N processed recipients
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u32,

    /// Pause after a successful send (AI rate limit headroom)
    #[serde(default = "default_delay_after_success")]
    pub delay_after_success_ms: u64,

    /// Pause after a failed recipient
    #[serde(default = "default_delay_after_failure")]
    pub delay_after_failure_ms: u64,

    /// Claims older than this may be taken over by another invocation
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            progress_interval: default_progress_interval(),
            delay_after_success_ms: default_delay_after_success(),
            delay_after_failure_ms: default_delay_after_failure(),
            claim_ttl_secs: default_claim_ttl(),
        }
    }
}

fn default_batch_size() -> u32 {
    25
}

fn default_progress_interval() -> u32 {
    5
}

fn default_delay_after_success() -> u64 {
    5000
}

fn default_delay_after_failure() -> u64 {
    2000
}

fn default_claim_ttl() -> u64 {
    900
}

/// Outbound SMTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpClientConfig {
    /// Per-operation timeout in seconds (connect, read, write, TLS upgrade)
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,

    /// Name announced in EHLO, defaults to `server.hostname`
    pub helo_name: Option<String>,
}

impl Default for SmtpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_smtp_timeout(),
            helo_name: None,
        }
    }
}

fn default_smtp_timeout() -> u64 {
    20
}

/// AI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_url")]
    pub openai_url: String,

    /// Chat completion model
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Gemini API base URL
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    /// Gemini model name
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling (Gemini only)
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling (Gemini only)
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    /// Attempts made when the backend answers 429
    #[serde(default = "default_ai_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay, doubled on every retry
    #[serde(default = "default_ai_backoff")]
    pub backoff_base_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_url: default_openai_url(),
            openai_model: default_openai_model(),
            gemini_url: default_gemini_url(),
            gemini_model: default_gemini_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            timeout_secs: default_ai_timeout(),
            max_attempts: default_ai_max_attempts(),
            backoff_base_ms: default_ai_backoff(),
        }
    }
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

fn default_ai_timeout() -> u64 {
    60
}

fn default_ai_max_attempts() -> u32 {
    3
}

fn default_ai_backoff() -> u64 {
    2000
}

/// Batch re-invocation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Consecutive failed batch invocations tolerated
    #[serde(default = "default_driver_attempts")]
    pub max_attempts: u32,

    /// First delay before re-invoking a failed batch, doubled each time
    #[serde(default = "default_driver_delay")]
    pub base_delay_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_driver_attempts(),
            base_delay_secs: default_driver_delay(),
        }
    }
}

fn default_driver_attempts() -> u32 {
    3
}

fn default_driver_delay() -> u64 {
    5
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the first file found plus `OUTREACH__*` environment overrides
    pub fn load() -> crate::Result<Self> {
        let paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("/etc/outreach/config.toml"),
        ];

        let mut builder = config::Config::builder();

        if let Some(path) = paths.into_iter().find(|p| p.exists()) {
            tracing::info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("OUTREACH")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Config>())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))
    }

    /// Name announced to SMTP servers
    pub fn helo_name(&self) -> &str {
        self.smtp
            .helo_name
            .as_deref()
            .unwrap_or(&self.server.hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.hostname, "localhost");
        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.smtp.timeout_secs, 20);
        assert_eq!(config.ai.max_attempts, 3);
        assert_eq!(config.ai.backoff_base_ms, 2000);
        assert_eq!(config.driver.max_attempts, 3);
        assert_eq!(config.driver.base_delay_secs, 5);
        assert_eq!(config.helo_name(), "localhost");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
hostname = "mailer.example.com"

[database]
url = "postgres://localhost/outreach"

[pipeline]
batch_size = 0
delay_after_success_ms = 0

[smtp]
helo_name = "outbound.example.com"

[ai]
openai_model = "gpt-4o"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.hostname, "mailer.example.com");
        assert_eq!(config.database.backend, "postgres");
        assert_eq!(config.pipeline.batch_size, 0);
        assert_eq!(config.pipeline.delay_after_failure_ms, 2000);
        assert_eq!(config.ai.openai_model, "gpt-4o");
        assert_eq!(config.ai.gemini_model, "gemini-1.5-flash");
        assert_eq!(config.helo_name(), "outbound.example.com");
        assert!(!config.api.requires_service_token());
    }

    #[test]
    fn test_service_token_requirement() {
        let mut api = ApiConfig::default();
        assert!(!api.requires_service_token());

        api.service_token_hashes = vec![
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08".to_string(),
        ];
        assert!(api.requires_service_token());
    }
}
