//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony provider account settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Spoken-voice and recording settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Subprocess collaborator commands.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Transcript database settings.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL, embedded in provider callback URLs.
    #[serde(default)]
    pub public_url: String,
}

/// Telephony provider account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Provider account identifier.
    #[serde(default)]
    pub account_sid: String,

    /// Provider account secret.
    #[serde(default)]
    pub auth_token: String,

    /// The number calls originate from.
    #[serde(default)]
    pub from_number: String,

    /// Default destination for outbound calls.
    #[serde(default)]
    pub default_to: String,

    /// The single caller address allowed to start inbound calls.
    #[serde(default)]
    pub allowed_caller: String,
}

/// Spoken-voice and recording configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// Provider voice name for `Say` directives.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Opening line for inbound calls.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Hard cap on each recording, in seconds. Must stay well under the
    /// provider's per-request limit.
    #[serde(default = "default_record_max_secs")]
    pub record_max_secs: u32,

    /// Seconds of silence that end a recording.
    #[serde(default = "default_record_timeout_secs")]
    pub record_timeout_secs: u32,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How often the eviction sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Wait before fetching a fresh recording, covering provider-side
    /// availability latency.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

/// Subprocess collaborator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Transcription command: audio on stdin, text on stdout.
    #[serde(default)]
    pub stt_command: String,

    /// Extra arguments for the transcription command.
    #[serde(default)]
    pub stt_args: Vec<String>,

    /// Assistant command: prompt on stdin, reply on stdout.
    #[serde(default)]
    pub assistant_command: String,

    /// Extra arguments for the assistant command.
    #[serde(default)]
    pub assistant_args: Vec<String>,
}

/// Transcript database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptConfig {
    /// Path to the SQLite transcript file.
    #[serde(default = "default_transcript_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "switchboard_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_api_base() -> String {
    "https://api.twilio.com/2010-04-01".to_string()
}

fn default_voice() -> String {
    "alice".to_string()
}

fn default_greeting() -> String {
    "Hi! What can I do for you?".to_string()
}

fn default_record_max_secs() -> u32 {
    60
}

fn default_record_timeout_secs() -> u32 {
    3
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_grace_secs() -> u64 {
    1
}

fn default_transcript_path() -> String {
    "switchboard.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            default_to: String::new(),
            allowed_caller: String::new(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            greeting: default_greeting(),
            record_max_secs: default_record_max_secs(),
            record_timeout_secs: default_record_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            path: default_transcript_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required setting is absent.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

impl Config {
    /// Checks that every setting the bridge cannot run without is present.
    /// Configuration failures are fatal at startup, not at call time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.public_url.trim().is_empty() {
            return Err(ConfigError::Missing("server.public_url"));
        }
        if self.provider.account_sid.trim().is_empty() {
            return Err(ConfigError::Missing("provider.account_sid"));
        }
        if self.provider.auth_token.trim().is_empty() {
            return Err(ConfigError::Missing("provider.auth_token"));
        }
        if self.provider.from_number.trim().is_empty() {
            return Err(ConfigError::Missing("provider.from_number"));
        }
        if self.provider.allowed_caller.trim().is_empty() {
            return Err(ConfigError::Missing("provider.allowed_caller"));
        }
        if self.pipeline.stt_command.trim().is_empty() {
            return Err(ConfigError::Missing("pipeline.stt_command"));
        }
        if self.pipeline.assistant_command.trim().is_empty() {
            return Err(ConfigError::Missing("pipeline.assistant_command"));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHBOARD_HOST` overrides `server.host`
/// - `SWITCHBOARD_PORT` overrides `server.port`
/// - `SWITCHBOARD_PUBLIC_URL` overrides `server.public_url`
/// - `SWITCHBOARD_ACCOUNT_SID` overrides `provider.account_sid`
/// - `SWITCHBOARD_AUTH_TOKEN` overrides `provider.auth_token`
/// - `SWITCHBOARD_FROM_NUMBER` overrides `provider.from_number`
/// - `SWITCHBOARD_DEFAULT_TO` overrides `provider.default_to`
/// - `SWITCHBOARD_ALLOWED_CALLER` overrides `provider.allowed_caller`
/// - `SWITCHBOARD_STT_COMMAND` overrides `pipeline.stt_command`
/// - `SWITCHBOARD_ASSISTANT_COMMAND` overrides `pipeline.assistant_command`
/// - `SWITCHBOARD_TRANSCRIPT_PATH` overrides `transcript.path`
/// - `SWITCHBOARD_LOG_LEVEL` overrides `logging.level`
/// - `SWITCHBOARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("SWITCHBOARD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_PUBLIC_URL") {
        config.server.public_url = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_ACCOUNT_SID") {
        config.provider.account_sid = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_AUTH_TOKEN") {
        config.provider.auth_token = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_FROM_NUMBER") {
        config.provider.from_number = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_DEFAULT_TO") {
        config.provider.default_to = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_ALLOWED_CALLER") {
        config.provider.allowed_caller = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_STT_COMMAND") {
        config.pipeline.stt_command = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_ASSISTANT_COMMAND") {
        config.pipeline.assistant_command = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_TRANSCRIPT_PATH") {
        config.transcript.path = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = std::env::var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = value == "true" || value == "1";
    }

    Ok(config)
}
