use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::providers::gemini::convert::config::{HarmCategory, SafetyThreshold};

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "thinking.enable_fake_thinking") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    /// Get all overrides as a map of setting key -> env var name.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub thinking: ThinkingSettings,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

/// Where and how to reach the Cloud Code backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Pin the Cloud Code project instead of discovering it.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            project_id: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Static OAuth access token used by the command-line client.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Switches and pacing for reasoning output.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThinkingSettings {
    /// Synthesize a reasoning preamble for thinking models.
    #[serde(default)]
    pub enable_fake_thinking: bool,
    /// Ask the backend for its own thought parts.
    #[serde(default)]
    pub enable_real_thinking: bool,
    /// Emit thinking inline as `<thinking>` delimited content.
    #[serde(default)]
    pub stream_thinking_as_content: bool,
    #[serde(default = "default_reasoning_delay_ms")]
    pub reasoning_delay_ms: u64,
    #[serde(default = "default_thinking_chunk_delay_ms")]
    pub thinking_chunk_delay_ms: u64,
    #[serde(default = "default_thinking_chunk_size")]
    pub thinking_chunk_size: usize,
    /// Budget used when the caller gives none. `-1` lets the model decide.
    #[serde(default = "default_thinking_budget")]
    pub default_budget: i32,
}

impl Default for ThinkingSettings {
    fn default() -> Self {
        Self {
            enable_fake_thinking: false,
            enable_real_thinking: false,
            stream_thinking_as_content: false,
            reasoning_delay_ms: default_reasoning_delay_ms(),
            thinking_chunk_delay_ms: default_thinking_chunk_delay_ms(),
            thinking_chunk_size: default_thinking_chunk_size(),
            default_budget: default_thinking_budget(),
        }
    }
}

impl ThinkingSettings {
    pub fn reasoning_delay(&self) -> Duration {
        Duration::from_millis(self.reasoning_delay_ms)
    }

    pub fn thinking_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_chunk_delay_ms)
    }
}

/// Model downgrade on upstream rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub auto_switch: bool,
    /// Original model id -> model to retry with.
    #[serde(default = "default_fallback_models")]
    pub models: HashMap<String, String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            auto_switch: false,
            models: default_fallback_models(),
        }
    }
}

impl FallbackConfig {
    /// The fallback for `model`, when switching is enabled and one is mapped.
    pub fn fallback_for(&self, model: &str) -> Option<&str> {
        if !self.auto_switch {
            return None;
        }
        self.models
            .get(model)
            .map(String::as_str)
            .filter(|fallback| *fallback != model)
    }
}

/// Per-category moderation thresholds. Unset categories are left to the backend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SafetyConfig {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harassment: Option<SafetyThreshold>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hate_speech: Option<SafetyThreshold>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sexually_explicit: Option<SafetyThreshold>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangerous_content: Option<SafetyThreshold>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civic_integrity: Option<SafetyThreshold>,
}

impl SafetyConfig {
    /// Configured categories in a stable order.
    pub fn thresholds(&self) -> Vec<(HarmCategory, SafetyThreshold)> {
        [
            (HarmCategory::Harassment, self.harassment),
            (HarmCategory::HateSpeech, self.hate_speech),
            (HarmCategory::SexuallyExplicit, self.sexually_explicit),
            (HarmCategory::DangerousContent, self.dangerous_content),
            (HarmCategory::CivicIntegrity, self.civic_integrity),
        ]
        .into_iter()
        .filter_map(|(category, threshold)| threshold.map(|t| (category, t)))
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    crate::providers::gemini::constants::CLOUDCODE_ENDPOINT.to_string()
}
const fn default_connect_timeout_secs() -> u64 {
    10
}
const fn default_request_timeout_secs() -> u64 {
    300
}
const fn default_reasoning_delay_ms() -> u64 {
    100
}
const fn default_thinking_chunk_delay_ms() -> u64 {
    50
}
const fn default_thinking_chunk_size() -> usize {
    15
}
const fn default_thinking_budget() -> i32 {
    crate::providers::gemini::constants::DEFAULT_THINKING_BUDGET
}
fn default_fallback_models() -> HashMap<String, String> {
    HashMap::from([("gemini-2.5-pro".to_string(), "gemini-2.5-flash".to_string())])
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `GEMRELAY_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides, reading each `GEMRELAY_*` variable through `lookup`.
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_opt_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    $field = if val.is_empty() { None } else { Some(val) };
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_threshold {
            ($key:expr, $env:expr, $field:expr) => {
                if let Some(val) = lookup($env) {
                    match val.parse::<SafetyThreshold>() {
                        Ok(parsed) => {
                            $field = Some(parsed);
                            ov.record($key, $env);
                        }
                        Err(e) => tracing::warn!(env = $env, error = %e, "Ignoring invalid threshold"),
                    }
                }
            };
        }

        // -- Backend --
        env_str!("backend.base_url", "GEMRELAY_BASE_URL", self.backend.base_url);
        env_opt_str!("backend.project_id", "GEMRELAY_PROJECT_ID", self.backend.project_id);
        env_parse!(
            "backend.connect_timeout_secs",
            "GEMRELAY_CONNECT_TIMEOUT_SECS",
            self.backend.connect_timeout_secs
        );
        env_parse!(
            "backend.request_timeout_secs",
            "GEMRELAY_REQUEST_TIMEOUT_SECS",
            self.backend.request_timeout_secs
        );

        // -- Auth --
        env_opt_str!("auth.access_token", "GEMRELAY_ACCESS_TOKEN", self.auth.access_token);

        // -- Thinking --
        env_bool!(
            "thinking.enable_fake_thinking",
            "GEMRELAY_ENABLE_FAKE_THINKING",
            self.thinking.enable_fake_thinking
        );
        env_bool!(
            "thinking.enable_real_thinking",
            "GEMRELAY_ENABLE_REAL_THINKING",
            self.thinking.enable_real_thinking
        );
        env_bool!(
            "thinking.stream_thinking_as_content",
            "GEMRELAY_STREAM_THINKING_AS_CONTENT",
            self.thinking.stream_thinking_as_content
        );
        env_parse!(
            "thinking.default_budget",
            "GEMRELAY_DEFAULT_THINKING_BUDGET",
            self.thinking.default_budget
        );

        // -- Fallback --
        env_bool!(
            "fallback.auto_switch",
            "GEMRELAY_ENABLE_AUTO_MODEL_SWITCHING",
            self.fallback.auto_switch
        );

        // -- Safety --
        env_threshold!(
            "safety.harassment",
            "GEMRELAY_HARASSMENT_THRESHOLD",
            self.safety.harassment
        );
        env_threshold!(
            "safety.hate_speech",
            "GEMRELAY_HATE_SPEECH_THRESHOLD",
            self.safety.hate_speech
        );
        env_threshold!(
            "safety.sexually_explicit",
            "GEMRELAY_SEXUALLY_EXPLICIT_THRESHOLD",
            self.safety.sexually_explicit
        );
        env_threshold!(
            "safety.dangerous_content",
            "GEMRELAY_DANGEROUS_CONTENT_THRESHOLD",
            self.safety.dangerous_content
        );
        env_threshold!(
            "safety.civic_integrity",
            "GEMRELAY_CIVIC_INTEGRITY_THRESHOLD",
            self.safety.civic_integrity
        );

        // -- Logging --
        env_str!("logging.level", "GEMRELAY_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "GEMRELAY_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
