//! Service configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables.  [`ServiceConfig::normalize`] runs last and
//! repairs out-of-range values, logging every correction.
//!
//! A missing credential is deliberately not an error here.  The service
//! starts without one and every completion call fails fast instead.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::llm::client::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::llm::LlmClientConfig;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_API_KEY: &str = "DEEPSEEK_API_KEY";
pub const ENV_BASE_URL: &str = "DEEPSEEK_BASE_URL";
pub const ENV_MODEL: &str = "DEEPSEEK_MODEL";
pub const ENV_CONFIDENCE_THRESHOLD: &str = "INTENTFLOW_CONFIDENCE_THRESHOLD";
pub const ENV_BIND_ADDR: &str = "INTENTFLOW_BIND_ADDR";
pub const ENV_PORT: &str = "INTENTFLOW_PORT";

/// Default minimum confidence for a positive intent verdict.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Intent classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    /// A raw positive claim only survives gating at or above this value.
    pub confidence_threshold: f64,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Plan decomposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionSettings {
    /// Upper bound on steps requested from the model.
    pub max_steps: usize,
    /// Upper bound on variables requested from the model.
    pub variable_limit: usize,
}

impl Default for DecompositionSettings {
    fn default() -> Self {
        Self {
            max_steps: 10,
            variable_limit: 20,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

// ---------------------------------------------------------------------------
// Root configuration
// ---------------------------------------------------------------------------

/// Complete configuration for the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub llm: LlmClientConfig,
    pub intent: IntentSettings,
    pub decomposition: DecompositionSettings,
    pub server: ServerSettings,
}

impl ServiceConfig {
    /// Load configuration from an optional TOML file plus the process
    /// environment, then normalize it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load), reading overrides from `lookup` instead of
    /// the process environment.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(lookup);
        config.normalize();
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to read config file {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    /// Parse configuration from TOML text.  Absent sections and keys keep
    /// their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::ConfigError {
            reason: format!("failed to parse TOML config: {e}"),
        })
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` abstracts `std::env::var` so callers (and tests) can supply
    /// their own source.  Blank values are ignored; unparseable numbers are
    /// logged and ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model_name = model;
        }
        if let Some(raw) = get(ENV_CONFIDENCE_THRESHOLD) {
            match raw.trim().parse::<f64>() {
                Ok(v) => self.intent.confidence_threshold = v,
                Err(e) => warn!(var = ENV_CONFIDENCE_THRESHOLD, value = %raw, error = %e, "ignoring unparseable override"),
            }
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
        if let Some(raw) = get(ENV_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(v) => self.server.port = v,
                Err(e) => warn!(var = ENV_PORT, value = %raw, error = %e, "ignoring unparseable override"),
            }
        }
    }

    /// Replace missing or out-of-range values with defaults.
    pub fn normalize(&mut self) {
        let llm = &mut self.llm;

        if !llm.has_usable_api_key() {
            warn!(
                "completion API key is not configured; set {ENV_API_KEY}. \
                 The service will start but classification and decomposition will degrade"
            );
        }

        if llm.base_url.trim().is_empty() {
            llm.base_url = DEFAULT_BASE_URL.to_owned();
            warn!(base_url = %llm.base_url, "using default completion base URL");
        }
        let trimmed = llm.base_url.trim().trim_end_matches('/').to_owned();
        llm.base_url = trimmed;

        if llm.model_name.trim().is_empty() {
            llm.model_name = DEFAULT_MODEL.to_owned();
            warn!(model = %llm.model_name, "using default model");
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            warn!(temperature = llm.temperature, "temperature out of range, using default");
            llm.temperature = DEFAULT_TEMPERATURE;
        }

        if llm.max_tokens == 0 {
            llm.max_tokens = DEFAULT_MAX_TOKENS;
            warn!(max_tokens = llm.max_tokens, "using default max_tokens");
        }

        let defaults = DecompositionSettings::default();
        if self.decomposition.max_steps == 0 {
            warn!(max_steps = defaults.max_steps, "max_steps must be positive, using default");
            self.decomposition.max_steps = defaults.max_steps;
        }
        if self.decomposition.variable_limit == 0 {
            warn!(variable_limit = defaults.variable_limit, "variable_limit must be positive, using default");
            self.decomposition.variable_limit = defaults.variable_limit;
        }

        let threshold = self.intent.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            warn!(threshold, "confidence threshold out of range, using default");
            self.intent.confidence_threshold = DEFAULT_CONFIDENCE_THRESHOLD;
        }

        info!(
            base_url = %self.llm.base_url,
            model = %self.llm.model_name,
            temperature = self.llm.temperature,
            max_tokens = self.llm.max_tokens,
            threshold = self.intent.confidence_threshold,
            "configuration validated"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
