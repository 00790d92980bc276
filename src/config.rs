//! Strongly-typed configuration for the formrunner core.
//!
//! Configuration values can be constructed from defaults, loaded from
//! environment variables (with optional `.env` support), or merged with
//! explicit overrides for ergonomic programmatic updates. The environment
//! discriminator chosen here selects the browser backend variant exactly once;
//! nothing above the session layer re-checks it.

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default directory for file-strategy screenshots, relative to the working
/// directory.
pub const DEFAULT_SCREENSHOT_DIR: &str = "public/screenshots";

/// Execution environment the runner should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Full-featured local engine; may run headful for interactive debugging.
    Local,
    /// Reduced-privilege headless engine for ephemeral, restricted hosts.
    Constrained,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Local
    }
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Some(Environment::Local),
            "CONSTRAINED" => Some(Environment::Constrained),
            _ => None,
        }
    }
}

/// Configuration values for a formrunner run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub env: Environment,
    pub headless: bool,
    pub devtools: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Upper bound for the initial navigation call.
    pub navigation_timeout_ms: u64,
    /// Default bound for click/type actions.
    pub action_timeout_ms: u64,
    /// Default bound for bare selector waits.
    pub wait_timeout_ms: u64,
    /// Inter-character delay when typing, to emulate real input.
    pub type_delay_ms: u64,
    /// Readiness probe attempts issued by the retrying navigator.
    pub max_probe_attempts: u32,
    /// Sleep between readiness probes, before the page reload.
    pub probe_backoff_ms: u64,
    /// Selector whose presence marks the page as ready.
    pub probe_selector: String,
    pub screenshot_dir: PathBuf,
    /// Encode screenshots inline instead of writing files. Always true for
    /// the constrained environment, which has no writable persistent storage.
    pub inline_screenshots: bool,
    /// Maximum number of driver-issued tool calls per run.
    pub max_turns: u32,
    /// Wall-clock budget for the whole run.
    pub run_budget_ms: u64,
    pub chrome_executable: Option<PathBuf>,
    /// Extra engine arguments appended to the variant's launch plan.
    pub extra_args: Vec<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            env: Environment::default(),
            headless: true,
            devtools: false,
            viewport_width: 1280,
            viewport_height: 720,
            navigation_timeout_ms: 45_000,
            action_timeout_ms: 10_000,
            wait_timeout_ms: 15_000,
            type_delay_ms: 100,
            max_probe_attempts: 3,
            probe_backoff_ms: 5_000,
            probe_selector: "#firstName".to_string(),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            inline_screenshots: false,
            max_turns: 20,
            run_budget_ms: 120_000,
            chrome_executable: None,
            extra_args: Vec::new(),
        }
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {variable}")]
    InvalidValue {
        variable: &'static str,
        value: String,
    },
    #[error("failed to parse {variable} as an integer: {source}")]
    InvalidInteger {
        variable: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}

impl ConfigError {
    fn invalid(variable: &'static str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            variable,
            value: value.into(),
        }
    }
}

impl RunnerConfig {
    /// Construct a configuration by reading relevant environment variables,
    /// after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = RunnerConfig::default();

        if let Some(value) = env_var("FORMRUNNER_ENV") {
            config.env = Environment::parse(&value)
                .ok_or_else(|| ConfigError::invalid("FORMRUNNER_ENV", value.clone()))?;
        }

        // Honour the serverless host's own discriminator as a fallback.
        if env_var("FORMRUNNER_CONSTRAINED")
            .map(|v| truthy(&v))
            .unwrap_or(false)
            || env_var("VERCEL").as_deref() == Some("1")
        {
            config.env = Environment::Constrained;
        }

        if let Some(value) = env_var("FORMRUNNER_HEADLESS") {
            config.headless = parse_bool("FORMRUNNER_HEADLESS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_DEVTOOLS") {
            config.devtools = parse_bool("FORMRUNNER_DEVTOOLS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_VIEWPORT_WIDTH") {
            config.viewport_width = parse_u32("FORMRUNNER_VIEWPORT_WIDTH", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_VIEWPORT_HEIGHT") {
            config.viewport_height = parse_u32("FORMRUNNER_VIEWPORT_HEIGHT", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_NAVIGATION_TIMEOUT_MS") {
            config.navigation_timeout_ms = parse_u64("FORMRUNNER_NAVIGATION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_ACTION_TIMEOUT_MS") {
            config.action_timeout_ms = parse_u64("FORMRUNNER_ACTION_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_WAIT_TIMEOUT_MS") {
            config.wait_timeout_ms = parse_u64("FORMRUNNER_WAIT_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_PROBE_SELECTOR") {
            config.probe_selector = value;
        }

        if let Some(value) = env_var("FORMRUNNER_SCREENSHOT_DIR") {
            config.screenshot_dir = PathBuf::from(value);
        }

        if let Some(value) = env_var("FORMRUNNER_INLINE_SCREENSHOTS") {
            config.inline_screenshots = parse_bool("FORMRUNNER_INLINE_SCREENSHOTS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_MAX_TURNS") {
            config.max_turns = parse_u32("FORMRUNNER_MAX_TURNS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_RUN_BUDGET_MS") {
            config.run_budget_ms = parse_u64("FORMRUNNER_RUN_BUDGET_MS", &value)?;
        }

        if let Some(value) = env_var("FORMRUNNER_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        config.normalise();
        Ok(config)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: RunnerConfigOverrides) -> RunnerConfig {
        let mut next = self.clone();

        if let Some(env) = overrides.env {
            next.env = env;
        }
        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.devtools {
            next.devtools = value;
        }
        if let Some((width, height)) = overrides.viewport {
            next.viewport_width = width;
            next.viewport_height = height;
        }
        if let Some(value) = overrides.navigation_timeout_ms {
            next.navigation_timeout_ms = value;
        }
        if let Some(value) = overrides.action_timeout_ms {
            next.action_timeout_ms = value;
        }
        if let Some(value) = overrides.wait_timeout_ms {
            next.wait_timeout_ms = value;
        }
        if let Some(value) = overrides.type_delay_ms {
            next.type_delay_ms = value;
        }
        if let Some(value) = overrides.max_probe_attempts {
            next.max_probe_attempts = value;
        }
        if let Some(value) = overrides.probe_backoff_ms {
            next.probe_backoff_ms = value;
        }
        if let Some(value) = overrides.probe_selector {
            next.probe_selector = value;
        }
        if let Some(value) = overrides.screenshot_dir {
            next.screenshot_dir = value;
        }
        if let Some(value) = overrides.inline_screenshots {
            next.inline_screenshots = value;
        }
        if let Some(value) = overrides.max_turns {
            next.max_turns = value;
        }
        if let Some(value) = overrides.run_budget_ms {
            next.run_budget_ms = value;
        }
        if let Some(value) = overrides.chrome_executable {
            next.chrome_executable = value;
        }
        if let Some(value) = overrides.extra_args {
            next.extra_args = value;
        }

        next.normalise();
        next
    }

    /// The constrained variant is headless-only and cannot assume a writable
    /// filesystem, so those fields are forced rather than trusted.
    fn normalise(&mut self) {
        if self.env == Environment::Constrained {
            self.headless = true;
            self.devtools = false;
            self.inline_screenshots = true;
        }
    }
}

/// Field-level overrides for [`RunnerConfig::with_overrides`].
#[derive(Debug, Default, Clone)]
pub struct RunnerConfigOverrides {
    pub env: Option<Environment>,
    pub headless: Option<bool>,
    pub devtools: Option<bool>,
    pub viewport: Option<(u32, u32)>,
    pub navigation_timeout_ms: Option<u64>,
    pub action_timeout_ms: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
    pub type_delay_ms: Option<u64>,
    pub max_probe_attempts: Option<u32>,
    pub probe_backoff_ms: Option<u64>,
    pub probe_selector: Option<String>,
    pub screenshot_dir: Option<PathBuf>,
    pub inline_screenshots: Option<bool>,
    pub max_turns: Option<u32>,
    pub run_budget_ms: Option<u64>,
    pub chrome_executable: Option<Option<PathBuf>>,
    pub extra_args: Option<Vec<String>>,
}

fn env_var(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(variable, value)),
    }
}

fn parse_u32(variable: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|source| ConfigError::InvalidInteger { variable, source })
}

fn parse_u64(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidInteger { variable, source })
}
