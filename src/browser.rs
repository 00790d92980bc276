//! Browser engine strategy for formrunner.
//!
//! This module transforms the high-level configuration into a strongly-typed
//! launch plan for one of two engine variants: a full-featured local engine or
//! a reduced-privilege engine suitable for constrained serverless hosts. Both
//! variants sit behind the [`BrowserEngine`] trait so nothing above the
//! session layer ever branches on which one is active.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Environment, RunnerConfig};

/// Which engine variant a run executed with. Reported in telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Local,
    Constrained,
}

impl From<Environment> for EngineKind {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Local => EngineKind::Local,
            Environment::Constrained => EngineKind::Constrained,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Local => f.write_str("local"),
            EngineKind::Constrained => f.write_str("constrained"),
        }
    }
}

/// Viewport dimensions applied to the run's single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280,
            height: 720,
        }
    }
}

/// Normalised launch plan derived from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub kind: EngineKind,
    pub headless: bool,
    pub devtools: bool,
    pub viewport: Viewport,
    pub args: Vec<String>,
    pub ignore_https_errors: bool,
    pub chrome_executable: Option<PathBuf>,
}

impl LaunchPlan {
    /// Build the launch plan for the configured environment.
    pub fn from_config(config: &RunnerConfig) -> Self {
        let kind = EngineKind::from(config.env);
        let viewport = Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
        };

        let mut args = match kind {
            EngineKind::Local => vec![
                "--disable-extensions".to_string(),
                "--disable-file-system".to_string(),
            ],
            EngineKind::Constrained => vec![
                "--no-sandbox".to_string(),
                "--single-process".to_string(),
                "--disable-gpu".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        };
        args.extend(config.extra_args.iter().cloned());

        let headless = match kind {
            EngineKind::Local => config.headless,
            // Never headful on a restricted host.
            EngineKind::Constrained => true,
        };

        LaunchPlan {
            kind,
            headless,
            devtools: config.devtools && kind == EngineKind::Local,
            viewport,
            args,
            ignore_https_errors: kind == EngineKind::Constrained,
            chrome_executable: config.chrome_executable.clone(),
        }
    }
}

/// Error surfaced when the engine fails to start. Fatal for the run; it is
/// never retried at this layer.
#[derive(Debug, Error)]
#[error("browser engine failed to launch: {message}")]
pub struct LaunchError {
    pub message: String,
}

impl LaunchError {
    pub fn new(message: impl Into<String>) -> Self {
        LaunchError {
            message: message.into(),
        }
    }
}

/// Errors surfaced by engine operations after a successful launch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("browser engine error: {0}")]
    Message(String),
    #[error("browser engine not launched")]
    NotLaunched,
    #[error("element not present: {selector}")]
    MissingElement { selector: String },
}

impl EngineError {
    pub fn message(err: impl fmt::Display) -> Self {
        EngineError::Message(err.to_string())
    }
}

/// Uniform operation set both engine variants expose.
///
/// The trait owns exactly one browser instance and one page for the lifetime
/// of a run; `launch` is called once, `close` releases the browser. Timeouts
/// are applied by the caller ([`Session`](crate::session::Session)), not here.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError>;

    async fn goto(&self, url: &str) -> Result<(), EngineError>;

    async fn reload(&self) -> Result<(), EngineError>;

    async fn title(&self) -> Result<String, EngineError>;

    async fn current_url(&self) -> Result<String, EngineError>;

    /// Pure existence check for a selector; never waits.
    async fn selector_exists(&self, selector: &str) -> Result<bool, EngineError>;

    async fn click(&self, selector: &str) -> Result<(), EngineError>;

    /// Focused character-by-character entry with an inter-character delay.
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), EngineError>;

    /// Capture the current frame as PNG bytes.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Shared engine handles expose the same operation set as the engine itself.
#[async_trait]
impl<T: BrowserEngine> BrowserEngine for std::sync::Arc<T> {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError> {
        (**self).launch(plan).await
    }

    async fn goto(&self, url: &str) -> Result<(), EngineError> {
        (**self).goto(url).await
    }

    async fn reload(&self) -> Result<(), EngineError> {
        (**self).reload().await
    }

    async fn title(&self) -> Result<String, EngineError> {
        (**self).title().await
    }

    async fn current_url(&self) -> Result<String, EngineError> {
        (**self).current_url().await
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool, EngineError> {
        (**self).selector_exists(selector).await
    }

    async fn click(&self, selector: &str) -> Result<(), EngineError> {
        (**self).click(selector).await
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), EngineError> {
        (**self).type_text(selector, text, delay).await
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, EngineError> {
        (**self).screenshot(full_page).await
    }

    async fn close(&self) -> Result<(), EngineError> {
        (**self).close().await
    }
}
