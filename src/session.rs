//! Run-exclusive browser session.
//!
//! A [`Session`] wraps a launched [`BrowserEngine`] and applies the
//! configuration's bounded timeouts to every primitive, so no tool call can
//! hang a run indefinitely. The session owns the engine for the whole run;
//! [`Session::close`] releases it and reports (but never raises) cleanup
//! failures.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};

use crate::browser::{BrowserEngine, EngineError, EngineKind, LaunchError, LaunchPlan, Viewport};
use crate::config::RunnerConfig;
use crate::runlog::RunLog;

/// Interval between selector existence probes inside a bounded wait.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors surfaced by bounded session operations.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("element did not appear within {elapsed_ms}ms: {selector}")]
    ElementNotFound { selector: String, elapsed_ms: u64 },
    #[error("{operation} timed out after {timeout_ms}ms")]
    ActionTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub struct Session<E: BrowserEngine> {
    engine: E,
    kind: EngineKind,
    viewport: Viewport,
    navigation_timeout: Duration,
    action_timeout: Duration,
    wait_timeout: Duration,
    type_delay: Duration,
}

impl<E: BrowserEngine> Session<E> {
    /// Launch the engine with the plan derived from `config` and wrap it in a
    /// session. On launch failure the engine is left untouched and the error
    /// is fatal for the run.
    pub async fn launch(config: &RunnerConfig, engine: E) -> Result<Self, LaunchError> {
        let plan = LaunchPlan::from_config(config);
        engine.launch(&plan).await?;

        Ok(Session {
            engine,
            kind: plan.kind,
            viewport: plan.viewport,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            action_timeout: Duration::from_millis(config.action_timeout_ms),
            wait_timeout: Duration::from_millis(config.wait_timeout_ms),
            type_delay: Duration::from_millis(config.type_delay_ms),
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn default_action_timeout(&self) -> Duration {
        self.action_timeout
    }

    pub fn default_wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Navigate within the navigation budget. The URL is echoed in the error
    /// so failures are actionable without the log.
    pub async fn navigate(&self, url: &str) -> Result<(), ActionError> {
        match timeout(self.navigation_timeout, self.engine.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ActionError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            }),
            Err(_) => Err(ActionError::Navigation {
                url: url.to_string(),
                reason: format!(
                    "timed out after {}ms",
                    self.navigation_timeout.as_millis()
                ),
            }),
        }
    }

    pub async fn reload(&self) -> Result<(), ActionError> {
        match timeout(self.navigation_timeout, self.engine.reload()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ActionError::ActionTimeout {
                operation: "reload",
                timeout_ms: self.navigation_timeout.as_millis() as u64,
            }),
        }
    }

    pub async fn title(&self) -> Result<String, ActionError> {
        Ok(self.engine.title().await?)
    }

    pub async fn current_url(&self) -> Result<String, ActionError> {
        Ok(self.engine.current_url().await?)
    }

    /// Single existence probe, no waiting.
    pub async fn selector_exists(&self, selector: &str) -> Result<bool, ActionError> {
        Ok(self.engine.selector_exists(selector).await?)
    }

    /// Poll until `selector` exists or the bound elapses.
    pub async fn wait_for(
        &self,
        selector: &str,
        bound: Option<Duration>,
    ) -> Result<(), ActionError> {
        let bound = bound.unwrap_or(self.wait_timeout);
        let started = Instant::now();

        loop {
            if self.engine.selector_exists(selector).await? {
                return Ok(());
            }
            if started.elapsed() >= bound {
                return Err(ActionError::ElementNotFound {
                    selector: selector.to_string(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            sleep(WAIT_POLL_INTERVAL.min(bound)).await;
        }
    }

    /// Wait for the element within `bound`, then click it.
    pub async fn click(&self, selector: &str, bound: Option<Duration>) -> Result<(), ActionError> {
        let bound = bound.unwrap_or(self.action_timeout);
        self.wait_for(selector, Some(bound)).await?;

        match timeout(bound, self.engine.click(selector)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ActionError::ActionTimeout {
                operation: "click",
                timeout_ms: bound.as_millis() as u64,
            }),
        }
    }

    /// Wait for the element, then enter `text` character by character with the
    /// configured inter-key delay. The bound covers the wait only; typing time
    /// scales with the text length and is not a hang risk.
    pub async fn type_text(
        &self,
        selector: &str,
        text: &str,
        bound: Option<Duration>,
    ) -> Result<(), ActionError> {
        let bound = bound.unwrap_or(self.action_timeout);
        self.wait_for(selector, Some(bound)).await?;
        Ok(self
            .engine
            .type_text(selector, text, self.type_delay)
            .await?)
    }

    pub async fn capture(&self, full_page: bool) -> Result<Vec<u8>, ActionError> {
        match timeout(self.action_timeout, self.engine.screenshot(full_page)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ActionError::ActionTimeout {
                operation: "screenshot",
                timeout_ms: self.action_timeout.as_millis() as u64,
            }),
        }
    }

    /// Release the engine. Failures are recorded in the run log but never
    /// propagated, so teardown cannot mask an earlier error.
    pub async fn close(self, log: &mut RunLog) {
        if let Err(err) = self.engine.close().await {
            log.warn(format!("browser close failed: {err}"));
        } else {
            log.debug("browser closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Engine whose selector probe succeeds only after a set number of calls.
    struct CountingEngine {
        probes: AtomicU32,
        ready_after: u32,
    }

    #[async_trait]
    impl BrowserEngine for CountingEngine {
        async fn launch(&self, _plan: &LaunchPlan) -> Result<(), LaunchError> {
            Ok(())
        }

        async fn goto(&self, _url: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn reload(&self) -> Result<(), EngineError> {
            Ok(())
        }

        async fn title(&self) -> Result<String, EngineError> {
            Ok("fixture".to_string())
        }

        async fn current_url(&self) -> Result<String, EngineError> {
            Ok("https://example.com/".to_string())
        }

        async fn selector_exists(&self, _selector: &str) -> Result<bool, EngineError> {
            let seen = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(seen >= self.ready_after)
        }

        async fn click(&self, _selector: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn type_text(
            &self,
            _selector: &str,
            _text: &str,
            _delay: Duration,
        ) -> Result<(), EngineError> {
            Ok(())
        }

        async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, EngineError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    async fn fixture_session(ready_after: u32) -> Session<Arc<CountingEngine>> {
        let engine = Arc::new(CountingEngine {
            probes: AtomicU32::new(0),
            ready_after,
        });
        Session::launch(&RunnerConfig::default(), engine)
            .await
            .expect("launch")
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_polls_until_the_selector_appears() {
        let session = fixture_session(3).await;
        session
            .wait_for("#firstName", None)
            .await
            .expect("selector should appear on the third probe");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_times_out_with_selector_and_elapsed() {
        let session = fixture_session(u32::MAX).await;
        let err = session
            .wait_for("#missing", Some(Duration::from_millis(600)))
            .await
            .expect_err("selector never appears");

        match err {
            ActionError::ElementNotFound {
                selector,
                elapsed_ms,
            } => {
                assert_eq!(selector, "#missing");
                assert!(elapsed_ms >= 600);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn click_waits_before_acting() {
        let session = fixture_session(2).await;
        session
            .click("#submit", None)
            .await
            .expect("click should succeed once the selector appears");
    }
}
