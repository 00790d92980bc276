//! Run boundary: launch, drive, and tear down one signup run.
//!
//! [`Runner::execute`] owns the whole lifecycle. It never returns an error and
//! never panics; every outcome, including a failed launch or an exhausted
//! budget, is expressed as a [`RunReport`] carrying the full log and whatever
//! artifacts were produced. The browser is released exactly once on every
//! path, and a teardown failure is logged rather than allowed to mask the
//! run's real outcome.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::browser::{BrowserEngine, EngineKind};
use crate::config::RunnerConfig;
use crate::credentials::CredentialSet;
use crate::driver::{Driver, DriverDecision, StepReport};
use crate::navigator::RetryPolicy;
use crate::runlog::{RunLog, RunLogSnapshot};
use crate::screenshot::{ScreenshotArtifact, ScreenshotSink, ScreenshotStrategy};
use crate::session::Session;
use crate::tools::{self, ToolContext};

/// Final report of one run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    pub engine: EngineKind,
    pub credentials: CredentialSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub turns_used: u32,
    pub screenshots: Vec<ScreenshotArtifact>,
    pub log: RunLogSnapshot,
}

pub struct Runner<E: BrowserEngine> {
    config: RunnerConfig,
    engine: E,
}

/// How the driver loop ended.
enum LoopEnd {
    Finished { summary: String },
    TurnsExhausted,
    BudgetExhausted,
}

impl<E: BrowserEngine> Runner<E> {
    pub fn new(config: RunnerConfig, engine: E) -> Self {
        Runner { config, engine }
    }

    /// Run `driver` to completion against a fresh browser session.
    pub async fn execute(self, mut driver: impl Driver, credentials: CredentialSet) -> RunReport {
        let engine_kind = EngineKind::from(self.config.env);
        let mut log = RunLog::new(engine_kind);
        log.info(format!("starting run on {engine_kind} engine"));

        let session = match Session::launch(&self.config, self.engine).await {
            Ok(session) => session,
            Err(err) => {
                log.error(format!("launch failed: {err}"));
                return RunReport {
                    success: false,
                    engine: engine_kind,
                    credentials,
                    summary: None,
                    error: Some(err.to_string()),
                    turns_used: 0,
                    screenshots: Vec::new(),
                    log: log.snapshot(),
                };
            }
        };

        let mut sink = ScreenshotSink::new(ScreenshotStrategy::from_config(&self.config));
        let retry = RetryPolicy::from_config(&self.config);
        let deadline = Instant::now() + Duration::from_millis(self.config.run_budget_ms);

        let mut turns_used = 0;
        let end = drive(
            &mut driver,
            &session,
            &mut sink,
            &mut log,
            &retry,
            self.config.max_turns,
            deadline,
            &mut turns_used,
        )
        .await;

        // Single teardown point for every successful-launch path.
        session.close(&mut log).await;

        let (success, summary, error) = match end {
            LoopEnd::Finished { summary } => {
                log.info(format!("run finished: {summary}"));
                (true, Some(summary), None)
            }
            LoopEnd::TurnsExhausted => {
                let message = format!(
                    "turn budget exhausted after {} tool calls without a finish",
                    turns_used
                );
                log.error(&message);
                (false, None, Some(message))
            }
            LoopEnd::BudgetExhausted => {
                let message = format!(
                    "run budget of {}ms exhausted without a finish",
                    self.config.run_budget_ms
                );
                log.error(&message);
                (false, None, Some(message))
            }
        };

        RunReport {
            success,
            engine: engine_kind,
            credentials,
            summary,
            error,
            turns_used,
            screenshots: sink.into_artifacts(),
            log: log.snapshot(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive<E: BrowserEngine>(
    driver: &mut impl Driver,
    session: &Session<E>,
    sink: &mut ScreenshotSink,
    log: &mut RunLog,
    retry: &RetryPolicy,
    max_turns: u32,
    deadline: Instant,
    turns_used: &mut u32,
) -> LoopEnd {
    let mut last: Option<StepReport> = None;

    loop {
        match driver.next_step(last.as_ref()).await {
            DriverDecision::Finish { summary } => return LoopEnd::Finished { summary },
            DriverDecision::Invoke(call) => {
                if *turns_used >= max_turns {
                    return LoopEnd::TurnsExhausted;
                }
                if Instant::now() >= deadline {
                    return LoopEnd::BudgetExhausted;
                }
                *turns_used += 1;

                let mut ctx = ToolContext {
                    session,
                    sink: &mut *sink,
                    log: &mut *log,
                    retry,
                };
                let report = match tools::execute(&mut ctx, &call).await {
                    Ok(reply) => StepReport {
                        name: call.name().to_string(),
                        success: reply.succeeded(),
                        detail: reply.render(),
                    },
                    Err(err) => {
                        log.warn(format!("tool {} failed: {err}", call.name()));
                        StepReport {
                            name: call.name().to_string(),
                            success: false,
                            detail: err.to_string(),
                        }
                    }
                };
                last = Some(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{EngineError, LaunchError, LaunchPlan};
    use crate::config::RunnerConfigOverrides;
    use crate::driver::ScriptedDriver;
    use crate::tools::ToolCall;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FailingLauncher;

    #[async_trait]
    impl BrowserEngine for FailingLauncher {
        async fn launch(&self, _plan: &LaunchPlan) -> Result<(), LaunchError> {
            Err(LaunchError::new("no chrome binary"))
        }

        async fn goto(&self, _url: &str) -> Result<(), EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn reload(&self) -> Result<(), EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn title(&self) -> Result<String, EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn current_url(&self) -> Result<String, EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn selector_exists(&self, _selector: &str) -> Result<bool, EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn click(&self, _selector: &str) -> Result<(), EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn type_text(
            &self,
            _selector: &str,
            _text: &str,
            _delay: Duration,
        ) -> Result<(), EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, EngineError> {
            Err(EngineError::NotLaunched)
        }

        async fn close(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    /// Minimal always-succeeding engine that counts close calls.
    struct QuietEngine {
        closes: AtomicU32,
    }

    #[async_trait]
    impl BrowserEngine for QuietEngine {
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
            Ok(true)
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
            Ok(vec![1, 2, 3])
        }

        async fn close(&self) -> Result<(), EngineError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn inline_config() -> RunnerConfig {
        RunnerConfig::default().with_overrides(RunnerConfigOverrides {
            inline_screenshots: Some(true),
            type_delay_ms: Some(0),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn launch_failure_reports_without_panicking() {
        let runner = Runner::new(RunnerConfig::default(), FailingLauncher);
        let driver = ScriptedDriver::new(vec![]);
        let report = runner.execute(driver, CredentialSet::generate()).await;

        assert!(!report.success);
        assert_eq!(report.turns_used, 0);
        assert!(report.error.as_deref().unwrap().contains("no chrome binary"));
        assert!(report.screenshots.is_empty());
        assert!(!report.log.entries.is_empty());
    }

    #[tokio::test]
    async fn turn_budget_cuts_off_an_endless_driver() {
        struct EndlessDriver;

        #[async_trait]
        impl Driver for EndlessDriver {
            async fn next_step(&mut self, _last: Option<&StepReport>) -> DriverDecision {
                DriverDecision::Invoke(ToolCall::WaitFor {
                    selector: "#anything".to_string(),
                    timeout_ms: Some(10),
                })
            }
        }

        let config = inline_config().with_overrides(RunnerConfigOverrides {
            max_turns: Some(4),
            ..Default::default()
        });
        let engine = Arc::new(QuietEngine {
            closes: AtomicU32::new(0),
        });
        let runner = Runner::new(config, engine.clone());
        let report = runner.execute(EndlessDriver, CredentialSet::generate()).await;

        assert!(!report.success);
        assert_eq!(report.turns_used, 4);
        assert!(report.error.as_deref().unwrap().contains("turn budget"));
        assert_eq!(engine.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_run_tears_down_exactly_once() {
        let engine = Arc::new(QuietEngine {
            closes: AtomicU32::new(0),
        });
        let runner = Runner::new(inline_config(), engine.clone());
        let credentials = CredentialSet::generate();
        let driver = ScriptedDriver::new(crate::driver::signup_flow(
            "https://example.com/signup",
            &credentials,
        ));

        let report = runner.execute(driver, credentials).await;

        assert!(report.success);
        assert_eq!(report.turns_used, 10);
        assert_eq!(report.screenshots.len(), 3);
        assert_eq!(report.log.invocations.len(), 10);
        assert_eq!(engine.closes.load(Ordering::SeqCst), 1);
    }
}
