//! Driver interface: who decides the next tool call.
//!
//! The runner is deliberately agnostic about where decisions come from. A
//! driver sees the report of its previous step and answers with either another
//! tool call or a finish. The bundled [`ScriptedDriver`] replays a fixed step
//! list and is what the CLI and tests use; an LLM-backed driver implements the
//! same trait externally.

use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::CredentialSet;
use crate::tools::ToolCall;

/// What the driver learns about its previous step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub name: String,
    pub success: bool,
    pub detail: String,
}

/// A driver's answer: act again, or stop.
#[derive(Debug, Clone)]
pub enum DriverDecision {
    Invoke(ToolCall),
    Finish { summary: String },
}

#[async_trait]
pub trait Driver: Send {
    /// Decide the next step. `last` is `None` on the first call of a run.
    async fn next_step(&mut self, last: Option<&StepReport>) -> DriverDecision;
}

/// Replays a fixed sequence of tool calls, ignoring step outcomes.
///
/// Failed steps do not stop the script; the final report captures which steps
/// failed, which is exactly what a smoke run wants.
pub struct ScriptedDriver {
    steps: std::vec::IntoIter<ToolCall>,
    issued: usize,
    total: usize,
    failures: usize,
}

impl ScriptedDriver {
    pub fn new(steps: Vec<ToolCall>) -> Self {
        let total = steps.len();
        ScriptedDriver {
            steps: steps.into_iter(),
            issued: 0,
            total,
            failures: 0,
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn next_step(&mut self, last: Option<&StepReport>) -> DriverDecision {
        if let Some(report) = last {
            if !report.success {
                self.failures += 1;
            }
        }

        match self.steps.next() {
            Some(call) => {
                self.issued += 1;
                DriverDecision::Invoke(call)
            }
            None => DriverDecision::Finish {
                summary: if self.failures == 0 {
                    format!("completed all {} scripted steps", self.total)
                } else {
                    format!(
                        "completed {} scripted steps with {} failures",
                        self.issued, self.failures
                    )
                },
            },
        }
    }
}

/// The canonical scripted signup flow against a standard registration form.
pub fn signup_flow(url: &str, credentials: &CredentialSet) -> Vec<ToolCall> {
    vec![
        ToolCall::OpenUrl {
            url: url.to_string(),
        },
        ToolCall::TakeScreenshot {
            step: "signup form loaded".to_string(),
            full_page: false,
        },
        ToolCall::TypeText {
            selector: "#firstName".to_string(),
            text: credentials.first_name.clone(),
            timeout_ms: None,
        },
        ToolCall::TypeText {
            selector: "#lastName".to_string(),
            text: credentials.last_name.clone(),
            timeout_ms: None,
        },
        ToolCall::TypeText {
            selector: "#email".to_string(),
            text: credentials.email.clone(),
            timeout_ms: None,
        },
        ToolCall::TypeText {
            selector: "#password".to_string(),
            text: credentials.password.clone(),
            timeout_ms: None,
        },
        ToolCall::TypeText {
            selector: "#confirmPassword".to_string(),
            text: credentials.confirm_password.clone(),
            timeout_ms: None,
        },
        ToolCall::TakeScreenshot {
            step: "form filled".to_string(),
            full_page: false,
        },
        ToolCall::Click {
            selector: "button[type=\"submit\"]".to_string(),
            timeout_ms: None,
        },
        ToolCall::TakeScreenshot {
            step: "submitted".to_string(),
            full_page: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_credentials() -> CredentialSet {
        CredentialSet {
            first_name: "Ava".to_string(),
            last_name: "Harper".to_string(),
            email: "ava.harper123@example.com".to_string(),
            password: "s3curePass9!".to_string(),
            confirm_password: "s3curePass9!".to_string(),
        }
    }

    #[tokio::test]
    async fn scripted_driver_replays_steps_then_finishes() {
        let steps = signup_flow("https://example.com/signup", &fixture_credentials());
        let total = steps.len();
        let mut driver = ScriptedDriver::new(steps);

        let mut last: Option<StepReport> = None;
        let mut issued = 0;
        loop {
            match driver.next_step(last.as_ref()).await {
                DriverDecision::Invoke(call) => {
                    issued += 1;
                    last = Some(StepReport {
                        name: call.name().to_string(),
                        success: true,
                        detail: String::new(),
                    });
                }
                DriverDecision::Finish { summary } => {
                    assert!(summary.contains("all"), "summary was: {summary}");
                    break;
                }
            }
        }
        assert_eq!(issued, total);
    }

    #[tokio::test]
    async fn scripted_driver_reports_failures_in_the_summary() {
        let mut driver = ScriptedDriver::new(vec![ToolCall::Click {
            selector: "#missing".to_string(),
            timeout_ms: None,
        }]);

        let DriverDecision::Invoke(call) = driver.next_step(None).await else {
            panic!("expected a step");
        };
        let report = StepReport {
            name: call.name().to_string(),
            success: false,
            detail: "element did not appear".to_string(),
        };
        let DriverDecision::Finish { summary } = driver.next_step(Some(&report)).await else {
            panic!("expected a finish");
        };
        assert!(summary.contains("1 failures"), "summary was: {summary}");
    }

    #[test]
    fn signup_flow_covers_every_form_field() {
        let steps = signup_flow("https://example.com/signup", &fixture_credentials());
        assert_eq!(steps.len(), 10);

        let typed_selectors: Vec<&str> = steps
            .iter()
            .filter_map(|s| match s {
                ToolCall::TypeText { selector, .. } => Some(selector.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            typed_selectors,
            vec![
                "#firstName",
                "#lastName",
                "#email",
                "#password",
                "#confirmPassword"
            ]
        );

        let screenshots = steps
            .iter()
            .filter(|s| matches!(s, ToolCall::TakeScreenshot { .. }))
            .count();
        assert_eq!(screenshots, 3);
    }
}
