//! Agent-invocable tool surface.
//!
//! The tool set is a closed enum: five atomic operations with typed,
//! serde-validated argument schemas. Dispatch records a [`ToolInvocation`] for
//! every call, successful or not, before control returns to the driver, so the
//! run trace is complete even when a tool fails.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::browser::BrowserEngine;
use crate::navigator::{self, NavigationOutcome, RetryPolicy};
use crate::runlog::{InvocationResult, RunLog, ToolInvocation};
use crate::screenshot::ScreenshotSink;
use crate::session::{ActionError, Session};

/// One atomic tool call with validated arguments.
///
/// Wire argument names are camelCase (`timeoutMs`, `fullPage`); snake_case
/// spellings are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    /// Navigate to a URL with readiness probing.
    OpenUrl { url: String },
    /// Wait for an element, then click it.
    #[serde(rename_all = "camelCase")]
    Click {
        selector: String,
        #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Wait for an element, then enter text character by character.
    #[serde(rename_all = "camelCase")]
    TypeText {
        selector: String,
        text: String,
        #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Wait for an element to appear without interacting.
    #[serde(rename_all = "camelCase")]
    WaitFor {
        selector: String,
        #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Capture the page and store it via the run's screenshot sink.
    #[serde(rename_all = "camelCase")]
    TakeScreenshot {
        step: String,
        #[serde(default, alias = "full_page")]
        full_page: bool,
    },
}

impl ToolCall {
    /// Wire name of the tool, as a driver addresses it.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::OpenUrl { .. } => "open_url",
            ToolCall::Click { .. } => "click",
            ToolCall::TypeText { .. } => "type_text",
            ToolCall::WaitFor { .. } => "wait_for",
            ToolCall::TakeScreenshot { .. } => "take_screenshot",
        }
    }

    /// Argument payload for trace recording. Passwords appear here by design;
    /// the values are synthetic.
    pub fn arguments(&self) -> JsonValue {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map
                .get("arguments")
                .cloned()
                .unwrap_or(JsonValue::Object(Default::default())),
            _ => JsonValue::Object(Default::default()),
        }
    }

    /// Validate a raw `(name, arguments)` pair into a typed call.
    pub fn parse(name: &str, arguments: JsonValue) -> Result<ToolCall, ToolError> {
        let known = matches!(
            name,
            "open_url" | "click" | "type_text" | "wait_for" | "take_screenshot"
        );
        if !known {
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        }

        let envelope = serde_json::json!({ "name": name, "arguments": arguments });
        serde_json::from_value(envelope).map_err(|err| ToolError::InvalidArguments {
            name: name.to_string(),
            message: err.to_string(),
        })
    }
}

/// Errors a tool call can surface to the driver.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments { name: String, message: String },
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// What a successful tool call tells the driver.
#[derive(Debug, Clone)]
pub enum ToolReply {
    Navigated(NavigationOutcome),
    Clicked { selector: String },
    Typed { selector: String, chars: usize },
    ElementReady { selector: String },
    ScreenshotStored { step: String, location: String },
    /// Capture or storage failed; reported as text rather than an error so a
    /// failed screenshot never sinks the run.
    ScreenshotFailed { step: String, reason: String },
}

impl ToolReply {
    pub fn render(&self) -> String {
        match self {
            ToolReply::Navigated(outcome) => {
                if outcome.form_detected {
                    format!(
                        "opened {} (title: {:?}); signup form detected",
                        outcome.final_url, outcome.title
                    )
                } else {
                    format!(
                        "opened {} (title: {:?}); signup form NOT detected after {} probes; the page may be a challenge or an unexpected layout",
                        outcome.final_url, outcome.title, outcome.probe_attempts
                    )
                }
            }
            ToolReply::Clicked { selector } => format!("clicked {selector}"),
            ToolReply::Typed { selector, chars } => {
                format!("typed {chars} characters into {selector}")
            }
            ToolReply::ElementReady { selector } => format!("element present: {selector}"),
            ToolReply::ScreenshotStored { step, location } => {
                format!("screenshot '{step}' stored at {location}")
            }
            ToolReply::ScreenshotFailed { step, reason } => {
                format!("screenshot '{step}' failed: {reason}")
            }
        }
    }

    /// Screenshot failures travel as replies, not errors, so they count as
    /// unsuccessful here.
    pub fn succeeded(&self) -> bool {
        !matches!(self, ToolReply::ScreenshotFailed { .. })
    }
}

/// Everything a tool call needs from the surrounding run.
pub struct ToolContext<'a, E: BrowserEngine> {
    pub session: &'a Session<E>,
    pub sink: &'a mut ScreenshotSink,
    pub log: &'a mut RunLog,
    pub retry: &'a RetryPolicy,
}

/// Execute one tool call, recording its invocation in the run log regardless
/// of outcome.
pub async fn execute<E: BrowserEngine>(
    ctx: &mut ToolContext<'_, E>,
    call: &ToolCall,
) -> Result<ToolReply, ToolError> {
    let started_at = Utc::now();
    let started = std::time::Instant::now();

    let outcome = dispatch(ctx, call).await;

    let (result, detail) = match &outcome {
        Ok(reply) if reply.succeeded() => (InvocationResult::Ok, reply.render()),
        Ok(reply) => (InvocationResult::Failed, reply.render()),
        Err(err) => (InvocationResult::Failed, err.to_string()),
    };

    ctx.log.record_invocation(ToolInvocation {
        name: call.name().to_string(),
        arguments: call.arguments(),
        started_at,
        duration_ms: started.elapsed().as_millis() as u64,
        result,
        detail,
    });

    outcome
}

async fn dispatch<E: BrowserEngine>(
    ctx: &mut ToolContext<'_, E>,
    call: &ToolCall,
) -> Result<ToolReply, ToolError> {
    match call {
        ToolCall::OpenUrl { url } => {
            let outcome = navigator::navigate(ctx.session, url, ctx.retry, ctx.log).await?;
            Ok(ToolReply::Navigated(outcome))
        }
        ToolCall::Click {
            selector,
            timeout_ms,
        } => {
            let bound = timeout_ms.map(Duration::from_millis);
            ctx.session.click(selector, bound).await?;
            ctx.log.info(format!("clicked {selector}"));
            Ok(ToolReply::Clicked {
                selector: selector.clone(),
            })
        }
        ToolCall::TypeText {
            selector,
            text,
            timeout_ms,
        } => {
            let bound = timeout_ms.map(Duration::from_millis);
            ctx.session.type_text(selector, text, bound).await?;
            ctx.log
                .info(format!("typed {} characters into {selector}", text.chars().count()));
            Ok(ToolReply::Typed {
                selector: selector.clone(),
                chars: text.chars().count(),
            })
        }
        ToolCall::WaitFor {
            selector,
            timeout_ms,
        } => {
            let bound = timeout_ms.map(Duration::from_millis);
            ctx.session
                .wait_for(selector, Some(bound.unwrap_or(ctx.session.default_wait_timeout())))
                .await?;
            Ok(ToolReply::ElementReady {
                selector: selector.clone(),
            })
        }
        ToolCall::TakeScreenshot { step, full_page } => {
            let png = match ctx.session.capture(*full_page).await {
                Ok(png) => png,
                Err(err) => {
                    ctx.log.warn(format!("screenshot '{step}' capture failed: {err}"));
                    return Ok(ToolReply::ScreenshotFailed {
                        step: step.clone(),
                        reason: err.to_string(),
                    });
                }
            };

            match ctx.sink.store(step, png).await {
                Ok(artifact) => {
                    let location = artifact.location();
                    ctx.log.info(format!("screenshot '{step}' stored at {location}"));
                    Ok(ToolReply::ScreenshotStored {
                        step: step.clone(),
                        location,
                    })
                }
                Err(err) => {
                    ctx.log.warn(format!("screenshot '{step}' store failed: {err}"));
                    Ok(ToolReply::ScreenshotFailed {
                        step: step.clone(),
                        reason: err.to_string(),
                    })
                }
            }
        }
    }
}
