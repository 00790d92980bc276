//! Run-scoped append-only log and tool invocation trace.
//!
//! Every run owns exactly one [`RunLog`]; entries are timestamped in order of
//! appearance and the whole record is returned to the caller with the final
//! report. Appending never fails and never blocks the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::browser::EngineKind;

/// Severity attached to a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One timestamped line in the run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Outcome of a single recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationResult {
    Ok,
    Failed,
}

/// Trace record for one tool call, appended whether the call succeeded or
/// failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: JsonValue,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub result: InvocationResult,
    /// Human-readable reply or failure detail the driver saw.
    pub detail: String,
}

/// Ordered record of everything that happened during one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogSnapshot {
    pub engine: EngineKind,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<RunLogEntry>,
    pub invocations: Vec<ToolInvocation>,
}

#[derive(Debug)]
pub struct RunLog {
    engine: EngineKind,
    started_at: DateTime<Utc>,
    entries: Vec<RunLogEntry>,
    invocations: Vec<ToolInvocation>,
}

impl RunLog {
    pub fn new(engine: EngineKind) -> Self {
        RunLog {
            engine,
            started_at: Utc::now(),
            entries: Vec::new(),
            invocations: Vec::new(),
        }
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn append(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => log::debug!("{message}"),
            LogLevel::Info => log::info!("{message}"),
            LogLevel::Warn => log::warn!("{message}"),
            LogLevel::Error => log::error!("{message}"),
        }
        self.entries.push(RunLogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.append(LogLevel::Error, message);
    }

    pub fn record_invocation(&mut self, invocation: ToolInvocation) {
        self.invocations.push(invocation);
    }

    pub fn entries(&self) -> &[RunLogEntry] {
        &self.entries
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Serializable copy of the full record, in append order.
    pub fn snapshot(&self) -> RunLogSnapshot {
        RunLogSnapshot {
            engine: self.engine,
            started_at: self.started_at,
            entries: self.entries.clone(),
            invocations: self.invocations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_keep_append_order() {
        let mut log = RunLog::new(EngineKind::Local);
        log.info("navigating");
        log.warn("probe missed");
        log.info("probe hit");

        let messages: Vec<&str> = log.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["navigating", "probe missed", "probe hit"]);
        assert_eq!(log.entries()[1].level, LogLevel::Warn);
    }

    #[test]
    fn invocations_record_failures_too() {
        let mut log = RunLog::new(EngineKind::Constrained);
        log.record_invocation(ToolInvocation {
            name: "click".to_string(),
            arguments: json!({ "selector": "#submit" }),
            started_at: Utc::now(),
            duration_ms: 12,
            result: InvocationResult::Failed,
            detail: "element not present: #submit".to_string(),
        });

        let snapshot = log.snapshot();
        assert_eq!(snapshot.engine, EngineKind::Constrained);
        assert_eq!(snapshot.invocations.len(), 1);
        assert_eq!(snapshot.invocations[0].result, InvocationResult::Failed);
    }

    #[test]
    fn snapshot_serializes_to_camel_case() {
        let mut log = RunLog::new(EngineKind::Local);
        log.info("hello");
        let value = serde_json::to_value(log.snapshot()).unwrap();
        assert!(value.get("startedAt").is_some());
        assert_eq!(value["entries"][0]["message"], "hello");
    }
}
