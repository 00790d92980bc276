//! Per-run screenshot sink.
//!
//! Captured frames are either written to a run-local directory (local engine)
//! or carried inline as base64 data URIs (constrained engine, which cannot
//! assume writable persistent storage). Either way the sink records one
//! artifact per capture, in capture order, and guarantees distinct locations
//! even when step labels repeat.

use std::collections::HashSet;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::RunnerConfig;

/// Where captured frames go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotStrategy {
    File { dir: PathBuf },
    Inline,
}

impl ScreenshotStrategy {
    pub fn from_config(config: &RunnerConfig) -> Self {
        if config.inline_screenshots {
            ScreenshotStrategy::Inline
        } else {
            ScreenshotStrategy::File {
                dir: config.screenshot_dir.clone(),
            }
        }
    }
}

/// Record of one stored capture. `sequence_index` increases monotonically
/// within a run. Inline artifacts carry the same synthesized filename a file
/// write would have used, for display purposes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ScreenshotArtifact {
    File {
        step: String,
        sequence_index: usize,
        captured_at: chrono::DateTime<Utc>,
        filename: String,
        path: PathBuf,
        bytes: usize,
    },
    Inline {
        step: String,
        sequence_index: usize,
        captured_at: chrono::DateTime<Utc>,
        filename: String,
        data_uri: String,
        bytes: usize,
    },
}

impl ScreenshotArtifact {
    pub fn step(&self) -> &str {
        match self {
            ScreenshotArtifact::File { step, .. } => step,
            ScreenshotArtifact::Inline { step, .. } => step,
        }
    }

    pub fn sequence_index(&self) -> usize {
        match self {
            ScreenshotArtifact::File { sequence_index, .. } => *sequence_index,
            ScreenshotArtifact::Inline { sequence_index, .. } => *sequence_index,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            ScreenshotArtifact::File { filename, .. } => filename,
            ScreenshotArtifact::Inline { filename, .. } => filename,
        }
    }

    /// Display reference for a tool reply. File artifacts under `public/` get
    /// the web-style path the serving layer exposes; inline artifacts are
    /// referred to by their synthesized filename.
    pub fn location(&self) -> String {
        match self {
            ScreenshotArtifact::File { path, .. } => match path.strip_prefix("public") {
                Ok(rest) => format!("/{}", rest.display()),
                Err(_) => path.to_string_lossy().into_owned(),
            },
            ScreenshotArtifact::Inline { filename, .. } => filename.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("failed to create screenshot directory {dir}: {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write screenshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accumulates a run's screenshot artifacts.
pub struct ScreenshotSink {
    strategy: ScreenshotStrategy,
    artifacts: Vec<ScreenshotArtifact>,
    used_names: HashSet<String>,
    dir_ready: bool,
}

impl ScreenshotSink {
    pub fn new(strategy: ScreenshotStrategy) -> Self {
        ScreenshotSink {
            strategy,
            artifacts: Vec::new(),
            used_names: HashSet::new(),
            dir_ready: false,
        }
    }

    pub fn artifacts(&self) -> &[ScreenshotArtifact] {
        &self.artifacts
    }

    pub fn into_artifacts(self) -> Vec<ScreenshotArtifact> {
        self.artifacts
    }

    /// Store one captured PNG under `step` and record the artifact.
    pub async fn store(
        &mut self,
        step: &str,
        png: Vec<u8>,
    ) -> Result<&ScreenshotArtifact, ScreenshotError> {
        let sequence_index = self.artifacts.len();
        let captured_at = Utc::now();
        let filename = self.unique_name(step);
        self.used_names.insert(filename.clone());

        let artifact = match &self.strategy {
            ScreenshotStrategy::Inline => ScreenshotArtifact::Inline {
                step: step.to_string(),
                sequence_index,
                captured_at,
                filename,
                data_uri: format!("data:image/png;base64,{}", BASE64.encode(&png)),
                bytes: png.len(),
            },
            ScreenshotStrategy::File { dir } => {
                let dir = dir.clone();
                if !self.dir_ready {
                    tokio::fs::create_dir_all(&dir)
                        .await
                        .map_err(|source| ScreenshotError::CreateDir {
                            dir: dir.clone(),
                            source,
                        })?;
                    self.dir_ready = true;
                }

                let path = dir.join(&filename);
                tokio::fs::write(&path, &png)
                    .await
                    .map_err(|source| ScreenshotError::Write {
                        path: path.clone(),
                        source,
                    })?;

                ScreenshotArtifact::File {
                    step: step.to_string(),
                    sequence_index,
                    captured_at,
                    filename,
                    path,
                    bytes: png.len(),
                }
            }
        };

        self.artifacts.push(artifact);
        Ok(&self.artifacts[sequence_index])
    }

    /// `{timestamp}__{step}.png`, with a sequence index appended on the rare
    /// same-millisecond label collision.
    fn unique_name(&self, step: &str) -> String {
        let base = format!("{}__{}", timestamp_slug(), sanitize_step(step));
        let candidate = format!("{base}.png");
        if !self.used_names.contains(&candidate) {
            return candidate;
        }
        format!("{base}-{}.png", self.artifacts.len())
    }
}

/// ISO-8601 UTC timestamp with `:` and `.` replaced, filesystem-safe on every
/// platform.
fn timestamp_slug() -> String {
    Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Lowercase the label and collapse runs of non-alphanumeric characters into
/// single underscores.
fn sanitize_step(step: &str) -> String {
    let mut out = String::with_capacity(step.len());
    let mut last_was_sep = false;
    for ch in step.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        } else {
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "step".to_string()
    } else {
        trimmed.to_string()
    }
}
