//! Retrying navigator with form readiness probing.
//!
//! Some signup pages interpose an interstitial or anti-bot challenge before
//! the real form renders. After a successful navigation the navigator probes
//! for a known form selector, reloading and backing off between attempts, and
//! reports whether the form was ever detected. A hard error is raised only
//! when the initial navigation itself fails; an undetected form is a soft
//! outcome left to the driver's policy.

use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;

use crate::browser::BrowserEngine;
use crate::config::RunnerConfig;
use crate::runlog::RunLog;
use crate::session::{ActionError, Session};

/// Readiness probing knobs, normally taken from the configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub probe_selector: String,
}

impl RetryPolicy {
    pub fn from_config(config: &RunnerConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_probe_attempts,
            backoff: Duration::from_millis(config.probe_backoff_ms),
            probe_selector: config.probe_selector.clone(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// What the navigator found once navigation settled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOutcome {
    pub title: String,
    pub final_url: String,
    pub form_detected: bool,
    pub probe_attempts: u32,
}

/// Navigate to `url` and probe for the readiness selector.
///
/// The probe loop runs at most `policy.max_attempts` times; between attempts
/// the page is reloaded after the backoff, giving challenge pages time to
/// clear. Probe errors are treated as a miss, not a failure.
pub async fn navigate<E: BrowserEngine>(
    session: &Session<E>,
    url: &str,
    policy: &RetryPolicy,
    log: &mut RunLog,
) -> Result<NavigationOutcome, ActionError> {
    log.info(format!("navigating to {url}"));
    session.navigate(url).await?;

    let mut form_detected = false;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        attempts += 1;

        match session.selector_exists(&policy.probe_selector).await {
            Ok(true) => {
                form_detected = true;
                log.info(format!(
                    "form detected on probe {attempts} ({})",
                    policy.probe_selector
                ));
                break;
            }
            Ok(false) => {
                log.warn(format!(
                    "form not detected on probe {attempts}/{} ({})",
                    policy.max_attempts, policy.probe_selector
                ));
            }
            Err(err) => {
                log.warn(format!("readiness probe {attempts} errored: {err}"));
            }
        }

        if attempts < policy.max_attempts {
            sleep(policy.backoff).await;
            if let Err(err) = session.reload().await {
                log.warn(format!("reload before probe {} failed: {err}", attempts + 1));
            }
        }
    }

    let title = session.title().await.unwrap_or_default();
    let final_url = session.current_url().await.unwrap_or_default();

    if !form_detected {
        log.warn(format!(
            "form never detected after {attempts} probes; page may be a challenge or an unexpected layout (title: {title:?})"
        ));
    }

    Ok(NavigationOutcome {
        title,
        final_url,
        form_detected,
        probe_attempts: attempts,
    })
}
