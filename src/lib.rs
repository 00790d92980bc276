//! formrunner: environment-parameterized browser automation for scripted
//! signup flows.
//!
//! The crate drives a real Chromium instance through a small set of atomic,
//! agent-invocable tools (navigate, click, type, wait, screenshot), with a
//! retrying navigator for challenge-prone signup pages, a per-run screenshot
//! sink, and an append-only run log. The same run works on a full local
//! engine or a reduced-privilege constrained engine; the variant is chosen
//! once from configuration and everything above the session layer is
//! backend-agnostic.
//!
//! The typical entry point is [`runner::Runner`] with a
//! [`driver::ScriptedDriver`] replaying [`driver::signup_flow`]:
//!
//! ```no_run
//! use formrunner::config::RunnerConfig;
//! use formrunner::credentials::CredentialSet;
//! use formrunner::driver::{signup_flow, ScriptedDriver};
//! use formrunner::runner::Runner;
//! use formrunner::runtime::ChromiumEngine;
//!
//! # async fn run() {
//! let config = RunnerConfig::default();
//! let credentials = CredentialSet::generate();
//! let driver = ScriptedDriver::new(signup_flow("https://example.com/signup", &credentials));
//! let report = Runner::new(config, ChromiumEngine::new())
//!     .execute(driver, credentials)
//!     .await;
//! println!("success: {}", report.success);
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod credentials;
pub mod driver;
pub mod navigator;
pub mod runlog;
pub mod runner;
pub mod runtime;
pub mod screenshot;
pub mod session;
pub mod tools;
