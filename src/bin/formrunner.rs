//! CLI for running the scripted signup flow and printing the run report.

use anyhow::Result;
use clap::{Parser, ValueEnum};

use formrunner::config::{Environment, RunnerConfig, RunnerConfigOverrides};
use formrunner::credentials::CredentialSet;
use formrunner::driver::{signup_flow, ScriptedDriver};
use formrunner::runner::Runner;
use formrunner::runtime::ChromiumEngine;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Full-featured local engine.
    Local,
    /// Reduced-privilege headless engine for restricted hosts.
    Constrained,
}

#[derive(Debug, Parser)]
#[command(name = "formrunner", about = "Run a scripted signup flow against a signup page")]
struct Cli {
    /// Signup page to drive.
    #[arg(long)]
    url: String,

    /// Engine variant; defaults to the environment-derived configuration.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Run the browser headful for interactive debugging (local mode only).
    #[arg(long)]
    show_browser: bool,

    /// Encode screenshots inline instead of writing files.
    #[arg(long)]
    inline_screenshots: bool,

    /// Pretty-print the final JSON report.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = RunnerConfig::from_env()?.with_overrides(RunnerConfigOverrides {
        env: cli.mode.map(|mode| match mode {
            Mode::Local => Environment::Local,
            Mode::Constrained => Environment::Constrained,
        }),
        headless: cli.show_browser.then_some(false),
        inline_screenshots: cli.inline_screenshots.then_some(true),
        ..Default::default()
    });

    log::info!("driving signup flow at {} ({:?} engine)", cli.url, config.env);

    let credentials = CredentialSet::generate();
    let driver = ScriptedDriver::new(signup_flow(&cli.url, &credentials));
    let report = Runner::new(config, ChromiumEngine::new())
        .execute(driver, credentials)
        .await;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{rendered}");

    if report.success {
        Ok(())
    } else {
        std::process::exit(1)
    }
}
