//! Chromiumoxide-backed browser engine.
//!
//! Provides the [`BrowserEngine`](crate::browser::BrowserEngine)
//! implementation used for both engine variants. The variant difference is
//! entirely contained in the [`LaunchPlan`] handed to `launch`; every other
//! operation drives the same single page over CDP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chromiumoxide::{
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams},
    page::Page as ChromiumPage,
};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use tokio::{sync::Mutex, task::JoinHandle, time::sleep};

use crate::browser::{BrowserEngine, EngineError, LaunchError, LaunchPlan};

pub struct ChromiumEngine {
    state: Arc<Mutex<Option<EngineState>>>,
}

struct EngineState {
    browser: Browser,
    handler: JoinHandle<()>,
    page: ChromiumPage,
}

impl ChromiumEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
        }
    }

    async fn page(&self) -> Result<ChromiumPage, EngineError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(EngineError::NotLaunched)?;
        Ok(state.page.clone())
    }

    async fn evaluate(&self, expression: &str) -> Result<JsonValue, EngineError> {
        let page = self.page().await?;
        let result = page
            .evaluate(expression)
            .await
            .map_err(EngineError::message)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }
}

impl Default for ChromiumEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config(plan: &LaunchPlan) -> Result<BrowserConfig, String> {
    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: plan.viewport.width,
        height: plan.viewport.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: plan.viewport.width >= plan.viewport.height,
        has_touch: false,
    };

    let mut builder = BrowserConfig::builder();

    if let Some(path) = &plan.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder.viewport(viewport).args(plan.args.clone());

    let builder = if plan.headless {
        builder
    } else {
        builder.with_head()
    };

    let builder = if plan.devtools {
        builder.arg("--auto-open-devtools-for-tabs")
    } else {
        builder
    };

    let builder = if plan.ignore_https_errors {
        builder
    } else {
        builder.respect_https_errors()
    };

    builder.build()
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                log::debug!("chromiumoxide handler error: {err}");
            }
        }
    })
}

/// Build a script that locates `selector` via `document.querySelector` and
/// runs `body` with the element bound to `el`. Throws if the element is
/// missing, which callers map to [`EngineError::MissingElement`].
fn build_selector_script(selector: &str, body: &str) -> Result<String, EngineError> {
    let selector_json = serde_json::to_string(selector).map_err(EngineError::message)?;
    Ok(format!(
        "(function() {{
            const el = document.querySelector({selector});
            if (!el) {{
                throw new Error('missing element');
            }}
            {body}
        }})()",
        selector = selector_json,
        body = body
    ))
}

fn map_script_error(err: EngineError, selector: &str) -> EngineError {
    match &err {
        EngineError::Message(message) if message.contains("missing element") => {
            EngineError::MissingElement {
                selector: selector.to_string(),
            }
        }
        _ => err,
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn launch(&self, plan: &LaunchPlan) -> Result<(), LaunchError> {
        {
            let guard = self.state.lock().await;
            if guard.is_some() {
                return Ok(());
            }
        }

        let config = build_config(plan).map_err(LaunchError::new)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|err| LaunchError::new(err.to_string()))?;
        let handler = spawn_handler(handler);

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(LaunchError::new(err.to_string()));
            }
        };

        let mut guard = self.state.lock().await;
        *guard = Some(EngineState {
            browser,
            handler,
            page,
        });
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<(), EngineError> {
        let page = self.page().await?;
        page.goto(url).await.map_err(EngineError::message)?;
        page.wait_for_navigation()
            .await
            .map_err(EngineError::message)?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), EngineError> {
        let page = self.page().await?;
        page.reload().await.map_err(EngineError::message)?;
        Ok(())
    }

    async fn title(&self) -> Result<String, EngineError> {
        let page = self.page().await?;
        let title = page.get_title().await.map_err(EngineError::message)?;
        Ok(title.unwrap_or_default())
    }

    async fn current_url(&self) -> Result<String, EngineError> {
        let page = self.page().await?;
        let url = page.url().await.map_err(EngineError::message)?;
        Ok(url.unwrap_or_default())
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool, EngineError> {
        let selector_json = serde_json::to_string(selector).map_err(EngineError::message)?;
        let script = format!("document.querySelector({selector_json}) !== null");
        let value = self.evaluate(&script).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<(), EngineError> {
        let script = build_selector_script(selector, "el.click(); return true;")?;
        self.evaluate(&script)
            .await
            .map_err(|err| map_script_error(err, selector))?;
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), EngineError> {
        let focus = build_selector_script(
            selector,
            "el.focus(); if ('value' in el) { el.value = ''; } return true;",
        )?;
        self.evaluate(&focus)
            .await
            .map_err(|err| map_script_error(err, selector))?;

        // Character-by-character entry, dispatching an input event per key so
        // reactive form validation observes the same sequence a user produces.
        for ch in text.chars() {
            let ch_json =
                serde_json::to_string(&ch.to_string()).map_err(EngineError::message)?;
            let body = format!(
                "if ('value' in el) {{ el.value = el.value + {ch_json}; }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;"
            );
            let script = build_selector_script(selector, &body)?;
            self.evaluate(&script)
                .await
                .map_err(|err| map_script_error(err, selector))?;
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }

        let settle = build_selector_script(
            selector,
            "el.dispatchEvent(new Event('change', { bubbles: true })); return true;",
        )?;
        self.evaluate(&settle)
            .await
            .map_err(|err| map_script_error(err, selector))?;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, EngineError> {
        let page = self.page().await?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .capture_beyond_viewport(full_page)
            .build();
        let response = page.execute(params).await.map_err(EngineError::message)?;
        BASE64
            .decode(&response.result.data)
            .map_err(EngineError::message)
    }

    async fn close(&self) -> Result<(), EngineError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };

        if let Some(mut state) = state {
            let close_result = state.browser.close().await;
            state.handler.abort();
            close_result.map_err(EngineError::message)?;
        }

        Ok(())
    }
}
