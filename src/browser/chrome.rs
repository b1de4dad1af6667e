//! chromiumoxide-backed implementation of the driver boundary.
//!
//! Locator patterns are evaluated in-page with a small JS predicate so the
//! `:has-text` / `text=` / `label=` sugar works uniformly; element handles
//! are only materialized where real input events are required (typing, key
//! presses).

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::selector::{parse, Pattern};
use super::{BrowserEngine, DriverError, LaunchOptions, PageDriver, WaitUntil};

/// Interval between visibility probes.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period used to approximate network quiescence after a navigation.
const IDLE_SETTLE: Duration = Duration::from_millis(500);

pub struct ChromeEngine;

impl ChromeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError> {
        let mut builder = BrowserConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder
            .args(options.args.clone())
            .build()
            .map_err(DriverError::Launch)?;

        let (browser, mut handler) = timeout(options.timeout, Browser::launch(config))
            .await
            .map_err(|_| DriverError::Launch("browser launch timed out".to_string()))?
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser event loop error: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("failed to open page: {e}")))?;

        Ok(Box::new(ChromePage {
            browser: Mutex::new(browser),
            page,
            handler_task,
        }))
    }
}

pub struct ChromePage {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromePage {
    async fn eval_usize(&self, js: String) -> Result<usize, DriverError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::Backend(e.to_string()))?
            .into_value::<usize>()
            .map_err(|e| DriverError::Backend(e.to_string()))
    }

    /// JS expression collecting all elements matching `pattern`.
    fn collect_js(pattern: &Pattern) -> String {
        match pattern {
            Pattern::Css { selector, has_text } => {
                let sel = js_str(selector);
                match has_text {
                    Some(text) => {
                        let text = js_str(text);
                        format!(
                            "Array.from(document.querySelectorAll({sel}))\
                             .filter(el => (el.textContent || '').includes({text}))"
                        )
                    }
                    None => format!("Array.from(document.querySelectorAll({sel}))"),
                }
            }
            Pattern::Text(text) => {
                let text = js_str(text);
                format!(
                    "Array.from(document.querySelectorAll('*'))\
                     .filter(el => el.childElementCount === 0 \
                        && (el.textContent || '').trim().includes({text}))"
                )
            }
            Pattern::Label(label) => {
                let sel = js_str(&format!("[aria-label=\"{label}\"]"));
                format!("Array.from(document.querySelectorAll({sel}))")
            }
        }
    }

    fn count_js(pattern: &Pattern) -> String {
        format!("(() => {{ return {}.length; }})()", Self::collect_js(pattern))
    }

    fn visible_count_js(pattern: &Pattern) -> String {
        format!(
            "(() => {{ return {}.filter(el => \
             el.offsetParent !== null || el.getClientRects().length > 0).length; }})()",
            Self::collect_js(pattern)
        )
    }

    /// Clicks the first visible match; returns whether one was found.
    fn click_js(pattern: &Pattern) -> String {
        format!(
            "(() => {{ const els = {}.filter(el => \
             el.offsetParent !== null || el.getClientRects().length > 0); \
             if (els.length === 0) return false; els[0].click(); return true; }})()",
            Self::collect_js(pattern)
        )
    }

    fn text_js(pattern: &Pattern) -> String {
        format!(
            "(() => {{ const els = {}; \
             return els.length ? (els[0].textContent || '') : null; }})()",
            Self::collect_js(pattern)
        )
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str, wait: WaitUntil) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if wait == WaitUntil::NetworkIdle {
            self.wait_for_idle(IDLE_SETTLE).await?;
        }
        Ok(())
    }

    async fn wait_for_idle(&self, settle: Duration) -> Result<(), DriverError> {
        // CDP has no first-class network-idle signal; wait out in-flight
        // navigations and give the page a settle interval.
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!("wait_for_navigation: {}", e);
        }
        sleep(settle).await;
        Ok(())
    }

    async fn wait_visible(&self, pattern: &str, timeout: Duration) -> bool {
        let parsed = parse(pattern);
        let js = Self::visible_count_js(&parsed);
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval_usize(js.clone()).await {
                Ok(n) if n > 0 => return true,
                Ok(_) => {}
                Err(e) => debug!("visibility probe failed for {}: {}", pattern, e),
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn count(&self, pattern: &str) -> Result<usize, DriverError> {
        self.eval_usize(Self::count_js(&parse(pattern))).await
    }

    async fn visible_count(&self, pattern: &str) -> Result<usize, DriverError> {
        self.eval_usize(Self::visible_count_js(&parse(pattern)))
            .await
    }

    async fn click(&self, pattern: &str, timeout: Duration) -> Result<(), DriverError> {
        let parsed = parse(pattern);
        let js = Self::click_js(&parsed);
        let deadline = Instant::now() + timeout;
        loop {
            let clicked = self
                .page
                .evaluate(js.clone())
                .await
                .map_err(|e| DriverError::Backend(e.to_string()))?
                .into_value::<bool>()
                .map_err(|e| DriverError::Backend(e.to_string()))?;
            if clicked {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Backend(format!(
                    "no visible element to click for `{pattern}`"
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn type_sequentially(
        &self,
        pattern: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), DriverError> {
        let css = parse(pattern).css_approximation();
        let element = self
            .page
            .find_element(css.as_str())
            .await
            .map_err(|e| DriverError::Backend(format!("element `{pattern}` not found: {e}")))?;

        element
            .click()
            .await
            .map_err(|e| DriverError::Backend(format!("failed to focus `{pattern}`: {e}")))?;

        // One keystroke at a time; pacing reduces anti-automation friction.
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            element
                .type_str(&*ch.encode_utf8(&mut buf))
                .await
                .map_err(|e| DriverError::Backend(format!("failed to type into `{pattern}`: {e}")))?;
            sleep(delay).await;
        }
        Ok(())
    }

    async fn inner_text(&self, pattern: &str) -> Result<Option<String>, DriverError> {
        let js = Self::text_js(&parse(pattern));
        self.page
            .evaluate(js)
            .await
            .map_err(|e| DriverError::Backend(e.to_string()))?
            .into_value::<Option<String>>()
            .map_err(|e| DriverError::Backend(e.to_string()))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| DriverError::Backend(e.to_string()))?
            .unwrap_or_default())
    }

    async fn press_key(&self, combo: &str) -> Result<(), DriverError> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| DriverError::Backend(e.to_string()))?;
        body.press_key(combo)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to press `{combo}`: {e}")))?;
        Ok(())
    }

    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>, DriverError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Jpeg)
                    .quality(i64::from(quality))
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|e| DriverError::Backend(format!("screenshot failed: {e}")))
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("browser close reported: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("browser wait reported: {}", e);
        }
        self.handler_task.abort();
        Ok(())
    }
}
