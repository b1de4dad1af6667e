//! Browser driver boundary.
//!
//! The session core never talks to a browser engine directly — it consumes
//! the capability surface below. `chrome` implements it on chromiumoxide;
//! tests script it through `fake`.

pub mod chrome;
pub mod selector;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use chrome::ChromeEngine;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("browser backend error: {0}")]
    Backend(String),
}

/// How long a navigation should wait before the page counts as loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    NetworkIdle,
}

/// Which flag set a launch attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchProfile {
    Full,
    Fallback,
}

/// Browser launch configuration.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub profile: LaunchProfile,
    pub args: Vec<String>,
    pub timeout: Duration,
}

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

impl LaunchOptions {
    /// Full option set: container-safe flags plus fake media-stream grants
    /// so the virtual microphone is picked up without permission prompts.
    pub fn full(headless: bool) -> Self {
        Self {
            headless,
            profile: LaunchProfile::Full,
            args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-infobars",
                "--disable-features=IsolateOrigins,site-per-process",
                "--use-fake-ui-for-media-stream",
                "--autoplay-policy=no-user-gesture-required",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout: LAUNCH_TIMEOUT,
        }
    }

    /// Reduced flag set used as a last resort when full-option launches
    /// keep failing.
    pub fn fallback(headless: bool) -> Self {
        Self {
            headless,
            profile: LaunchProfile::Fallback,
            args: [
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-extensions",
                "--disable-default-apps",
                "--use-fake-ui-for-media-stream",
                "--auto-accept-camera-and-microphone-capture",
                "--log-level=3",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout: LAUNCH_TIMEOUT,
        }
    }
}

/// One browser page, driven through locator patterns.
///
/// Patterns are CSS selectors with a small amount of sugar — see
/// [`selector::parse`]. All waits are bounded by the caller's timeout.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, wait: WaitUntil) -> Result<(), DriverError>;

    /// Best-effort wait for outstanding network traffic to settle.
    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Wait until at least one element matching `pattern` is visible.
    /// Returns `false` on timeout; backend errors are treated as not-visible.
    async fn wait_visible(&self, pattern: &str, timeout: Duration) -> bool;

    /// Number of elements currently matching `pattern`, visible or not.
    async fn count(&self, pattern: &str) -> Result<usize, DriverError>;

    /// Number of currently visible elements matching `pattern`.
    async fn visible_count(&self, pattern: &str) -> Result<usize, DriverError>;

    /// Click the first visible element matching `pattern`.
    async fn click(&self, pattern: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Type into the first element matching `pattern`, one character at a
    /// time with `delay` between keystrokes.
    async fn type_sequentially(
        &self,
        pattern: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), DriverError>;

    /// Visible text content of the first element matching `pattern`.
    async fn inner_text(&self, pattern: &str) -> Result<Option<String>, DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Send a key or key combination (e.g. "Enter", "Control+d") to the page.
    async fn press_key(&self, combo: &str) -> Result<(), DriverError>;

    /// JPEG screenshot of the visible viewport.
    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>, DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Launches browser instances and hands back a driveable page.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>, DriverError>;
}
