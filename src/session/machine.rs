//! Session lifecycle orchestrator.
//!
//! Owns the single browser session: launches the engine with retry and
//! fallback, runs the login/join/leave protocols, and guards every
//! operation with a lifecycle precondition check. Exactly one of these
//! exists at a time, behind the API layer's mutex.

use crate::browser::{BrowserEngine, LaunchOptions, PageDriver, WaitUntil};
use crate::config::{ConfirmPolicy, Credentials};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::error::SessionError;
use super::login;
use super::popups;
use super::resolver::{click_logged, resolve};
use super::status::{SessionPhase, SessionStatusHandle};
use super::{join, SessionSettings};

const LAUNCH_ATTEMPTS: u32 = 3;
const LAUNCH_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Trivial page used as a liveness probe right after launch.
const PROBE_URL: &str = "data:text/html,<html><body><h1>Browser Test</h1></body></html>";

const MIC_ENABLE: &[&str] = &[
    "button[aria-label*='Turn on microphone']",
    "div[data-tooltip*='Turn on microphone']",
    "button[aria-label*='Unmute']",
    "div[aria-label*='Unmute']",
];
const MIC_ENABLE_TIMEOUT: Duration = Duration::from_millis(2000);

const LEAVE_BUTTON: &[&str] = &[
    "button[aria-label*='Leave call']",
    "div[data-tooltip*='Leave call']",
    "button[aria-label*='End call']",
    "div[data-tooltip*='End call']",
    "button:has-text('Leave call')",
    "div[role='button']:has-text('Leave call')",
    "button[jsname='CQylAd']",
    "div[jsname='CQylAd']",
];
const LEAVE_TIMEOUT: Duration = Duration::from_millis(3000);
const LEAVE_SHORTCUT: &str = "Control+d";

const EXIT_INDICATORS: &[&str] = &[
    "text=You left the meeting",
    "text=Call ended",
    "text=Meeting ended",
    "div[aria-label*='left the meeting']",
    "button:has-text('Rejoin')",
    "div:has-text('Thanks for joining')",
];
const EXIT_INDICATOR_TIMEOUT: Duration = Duration::from_millis(5000);

const SCREENSHOT_QUALITY: u8 = 80;

pub struct SessionMachine {
    engine: Arc<dyn BrowserEngine>,
    page: Option<Box<dyn PageDriver>>,
    credentials: Credentials,
    headless: bool,
    policy: ConfirmPolicy,
    phase: SessionPhase,
    logged_in: bool,
    status: SessionStatusHandle,
}

impl SessionMachine {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        settings: SessionSettings,
        status: SessionStatusHandle,
    ) -> Self {
        Self {
            engine,
            page: None,
            credentials: settings.credentials,
            headless: settings.headless,
            policy: settings.strictness,
            phase: SessionPhase::Uninitialized,
            logged_in: false,
            status,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Launch the browser, open a page, and verify it with a probe
    /// navigation. Retries the full option set, then falls back to the
    /// reduced one; exhaustion is fatal.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if self.page.is_some() {
            info!("session already initialized");
            return Ok(());
        }
        // Closed is terminal; a fresh machine is required, same as every
        // other post-close operation.
        if self.phase == SessionPhase::Closed {
            return Err(SessionError::NotInitialized);
        }

        self.set_phase(SessionPhase::Initializing).await;

        let page = match self.launch_with_retry().await {
            Ok(page) => page,
            Err(e) => {
                self.set_phase(SessionPhase::Uninitialized).await;
                self.status.set_error(e.to_string()).await;
                return Err(e);
            }
        };

        info!("testing page with probe navigation");
        if let Err(e) = page.navigate(PROBE_URL, WaitUntil::Load).await {
            let _ = page.close().await;
            self.set_phase(SessionPhase::Uninitialized).await;
            self.status.set_error(e.to_string()).await;
            return Err(e.into());
        }

        self.page = Some(page);
        self.set_phase(SessionPhase::Ready).await;
        info!("browser session initialized");
        Ok(())
    }

    async fn launch_with_retry(&self) -> Result<Box<dyn PageDriver>, SessionError> {
        let full = LaunchOptions::full(self.headless);

        for attempt in 1..=LAUNCH_ATTEMPTS {
            info!(attempt, max = LAUNCH_ATTEMPTS, "launch attempt");
            match self.engine.launch(&full).await {
                Ok(page) => {
                    info!(attempt, "launch attempt successful");
                    return Ok(page);
                }
                Err(e) => {
                    warn!(attempt, "launch attempt failed: {}", e);
                    if attempt < LAUNCH_ATTEMPTS {
                        sleep(LAUNCH_RETRY_DELAY).await;
                    }
                }
            }
        }

        info!("all attempts failed, trying reduced fallback configuration");
        match self.engine.launch(&LaunchOptions::fallback(self.headless)).await {
            Ok(page) => {
                info!("fallback launch successful");
                Ok(page)
            }
            Err(e) => {
                warn!("fallback launch failed: {}", e);
                Err(SessionError::LaunchFailed {
                    attempts: LAUNCH_ATTEMPTS,
                })
            }
        }
    }

    /// Run the login flow. Retryable: failure leaves the session `Ready`.
    pub async fn login(&mut self) -> Result<(), SessionError> {
        let page = self.page()?;
        login::run(page, &self.credentials, self.policy).await?;
        self.logged_in = true;
        self.status.set_logged_in(true).await;
        Ok(())
    }

    /// Probe whether the account is currently authenticated.
    pub async fn is_logged_in(&mut self) -> Result<bool, SessionError> {
        let page = self.page()?;
        let logged_in = login::probe_logged_in(page).await?;
        self.logged_in = logged_in;
        self.status.set_logged_in(logged_in).await;
        Ok(logged_in)
    }

    pub async fn join_meeting(&mut self, meeting_url: &str) -> Result<(), SessionError> {
        let page = self.page()?;
        if self.phase == SessionPhase::InMeeting {
            return Err(SessionError::InvalidState {
                operation: "join_meeting",
                phase: self.phase.as_str(),
            });
        }

        join::run(page, meeting_url, &self.credentials, self.policy).await?;
        self.phase = SessionPhase::InMeeting;
        self.status.entered_meeting(meeting_url.to_string()).await;
        Ok(())
    }

    /// Leave the meeting: button first, keyboard shortcut as fallback, then
    /// a best-effort exit confirmation. An unconfirmed exit is a warning,
    /// not a failure — the shortcut may have worked without any indicator.
    pub async fn leave_meeting(&mut self) -> Result<(), SessionError> {
        let page = self.page()?;
        info!("attempting to leave the meeting");

        match resolve(page, "leave button", LEAVE_BUTTON, LEAVE_TIMEOUT).await {
            Ok(found) => {
                click_logged(
                    page,
                    "LEAVE_MEETING",
                    found.pattern,
                    "Meeting - Leave",
                    LEAVE_TIMEOUT,
                )
                .await?;
            }
            Err(_) => {
                info!("leave button not found, trying keyboard shortcut");
                page.press_key(LEAVE_SHORTCUT).await.map_err(|e| {
                    SessionError::interaction("leave shortcut", e)
                })?;
            }
        }

        info!("waiting for meeting exit confirmation");
        let mut confirmed = false;
        for pattern in EXIT_INDICATORS {
            if page.wait_visible(pattern, EXIT_INDICATOR_TIMEOUT).await {
                info!("successfully left the meeting");
                confirmed = true;
                break;
            }
        }

        if !confirmed {
            let url = page.current_url().await.unwrap_or_default();
            if !url.contains("meet.google.com") || url.contains("thanks") || url.contains("feedback")
            {
                info!("meeting left based on URL change");
                confirmed = true;
            }
        }

        if !confirmed {
            warn!("meeting exit status unclear, but leave command was executed");
        }

        self.phase = SessionPhase::Left;
        self.status.left_meeting().await;
        Ok(())
    }

    pub async fn enable_microphone(&mut self) -> Result<(), SessionError> {
        let page = self.page()?;

        let found = resolve(
            page,
            "microphone enable button",
            MIC_ENABLE,
            MIC_ENABLE_TIMEOUT,
        )
        .await?;

        click_logged(
            page,
            "ENABLE_MICROPHONE",
            found.pattern,
            "Meeting - Controls",
            MIC_ENABLE_TIMEOUT,
        )
        .await
    }

    pub async fn clear_popups(&mut self) -> Result<usize, SessionError> {
        let page = self.page()?;
        Ok(popups::sweep(page).await)
    }

    pub async fn take_screenshot(&mut self) -> Result<Vec<u8>, SessionError> {
        let page = self.page()?;
        info!("taking screenshot");
        let bytes = page.screenshot(SCREENSHOT_QUALITY).await?;
        info!(size = bytes.len(), "screenshot taken");
        Ok(bytes)
    }

    /// Release the browser. Terminal: the machine accepts no further
    /// operations afterwards.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(page) = self.page.take() {
            page.close().await?;
        }
        self.logged_in = false;
        self.set_phase(SessionPhase::Closed).await;
        self.status.set_logged_in(false).await;
        Ok(())
    }

    fn page(&self) -> Result<&dyn PageDriver, SessionError> {
        match (&self.page, self.phase) {
            (Some(page), phase) if phase != SessionPhase::Closed => Ok(page.as_ref()),
            _ => Err(SessionError::NotInitialized),
        }
    }

    async fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.status.set_phase(phase).await;
    }
}
