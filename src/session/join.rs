//! Meeting-join protocol: navigate, re-login behind auth walls, neutralize
//! camera/microphone, sweep dialogs, and click through to the meeting.

use crate::browser::{PageDriver, WaitUntil};
use crate::config::{ConfirmPolicy, Credentials};
use std::time::Duration;
use tracing::{info, warn};

use super::error::SessionError;
use super::login;
use super::popups;
use super::resolver::{click_logged, resolve};

const CAMERA_TOGGLE: &[&str] = &[
    "div[data-tooltip*='camera']",
    "button[aria-label*='camera']",
    "div[aria-label*='Turn off camera']",
    "button[data-tooltip*='Turn off camera']",
];

const MIC_TOGGLE: &[&str] = &[
    "div[data-tooltip*='microphone']",
    "button[aria-label*='microphone']",
    "div[aria-label*='Turn off microphone']",
    "button[data-tooltip*='Turn off microphone']",
];

/// Short exploratory timeout: a missing toggle means the device is already
/// in the desired state.
const TOGGLE_TIMEOUT: Duration = Duration::from_millis(1000);

const JOIN_BUTTON: &[&str] = &[
    "button:has-text('Join now')",
    "div[role='button']:has-text('Join now')",
    "button:has-text('Ask to join')",
    "div[role='button']:has-text('Ask to join')",
    "button[aria-label*='Join']",
    "div[data-tooltip*='Join']",
];
const JOIN_TIMEOUT: Duration = Duration::from_millis(1500);
const JOIN_ATTEMPTS: u32 = 2;

const MEETING_INDICATORS: &[&str] = &[
    "div[data-allocation-index]",
    "div[jsname='HzV7m']",
    "button[aria-label*='Leave call']",
    "div[aria-label*='You joined']",
];
const MEETING_INDICATOR_TIMEOUT: Duration = Duration::from_millis(3000);

const AUTH_WALL_HOST: &str = "accounts.google.com";
const AUTH_WALL_PATH: &str = "signin";

/// Join the meeting at `meeting_url`.
pub async fn run(
    page: &dyn PageDriver,
    meeting_url: &str,
    credentials: &Credentials,
    policy: ConfirmPolicy,
) -> Result<(), SessionError> {
    info!(meeting_url, "joining meeting");

    page.navigate(meeting_url, WaitUntil::NetworkIdle).await?;

    // Redirected to an auth wall: log in, then come back.
    let url = page.current_url().await?;
    if url.contains(AUTH_WALL_HOST) && url.contains(AUTH_WALL_PATH) {
        info!("auth wall detected, logging in first");
        login::run(page, credentials, policy).await?;
        page.navigate(meeting_url, WaitUntil::NetworkIdle).await?;
    }

    popups::sweep(page).await;

    // Best-effort: turn camera and mic off before joining. The mic stays
    // off until the relay pipeline needs it.
    info!("handling camera and microphone settings");
    disable_toggle(page, "camera toggle", CAMERA_TOGGLE, "TOGGLE_CAMERA_OFF").await;
    disable_toggle(page, "microphone toggle", MIC_TOGGLE, "TOGGLE_MIC_OFF").await;

    // Toggling can spawn new permission prompts.
    popups::sweep(page).await;

    click_join_button(page).await?;

    confirm(page, policy).await
}

async fn disable_toggle(page: &dyn PageDriver, step: &str, candidates: &[&str], action: &str) {
    match resolve(page, step, candidates, TOGGLE_TIMEOUT).await {
        Ok(found) => {
            if let Err(e) = click_logged(
                page,
                action,
                found.pattern,
                "Meeting - Pre-join Setup",
                TOGGLE_TIMEOUT,
            )
            .await
            {
                warn!(step, "failed to click toggle: {}", e);
            }
        }
        Err(_) => {
            // Control absent: assume the device is already off.
            info!(step, "no toggle found, leaving as-is");
        }
    }
}

async fn click_join_button(page: &dyn PageDriver) -> Result<(), SessionError> {
    info!("looking for join button");

    for attempt in 0..JOIN_ATTEMPTS {
        if attempt > 0 {
            info!(attempt, "retrying join button");
            popups::sweep(page).await;
        }

        let Ok(found) = resolve(page, "join button", JOIN_BUTTON, JOIN_TIMEOUT).await else {
            continue;
        };

        match click_logged(
            page,
            "JOIN_MEETING",
            found.pattern,
            "Meeting - Join",
            JOIN_TIMEOUT,
        )
        .await
        {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, "join click failed: {}", e);
                if attempt + 1 == JOIN_ATTEMPTS {
                    return Err(SessionError::interaction("join button", e));
                }
            }
        }
    }

    Err(SessionError::resolution(format!(
        "join button after {JOIN_ATTEMPTS} attempts"
    )))
}

async fn confirm(page: &dyn PageDriver, policy: ConfirmPolicy) -> Result<(), SessionError> {
    info!("waiting for meeting to load");

    for pattern in MEETING_INDICATORS {
        if page.wait_visible(pattern, MEETING_INDICATOR_TIMEOUT).await {
            info!("successfully joined the meeting");
            return Ok(());
        }
    }

    // Some valid meeting UIs lack any detectable indicator.
    match policy {
        ConfirmPolicy::Lenient => {
            warn!("meeting join status unclear, continuing");
            Ok(())
        }
        ConfirmPolicy::Strict => Err(SessionError::Unconfirmed {
            step: "meeting join".to_string(),
        }),
    }
}
