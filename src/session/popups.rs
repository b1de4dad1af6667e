//! Interstitial dialog sweeping.
//!
//! The catalogue is every dismissible prompt the meeting UI is known to
//! throw up. All of it is swept unconditionally on every call; a single
//! popup failing to dismiss never aborts the sweep.

use crate::browser::PageDriver;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::resolver::click_logged;

/// Known dismissible dialog patterns, grouped by category.
pub const POPUP_CATALOGUE: &[&str] = &[
    // Permission prompts
    "button:has-text('Allow')",
    "button:has-text('Block')",
    "div[role='button']:has-text('Allow')",
    "div[role='button']:has-text('Block')",
    // Informational dialogs
    "button:has-text('Got it')",
    "button:has-text('Dismiss')",
    "button:has-text('OK')",
    "button:has-text('Close')",
    "button:has-text('Continue')",
    "button:has-text('Next')",
    "button:has-text('Skip')",
    "button:has-text('Not now')",
    "button:has-text('Maybe later')",
    // Generic close affordances
    "[aria-label='Close']",
    "[aria-label='Dismiss']",
    "button[data-dismiss]",
    ".close-button",
    // Meet-specific prompts
    "button:has-text('Use a phone for audio')",
    "button:has-text('Join and use a phone')",
    "button:has-text(\"Don't use a phone\")",
    "button:has-text('Use a phone')",
    // Notification toggles
    "button:has-text('Turn on')",
    "button:has-text('Turn off')",
    "div[role='button']:has-text('Turn on')",
    "div[role='button']:has-text('Turn off')",
    // Modal close buttons by partial label
    "button[aria-label*='close']",
    "button[aria-label*='dismiss']",
    "div[role='button'][aria-label*='close']",
    "div[role='button'][aria-label*='dismiss']",
];

/// Per-click timeout while dismissing.
const CLICK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause after each successful dismissal so the dialog can disappear.
const SETTLE_AFTER_CLICK: Duration = Duration::from_millis(500);

/// Final pause absorbing stragglers spawned by the dismissals themselves.
const FINAL_SETTLE: Duration = Duration::from_millis(1000);

/// Sweep the whole catalogue once, dismissing every visible match.
///
/// Returns the number of popups dismissed. Idempotent: with no popups on
/// screen the sweep performs zero clicks.
pub async fn sweep(page: &dyn PageDriver) -> usize {
    info!("starting popup sweep");
    let mut dismissed = 0usize;

    for pattern in POPUP_CATALOGUE {
        let visible = match page.visible_count(pattern).await {
            Ok(n) => n,
            Err(e) => {
                warn!(pattern, "popup enumeration failed: {}", e);
                continue;
            }
        };

        for _ in 0..visible {
            match click_logged(page, "DISMISS_POPUP", pattern, "Popup Sweep", CLICK_TIMEOUT).await
            {
                Ok(()) => {
                    dismissed += 1;
                    sleep(SETTLE_AFTER_CLICK).await;
                }
                Err(e) => {
                    warn!(pattern, "failed to dismiss popup: {}", e);
                    break;
                }
            }
        }
    }

    sleep(FINAL_SETTLE).await;
    info!(dismissed, "popup sweep completed");
    dismissed
}
