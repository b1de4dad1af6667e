//! Element resolution over ordered candidate lists.
//!
//! Every higher-level flow (login, join, leave, popup clearing) locates UI
//! through the same primitive: try each candidate pattern in order, first
//! visible match wins. Candidates are probed strictly sequentially, so the
//! worst case costs N × timeout — call sites order candidates by likelihood
//! and keep timeouts short for exploratory lookups.

use crate::browser::PageDriver;
use std::time::Duration;
use tracing::{debug, error, info};

use super::error::SessionError;

/// A candidate that resolved to a visible element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub pattern: &'a str,
    pub index: usize,
}

/// Probe `candidates` in order; return the first that becomes visible within
/// its own `timeout`.
pub async fn resolve<'a>(
    page: &dyn PageDriver,
    step: &str,
    candidates: &[&'a str],
    timeout: Duration,
) -> Result<Resolved<'a>, SessionError> {
    for (index, pattern) in candidates.iter().enumerate() {
        if page.wait_visible(pattern, timeout).await {
            debug!(step, pattern, index, "resolved element");
            return Ok(Resolved { pattern, index });
        }
    }
    Err(SessionError::resolution(step))
}

/// Like [`resolve`], but re-validates that the winning candidate matches
/// exactly one element. Multi-match candidates are rejected and the next one
/// tried — used for sensitive targets like password fields.
pub async fn resolve_unique<'a>(
    page: &dyn PageDriver,
    step: &str,
    candidates: &[&'a str],
    timeout: Duration,
) -> Result<Resolved<'a>, SessionError> {
    for (index, pattern) in candidates.iter().enumerate() {
        if !page.wait_visible(pattern, timeout).await {
            continue;
        }
        match page.count(pattern).await {
            Ok(1) => {
                debug!(step, pattern, index, "resolved unique element");
                return Ok(Resolved { pattern, index });
            }
            Ok(n) => {
                debug!(step, pattern, matches = n, "candidate is ambiguous, trying next");
            }
            Err(e) => {
                debug!(step, pattern, "count failed: {}", e);
            }
        }
    }
    Err(SessionError::resolution(step))
}

/// Click funnel: every click in the system goes through here so the audit
/// trail (timestamp, action, selector, context) is uniform.
pub async fn click_logged(
    page: &dyn PageDriver,
    action: &str,
    selector: &str,
    context: &str,
    timeout: Duration,
) -> Result<(), SessionError> {
    info!(
        timestamp = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        action,
        selector,
        context,
        "click"
    );

    match page.click(selector, timeout).await {
        Ok(()) => {
            info!(action, selector, "click succeeded");
            Ok(())
        }
        Err(e) => {
            error!(action, selector, "click failed: {}", e);
            Err(SessionError::interaction(action, e))
        }
    }
}

/// Typing funnel, same audit shape as [`click_logged`]. The text itself is
/// never logged.
pub async fn type_logged(
    page: &dyn PageDriver,
    action: &str,
    selector: &str,
    context: &str,
    text: &str,
    delay: Duration,
) -> Result<(), SessionError> {
    info!(
        timestamp = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        action,
        selector,
        context,
        chars = text.chars().count(),
        "type"
    );

    page.type_sequentially(selector, text, delay)
        .await
        .map_err(|e| {
            error!(action, selector, "typing failed: {}", e);
            SessionError::interaction(action, e)
        })
}
