//! Credential-submission flow for the identifier-then-secret account pages.

use crate::browser::{PageDriver, WaitUntil};
use crate::config::{ConfirmPolicy, Credentials};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use super::error::SessionError;
use super::resolver::{click_logged, resolve, resolve_unique, type_logged};

pub const SIGNIN_URL: &str =
    "https://accounts.google.com/signin/v2/identifier?flowName=GlifWebSignIn&flowEntry=ServiceLogin";
const ACCOUNTS_URL: &str = "https://accounts.google.com/";

/// Inter-keystroke delay; paced typing mimics human input.
const TYPE_DELAY: Duration = Duration::from_millis(50);

const EMAIL_FIELD: &[&str] = &[
    "input#identifierId",
    "input[type='email']",
    "input[name='identifier']",
    "input[autocomplete='username']",
];
const EMAIL_TIMEOUT: Duration = Duration::from_millis(1000);

const EMAIL_NEXT: &[&str] = &[
    "div#identifierNext",
    "button#identifierNext",
    "input#identifierNext",
    "button:has-text('Next')",
    "div[role='button']:has-text('Next')",
];
const EMAIL_NEXT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Grace period for the password page to render after the identifier step.
const PASSWORD_PAGE_SETTLE: Duration = Duration::from_millis(500);

// Most specific first; several of these can match hidden shadow inputs,
// which is why resolution is uniqueness-checked.
const PASSWORD_FIELD: &[&str] = &[
    "input[name='Passwd']",
    "input[name='Passwd'][type='password']",
    "input[autocomplete='current-password']:not([aria-hidden='true'])",
    "input[jsname='YPqjbf']",
    "input[type='password'][tabindex='0']",
    "input[type='password']:not([name='hiddenPassword'])",
];
const PASSWORD_TIMEOUT: Duration = Duration::from_millis(800);

const PASSWORD_LABEL: &str = "label=Enter your password";
const PASSWORD_LABEL_TIMEOUT: Duration = Duration::from_millis(1000);

const SUBMIT: &[&str] = &[
    "div#passwordNext",
    "button[type='submit']",
    "input[type='submit']",
    "button:has-text('Next')",
    "div[role='button']:has-text('Next')",
];
const SUBMIT_TIMEOUT: Duration = Duration::from_millis(2000);

const ACCOUNT_URL_FRAGMENT: &str = "myaccount.google.com";
const ACCOUNT_URL_TIMEOUT: Duration = Duration::from_millis(3000);

const OAUTH_URL_FRAGMENT: &str = "accounts.google.com/signin/oauth";
const OAUTH_URL_TIMEOUT: Duration = Duration::from_millis(2000);

const SUCCESS_INDICATORS: &[&str] = &["text=Welcome", "[data-email]"];
const SUCCESS_INDICATOR_TIMEOUT: Duration = Duration::from_millis(5000);

const SIGNIN_PATH_FRAGMENT: &str = "signin/v2/identifier";

const INLINE_ERROR: &str = "[jsname='B34EJ'] span";
const INLINE_ERROR_TIMEOUT: Duration = Duration::from_millis(2000);

const LOGGED_IN_INDICATORS: &[&str] = &[
    "[data-email]",
    "[aria-label*='Google Account']",
    "img[alt*='profile']",
    "div[data-email]",
];
const LOGGED_IN_TIMEOUT: Duration = Duration::from_millis(3000);

const URL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run the full login flow against the sign-in entry point.
pub async fn run(
    page: &dyn PageDriver,
    credentials: &Credentials,
    policy: ConfirmPolicy,
) -> Result<(), SessionError> {
    page.navigate(SIGNIN_URL, WaitUntil::NetworkIdle).await?;

    // Identifier step
    let email = resolve(page, "email field", EMAIL_FIELD, EMAIL_TIMEOUT).await?;
    type_logged(
        page,
        "TYPE_EMAIL",
        email.pattern,
        "Login - Email Step",
        &credentials.identifier,
        TYPE_DELAY,
    )
    .await?;

    let next = resolve(page, "email next button", EMAIL_NEXT, EMAIL_NEXT_TIMEOUT).await?;
    click_logged(
        page,
        "CLICK_EMAIL_NEXT",
        next.pattern,
        "Login - Email Step",
        EMAIL_NEXT_TIMEOUT,
    )
    .await?;

    // Page transition to the secret step; quiescence here is best-effort.
    info!("waiting for password page to load");
    if let Err(e) = page.wait_for_idle(PASSWORD_PAGE_SETTLE).await {
        warn!("failed to wait for network idle: {}", e);
    }

    // Secret step, uniqueness-checked with a label-based last resort
    match resolve_unique(page, "password field", PASSWORD_FIELD, PASSWORD_TIMEOUT).await {
        Ok(field) => {
            type_logged(
                page,
                "TYPE_PASSWORD",
                field.pattern,
                "Login - Password Step",
                &credentials.secret,
                TYPE_DELAY,
            )
            .await?;
        }
        Err(_) => {
            info!("no password candidate resolved, trying label lookup");
            if !page
                .wait_visible(PASSWORD_LABEL, PASSWORD_LABEL_TIMEOUT)
                .await
            {
                return Err(SessionError::resolution("password field"));
            }
            type_logged(
                page,
                "TYPE_PASSWORD",
                PASSWORD_LABEL,
                "Login - Password Step",
                &credentials.secret,
                TYPE_DELAY,
            )
            .await?;
        }
    }

    // Submit, with the Enter key as fallback
    match resolve(page, "password next button", SUBMIT, SUBMIT_TIMEOUT).await {
        Ok(button) => {
            click_logged(
                page,
                "CLICK_PASSWORD_NEXT",
                button.pattern,
                "Login - Password Step",
                SUBMIT_TIMEOUT,
            )
            .await?;
        }
        Err(_) => {
            info!("next button not found, pressing Enter as fallback");
            page.press_key("Enter").await?;
        }
    }

    info!("completing login");
    confirm(page, policy).await
}

/// Race the independent success signals in order, then fall back to URL and
/// error-element heuristics.
async fn confirm(page: &dyn PageDriver, policy: ConfirmPolicy) -> Result<(), SessionError> {
    if wait_for_url_contains(page, ACCOUNT_URL_FRAGMENT, ACCOUNT_URL_TIMEOUT).await {
        info!("login successful - redirected to account home");
        return Ok(());
    }

    if wait_for_url_contains(page, OAUTH_URL_FRAGMENT, OAUTH_URL_TIMEOUT).await {
        info!("login successful - OAuth redirect");
        return Ok(());
    }

    for pattern in SUCCESS_INDICATORS {
        if page.wait_visible(pattern, SUCCESS_INDICATOR_TIMEOUT).await {
            info!(pattern, "login successful - found success indicator");
            return Ok(());
        }
    }

    let url = page.current_url().await?;
    info!(url = %url, "no success signal fired, inspecting URL");
    if !url.is_empty() && !url.contains(SIGNIN_PATH_FRAGMENT) {
        info!("login appears successful based on URL");
        return Ok(());
    }

    if page.wait_visible(INLINE_ERROR, INLINE_ERROR_TIMEOUT).await {
        let reason = page
            .inner_text(INLINE_ERROR)
            .await?
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(SessionError::AuthRejected { reason });
    }

    match policy {
        ConfirmPolicy::Lenient => {
            warn!("login status unclear, continuing");
            Ok(())
        }
        ConfirmPolicy::Strict => Err(SessionError::Unconfirmed {
            step: "login".to_string(),
        }),
    }
}

/// Check whether the session is already authenticated by visiting the
/// accounts origin and probing for logged-in indicators.
pub async fn probe_logged_in(page: &dyn PageDriver) -> Result<bool, SessionError> {
    page.navigate(ACCOUNTS_URL, WaitUntil::NetworkIdle).await?;

    let url = page.current_url().await?;
    if url.contains("signin") {
        return Ok(false);
    }

    for pattern in LOGGED_IN_INDICATORS {
        if page.wait_visible(pattern, LOGGED_IN_TIMEOUT).await {
            info!("account is already logged in");
            return Ok(true);
        }
    }

    Ok(false)
}

/// Poll the page URL until it contains `fragment` or `timeout` elapses.
async fn wait_for_url_contains(page: &dyn PageDriver, fragment: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(url) = page.current_url().await {
            if url.contains(fragment) {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(URL_POLL_INTERVAL).await;
    }
}
