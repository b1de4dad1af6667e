//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Initializing the browser session (POST /init)
//! - Joining and leaving meetings (POST /join, POST /leave)
//! - Enabling the microphone (POST /microphone/enable)
//! - Clearing popups (POST /popups/clear)
//! - Screenshots and status (GET /screenshot, GET /status)

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::app::keepalive;
use crate::session::{SessionMachine, SessionPhase};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/init", post(init_session))
        .route("/join", post(join_meeting))
        .route("/leave", post(leave_meeting))
        .route("/microphone/enable", post(enable_microphone))
        .route("/popups/clear", post(clear_popups))
        .route("/screenshot", get(screenshot))
        .route("/status", get(session_status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub meeting_url: String,
}

/// Create and initialize the session if it does not exist yet. Idempotent
/// when already initialized; a closed session is replaced wholesale.
///
/// Takes the already-held session guard: composite operations (init + login
/// + join) must run under one continuous lock, never releasing it mid-flow.
async fn ensure_initialized(
    state: &AppState,
    guard: &mut Option<SessionMachine>,
) -> ApiResult<()> {
    let needs_new = match guard.as_ref() {
        None => true,
        Some(machine) => machine.phase() == SessionPhase::Closed,
    };
    if needs_new {
        *guard = Some(SessionMachine::new(
            state.engine.clone(),
            state.settings.clone(),
            state.status.clone(),
        ));
    }

    if let Some(machine) = guard.as_mut() {
        machine.initialize().await?;
    }
    Ok(())
}

async fn init_session(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    info!("session init requested via API");
    {
        let mut guard = state.session.lock().await;
        ensure_initialized(&state, &mut guard).await?;
    }

    if state.keepalive.enabled {
        keepalive::ensure_running(&state.keepalive);
    }

    Ok(Json(json!({
        "success": true,
        "phase": state.status.get().await.phase.as_str(),
    })))
}

async fn join_meeting(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<Json<Value>> {
    if req.meeting_url.is_empty() {
        return Err(ApiError::bad_request("meeting_url must not be empty"));
    }

    // Joining implies a session; create one on the fly if needed. The guard
    // stays held from here through the join itself so no other session
    // operation can interleave.
    let mut guard = state.session.lock().await;
    ensure_initialized(&state, &mut guard).await?;

    let machine = guard.as_mut().ok_or_else(session_missing)?;

    // An authenticated account skips the login flow entirely.
    match machine.is_logged_in().await {
        Ok(true) => info!("already logged in, skipping login"),
        Ok(false) => {
            info!("not logged in, performing login");
            machine.login().await?;
        }
        Err(e) => {
            warn!("login probe failed, attempting login anyway: {}", e);
            machine.login().await?;
        }
    }

    machine.join_meeting(&req.meeting_url).await?;

    Ok(Json(json!({
        "success": true,
        "meeting_url": req.meeting_url,
    })))
}

async fn leave_meeting(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut guard = state.session.lock().await;
    let machine = guard.as_mut().ok_or_else(session_missing)?;
    machine.leave_meeting().await?;

    Ok(Json(json!({ "success": true })))
}

async fn enable_microphone(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut guard = state.session.lock().await;
    let machine = guard.as_mut().ok_or_else(session_missing)?;
    machine.enable_microphone().await?;

    Ok(Json(json!({ "success": true })))
}

async fn clear_popups(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut guard = state.session.lock().await;
    let machine = guard.as_mut().ok_or_else(session_missing)?;
    let dismissed = machine.clear_popups().await?;

    Ok(Json(json!({
        "success": true,
        "dismissed": dismissed,
    })))
}

async fn screenshot(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let mut guard = state.session.lock().await;
    let machine = guard.as_mut().ok_or_else(session_missing)?;
    let bytes = machine.take_screenshot().await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        bytes,
    ))
}

/// Always answers 200; absence of a session is itself reportable status.
async fn session_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.status.get().await;
    let initialized = matches!(
        status.phase,
        SessionPhase::Ready | SessionPhase::InMeeting | SessionPhase::Left
    );

    Json(json!({
        "initialized": initialized,
        "phase": status.phase.as_str(),
        "logged_in": status.logged_in,
        "meeting_url": status.meeting_url,
        "last_error": status.last_error,
    }))
}

fn session_missing() -> ApiError {
    ApiError::bad_request("session not initialized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeDriver, FakeEngine};
    use crate::config::{ConfirmPolicy, Credentials, KeepaliveConfig};
    use crate::session::{SessionPhase, SessionSettings, SessionStatusHandle};
    use crate::speech::{EspeakSynthesizer, SpeechPipeline};
    use std::sync::Arc;

    fn state_with(driver: FakeDriver) -> AppState {
        AppState {
            session: Arc::new(tokio::sync::Mutex::new(None)),
            engine: Arc::new(FakeEngine::new(driver)),
            settings: SessionSettings {
                credentials: Credentials {
                    identifier: "bot@example.com".to_string(),
                    secret: "hunter2".to_string(),
                },
                headless: true,
                strictness: ConfirmPolicy::Lenient,
            },
            status: SessionStatusHandle::default(),
            speech: Arc::new(SpeechPipeline::new(
                Arc::new(EspeakSynthesizer::new(65)),
                "/tmp/virtmic",
            )),
            keepalive: KeepaliveConfig {
                enabled: false,
                script: "./keepalive.sh".into(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_uninitialized_before_init() {
        let state = state_with(FakeDriver::new());
        let Json(body) = session_status(State(state)).await;
        assert_eq!(body["initialized"], false);
        assert_eq!(body["phase"], "uninitialized");
        assert_eq!(body["logged_in"], false);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_creates_session_and_reports_ready() {
        let state = state_with(FakeDriver::new());
        let Json(body) = init_session(State(state.clone())).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["phase"], "ready");
        assert!(state.session.lock().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_initializes_implicitly() {
        let driver = FakeDriver::new();
        // Login probe finds an authenticated account, so no login flow runs.
        driver.visible("[data-email]");
        driver.visible("button:has-text('Join now')");
        driver.visible("button[aria-label*='Leave call']");
        let state = state_with(driver);

        let Json(body) = join_meeting(
            State(state.clone()),
            Json(JoinRequest {
                meeting_url: "https://meet.google.com/abc-defg-hij".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body["success"], true);
        let status = state.status.get().await;
        assert_eq!(status.phase, SessionPhase::InMeeting);
        assert_eq!(
            status.meeting_url.as_deref(),
            Some("https://meet.google.com/abc-defg-hij")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_holds_session_guard_across_init_and_join() {
        // A leave request queued while a join is initializing must wait for
        // the entire join to finish, not slip in between initialization and
        // the login/join half. The lock is fair, so a mid-operation release
        // would hand it to the queued leave first.
        let driver = FakeDriver::new();
        driver.visible("[data-email]");
        driver.visible("button:has-text('Join now')");
        driver.visible("button[aria-label*='Leave call']");
        driver.visible("text=You left the meeting");

        let mut state = state_with(driver.clone());
        // One failed launch makes initialization park on its retry delay
        // while the guard is held.
        state.engine = Arc::new(FakeEngine::failing(driver.clone(), 1));

        let join_state = state.clone();
        let join = tokio::spawn(async move {
            join_meeting(
                State(join_state),
                Json(JoinRequest {
                    meeting_url: "https://meet.google.com/abc-defg-hij".to_string(),
                }),
            )
            .await
        });
        // Let the join acquire the guard and park in the launch retry.
        tokio::task::yield_now().await;

        leave_meeting(State(state.clone())).await.unwrap();
        join.await.unwrap().unwrap();

        let clicks = driver.clicks();
        let join_click = clicks
            .iter()
            .position(|c| c == "button:has-text('Join now')")
            .unwrap();
        let leave_click = clicks
            .iter()
            .position(|c| c == "button[aria-label*='Leave call']")
            .unwrap();
        assert!(join_click < leave_click);
        assert_eq!(state.status.get().await.phase, SessionPhase::Left);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_rejects_empty_url() {
        let state = state_with(FakeDriver::new());
        let err = join_meeting(
            State(state),
            Json(JoinRequest {
                meeting_url: String::new(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_without_session_is_bad_request() {
        let state = state_with(FakeDriver::new());
        let err = leave_meeting(State(state)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_popups_reports_dismissal_count() {
        let driver = FakeDriver::new();
        driver.popup("button:has-text('Got it')");
        let state = state_with(driver);

        init_session(State(state.clone())).await.unwrap();
        let Json(body) = clear_popups(State(state)).await.unwrap();
        assert_eq!(body["dismissed"], 1);
    }
}
