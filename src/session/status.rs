//! Session lifecycle types and shared status handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Phase of the browser session lifecycle.
///
/// Transitions are monotonic along
/// `Uninitialized → Initializing → Ready → InMeeting → Left`; `Closed` is
/// terminal and reachable from anywhere. Login is a flag layered on `Ready`,
/// not a phase of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Initializing,
    Ready,
    InMeeting,
    Left,
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::InMeeting => "in_meeting",
            Self::Left => "left",
            Self::Closed => "closed",
        }
    }
}

/// Current session state, readable by API handlers.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub logged_in: bool,
    pub meeting_url: Option<String>,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            logged_in: false,
            meeting_url: None,
            last_error: None,
        }
    }
}

/// Thread-safe handle for sharing session state between the orchestrator
/// and API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.inner.lock().await;
        state.phase = phase;
    }

    pub async fn set_logged_in(&self, logged_in: bool) {
        let mut state = self.inner.lock().await;
        state.logged_in = logged_in;
    }

    pub async fn entered_meeting(&self, url: String) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::InMeeting;
        state.meeting_url = Some(url);
        state.last_error = None;
    }

    pub async fn left_meeting(&self) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Left;
        state.meeting_url = None;
    }

    pub async fn set_error(&self, error: String) {
        let mut state = self.inner.lock().await;
        state.last_error = Some(error);
    }
}
