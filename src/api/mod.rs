//! REST API server for meetbot.
//!
//! Provides HTTP endpoints for:
//! - Session control (init, join, leave, microphone, popups)
//! - Screenshots and session status
//! - Speech relay into the virtual microphone

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tracing::info;

use crate::browser::BrowserEngine;
use crate::config::KeepaliveConfig;
use crate::session::{SessionMachine, SessionSettings, SessionStatusHandle};
use crate::speech::SpeechPipeline;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// The one live session, if any. Handlers serialize on this lock.
    pub session: Arc<Mutex<Option<SessionMachine>>>,
    pub engine: Arc<dyn BrowserEngine>,
    pub settings: SessionSettings,
    pub status: SessionStatusHandle,
    pub speech: Arc<SpeechPipeline>,
    pub keepalive: KeepaliveConfig,
}

impl AppState {
    #[cfg(test)]
    pub fn for_tests(speech: Arc<SpeechPipeline>) -> Self {
        use crate::browser::fake::{FakeDriver, FakeEngine};
        use crate::config::{ConfirmPolicy, Credentials};

        Self {
            session: Arc::new(Mutex::new(None)),
            engine: Arc::new(FakeEngine::new(FakeDriver::new())),
            settings: SessionSettings {
                credentials: Credentials {
                    identifier: "bot@example.com".to_string(),
                    secret: "hunter2".to_string(),
                },
                headless: true,
                strictness: ConfirmPolicy::Lenient,
            },
            status: SessionStatusHandle::default(),
            speech,
            keepalive: KeepaliveConfig {
                enabled: false,
                script: "./keepalive.sh".into(),
            },
        }
    }
}

pub struct ApiServer {
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(port: u16, state: AppState) -> Self {
        Self { port, state }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(status))
            .route("/version", get(version))
            // Session and speech routes
            .nest("/session", routes::session::router(self.state.clone()))
            .nest("/speech", routes::speech::router(self.state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                          - Service info");
        info!("  GET  /version                   - Get version info");
        info!("  POST /session/init              - Initialize browser session");
        info!("  POST /session/join              - Join a meeting");
        info!("  POST /session/leave             - Leave the current meeting");
        info!("  POST /session/microphone/enable - Enable the microphone");
        info!("  POST /session/popups/clear      - Dismiss visible popups");
        info!("  GET  /session/screenshot        - Capture the current page");
        info!("  GET  /session/status            - Get session status");
        info!("  POST /speech/relay              - Speak text into the mic pipe");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "meetbot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "meetbot"
    }))
}
