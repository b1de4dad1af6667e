//! Service wiring: config, credentials, browser engine, speech pipeline,
//! and the API server.

pub mod keepalive;

use crate::api::{ApiServer, AppState};
use crate::browser::ChromeEngine;
use crate::config::Config;
use crate::config::Credentials;
use crate::session::{SessionSettings, SessionStatusHandle};
use crate::speech::{EspeakSynthesizer, SpeechPipeline};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting meetbot service");

    let config = Config::load()?;
    let credentials = Credentials::from_env()?;

    let engine = Arc::new(ChromeEngine::new());
    let synthesizer = Arc::new(EspeakSynthesizer::new(config.speech.voice_speed));
    let speech = Arc::new(SpeechPipeline::new(
        synthesizer,
        config.speech.pipe_path.clone(),
    ));

    let state = AppState {
        session: Arc::new(Mutex::new(None)),
        engine,
        settings: SessionSettings {
            credentials,
            headless: config.browser.headless,
            strictness: config.behavior.strictness,
        },
        status: SessionStatusHandle::default(),
        speech,
        keepalive: config.keepalive.clone(),
    };

    info!("meetbot is ready!");
    info!(
        "Initialize a session with: curl -X POST http://127.0.0.1:{}/session/init",
        config.server.port
    );

    // The API server is the service; run it in the foreground.
    ApiServer::new(config.server.port, state).start().await
}
