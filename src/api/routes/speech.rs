//! Speech relay endpoint.
//!
//! POST /relay synthesizes the given text and streams the audio into the
//! virtual microphone pipe.

use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::api::error::{ApiError, ApiResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/relay", post(relay_speech))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub text: String,
}

async fn relay_speech(
    State(state): State<AppState>,
    Json(req): Json<RelayRequest>,
) -> ApiResult<Json<Value>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }

    info!(chars = req.text.chars().count(), "speech relay requested");
    let bytes = state.speech.speak(&req.text).await?;

    Ok(Json(json!({
        "success": true,
        "bytes_relayed": bytes,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{EspeakSynthesizer, SpeechPipeline};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_text_is_rejected_before_synthesis() {
        let state = AppState::for_tests(Arc::new(SpeechPipeline::new(
            Arc::new(EspeakSynthesizer::new(65)),
            "/tmp/virtmic",
        )));

        let err = relay_speech(
            State(state),
            Json(RelayRequest {
                text: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
