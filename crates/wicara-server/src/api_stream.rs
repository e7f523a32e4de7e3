//! Handlers for the avatar stream lifecycle routes. Each one validates
//! field presence, relays a single call to the avatar API, and reshapes the
//! upstream response. The server never tracks which state a stream is in —
//! out-of-order calls are the upstream's to reject.

use crate::{api::ApiError, AppState};
use axum::{extract::Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use wicara_avatar::{AvatarClient, AvatarError};

/// Request body for `POST /submit_sdp_answer`.
#[derive(Debug, Deserialize)]
pub struct SdpAnswerRequest {
    pub stream_id_for_path: Option<String>,
    pub session_id_for_body: Option<String>,
    pub sdp_answer: Option<Value>,
}

/// Request body for `POST /start_talk_stream`.
#[derive(Debug, Deserialize)]
pub struct StartTalkRequest {
    pub stream_id_for_path: Option<String>,
    pub session_id_for_body: Option<String>,
    pub text_to_speak: Option<String>,
}

/// Request body for `POST /destroy_did_session`.
#[derive(Debug, Deserialize)]
pub struct DestroySessionRequest {
    pub stream_id_for_path: Option<String>,
    pub session_id_for_body: Option<String>,
}

/// Rejects absent, empty, or whitespace-only fields with a message naming
/// the field, and trims the survivors.
fn required_field(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Client did not send {}", name)))
}

fn avatar_client(state: &AppState) -> Result<Arc<AvatarClient>, ApiError> {
    state.avatar.clone().ok_or_else(|| {
        tracing::error!("avatar API key not configured");
        ApiError::InternalServerError("Avatar API key not configured.".to_string())
    })
}

fn upstream_failure(context: &str, e: AvatarError) -> ApiError {
    ApiError::InternalServerError(format!("{}: {}", context, e))
}

/// Handler for `POST /submit_sdp_answer`.
pub async fn submit_sdp_answer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SdpAnswerRequest>,
) -> Result<Json<Value>, ApiError> {
    let stream_id = required_field(payload.stream_id_for_path, "stream_id_for_path")?;
    let session_id = required_field(payload.session_id_for_body, "session_id_for_body")?;
    let sdp_answer = payload
        .sdp_answer
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::BadRequest("Client did not send sdp_answer".to_string()))?;

    let avatar = avatar_client(&state)?;
    let response = avatar
        .submit_sdp_answer(&stream_id, &session_id, &sdp_answer)
        .await
        .map_err(|e| upstream_failure("Failed to submit SDP answer", e))?;

    Ok(Json(json!({
        "status": "sdp_answer_submitted",
        "d_id_response": response,
    })))
}

/// Handler for `POST /start_talk_stream`. Repeatable while the session is
/// live.
pub async fn start_talk_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<StartTalkRequest>,
) -> Result<Json<Value>, ApiError> {
    let stream_id = required_field(payload.stream_id_for_path, "stream_id_for_path")?;
    let session_id = required_field(payload.session_id_for_body, "session_id_for_body")?;
    let text_to_speak = required_field(payload.text_to_speak, "text_to_speak")?;

    let avatar = avatar_client(&state)?;
    let response = avatar
        .start_talk(&stream_id, &session_id, &text_to_speak)
        .await
        .map_err(|e| upstream_failure("Failed to start talk stream", e))?;

    Ok(Json(json!({
        "status": "talk_stream_started",
        "d_id_response": response,
    })))
}

/// Handler for `POST /destroy_did_session`.
pub async fn destroy_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<DestroySessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let stream_id = required_field(payload.stream_id_for_path, "stream_id_for_path")?;
    let session_id = required_field(payload.session_id_for_body, "session_id_for_body")?;

    let avatar = avatar_client(&state)?;
    let response = avatar
        .destroy_stream(&stream_id, &session_id)
        .await
        .map_err(|e| upstream_failure("Failed to destroy avatar stream", e))?;

    Ok(Json(json!({
        "status": "session_destroyed",
        "d_id_response": response,
    })))
}
