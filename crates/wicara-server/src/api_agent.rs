//! Handlers for the conversational routes: stream initiation (with the
//! initial greeting) and the transcribe-then-answer turn.

use crate::{api::ApiError, AppState};
use axum::{
    extract::multipart::MultipartRejection,
    extract::{Extension, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Greeting used when the answer backend is unavailable or errors during
/// stream initiation. The stream is still created.
const FALLBACK_GREETING: &str = "Halo! Koneksi sedang disiapkan. Ada yang bisa saya bantu?";

/// Marker the browser client sends when connecting.
const CONNECT_MARKER: &str = "SYSTEM_CONNECT_REQUEST";

/// Fixed user-facing message for answer-backend failures. The typed error
/// is logged; the client only ever sees this.
const ANSWER_FAILURE_MESSAGE: &str =
    "Maaf, terjadi kesalahan saat memproses permintaan Anda.";

/// Handler for `POST /initiate_did_stream`.
///
/// Creates a new avatar stream and returns the identifiers, SDP offer and
/// ICE servers the browser needs to drive the WebRTC negotiation, plus an
/// initial greeting. The server keeps no record of the created stream.
pub async fn initiate_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let Some(avatar) = state.avatar.clone() else {
        tracing::error!("avatar API key not configured");
        return ApiError::InternalServerError("Avatar API key not configured.".to_string())
            .into_response();
    };

    // The client sends a connect marker as form data; anything missing or
    // unreadable falls back to the marker.
    let mut user_text = String::new();
    if let Ok(mut form) = multipart {
        while let Ok(Some(field)) = form.next_field().await {
            let is_text_input = field.name() == Some("text_input");
            if is_text_input {
                user_text = field.text().await.unwrap_or_default();
            }
        }
    }
    if user_text.is_empty() {
        user_text = CONNECT_MARKER.to_string();
    }

    let greeting = if user_text == CONNECT_MARKER {
        initial_greeting(&state).await
    } else {
        "Selamat datang!".to_string()
    };

    match avatar.create_stream().await {
        Ok(session) => Json(json!({
            "stream_id_for_path": session.stream_id,
            "session_id_for_body": session.session_id,
            "offer_sdp": session.offer,
            "ice_servers": session.ice_servers,
            "agent_initial_greeting": greeting,
        }))
        .into_response(),
        Err(e) => {
            ApiError::InternalServerError(format!("Failed to create avatar stream: {}", e))
                .into_response()
        }
    }
}

/// Asks the answer backend for a short greeting; falls back to a fixed one
/// on any failure so the connection flow is never blocked by the model.
async fn initial_greeting(state: &AppState) -> String {
    let Some(answer) = &state.answer else {
        return FALLBACK_GREETING.to_string();
    };
    match answer
        .generate("Berikan sapaan singkat untuk memulai percakapan.")
        .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "greeting generation failed, using fallback");
            FALLBACK_GREETING.to_string()
        }
    }
}

/// Handler for `POST /get_agent_response`.
///
/// Accepts either an `audio_data` file (transcribed first) or a
/// `text_input` form field, and returns the model's answer together with
/// the user text that was processed.
pub async fn get_agent_response_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut audio_data: Option<Vec<u8>> = None;
    let mut text_input: Option<String> = None;

    if let Ok(mut form) = multipart {
        loop {
            match form.next_field().await {
                Ok(Some(field)) => {
                    let name = field.name().map(str::to_string);
                    match name.as_deref() {
                        Some("audio_data") => {
                            audio_data = field.bytes().await.ok().map(|b| b.to_vec());
                        }
                        Some("text_input") => {
                            text_input = field.text().await.ok();
                        }
                        _ => {}
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read multipart field");
                    break;
                }
            }
        }
    }

    let user_text = if let Some(audio) = audio_data {
        match transcribe_upload(&state, &audio).await {
            Some(text) => text,
            None => {
                return ApiError::BadRequest("Could not transcribe audio.".to_string())
                    .into_response()
            }
        }
    } else if let Some(text) = text_input {
        text
    } else {
        return ApiError::BadRequest("No input provided".to_string()).into_response();
    };

    if user_text.trim().is_empty() {
        return ApiError::BadRequest("Input text is empty".to_string()).into_response();
    }

    let result = match &state.answer {
        Some(answer) => answer.generate(&user_text).await.map_err(|e| {
            tracing::error!(error = %e, "answer generation failed");
        }),
        None => {
            tracing::error!("answer backend not configured");
            Err(())
        }
    };

    match result {
        Ok(agent_response_text) => Json(json!({
            "agent_response_text": agent_response_text,
            "user_text_processed": user_text,
        }))
        .into_response(),
        Err(()) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": ANSWER_FAILURE_MESSAGE,
                "user_text_processed": user_text,
            })),
        )
            .into_response(),
    }
}

/// Writes the uploaded audio to a per-request temp file inside the uploads
/// directory, transcribes it, and returns the transcript. The temp file is
/// removed on drop — success, transcription failure, or early return.
async fn transcribe_upload(state: &AppState, audio: &[u8]) -> Option<String> {
    let Some(speech) = &state.speech else {
        tracing::error!("speech backend not configured");
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&state.upload_dir) {
        tracing::error!(dir = %state.upload_dir, error = %e, "failed to create uploads directory");
        return None;
    }

    let temp = match tempfile::Builder::new()
        .prefix("recorded_audio_")
        .suffix(".wav")
        .tempfile_in(&state.upload_dir)
    {
        Ok(temp) => temp,
        Err(e) => {
            tracing::error!(error = %e, "failed to create temp audio file");
            return None;
        }
    };

    if let Err(e) = tokio::fs::write(temp.path(), audio).await {
        tracing::error!(error = %e, "failed to write temp audio file");
        return None;
    }

    match speech.transcribe_file(temp.path()).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "transcription failed");
            None
        }
    }
}
