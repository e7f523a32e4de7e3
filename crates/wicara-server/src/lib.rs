//! Wicara server library logic.
//!
//! A thin relay between a browser client and three cloud services: a
//! speech-to-text API, a generative-answer API, and a talking-avatar
//! streaming API. Every route is a single pass-through call; the server
//! holds no session state and runs no background work.

pub mod api;
pub mod api_agent;
pub mod api_stream;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use wicara_answer::AnswerClient;
use wicara_avatar::AvatarClient;
use wicara_speech::SpeechClient;

/// Application state shared across all request handlers.
///
/// Each backend handle is `None` when its credential is not configured;
/// handlers check presence before use and fail that request alone.
#[derive(Clone)]
pub struct AppState {
    /// Speech-recognition backend, if configured.
    pub speech: Option<Arc<SpeechClient>>,
    /// Generative-answer backend, if configured.
    pub answer: Option<Arc<AnswerClient>>,
    /// Avatar streaming backend, if configured.
    pub avatar: Option<Arc<AvatarClient>>,
    /// Scratch directory for per-request uploaded-audio temp files.
    pub upload_dir: String,
}

/// Builds the application state from configuration, constructing one
/// client per configured backend.
pub fn build_state(config: &config::Config) -> AppState {
    AppState {
        speech: config
            .speech
            .clone()
            .map(|c| Arc::new(SpeechClient::new(c))),
        answer: config
            .answer
            .clone()
            .map(|c| Arc::new(AnswerClient::new(c))),
        avatar: config
            .avatar
            .clone()
            .map(|c| Arc::new(AvatarClient::new(c))),
        upload_dir: config.uploads.dir.clone(),
    }
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Larger limit for the audio-upload route (20 MiB); the speech adapter
/// enforces its own input cap below this.
const MAX_AUDIO_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    // The agent-response route accepts recorded audio and needs a larger
    // body limit than the rest of the API.
    let agent_routes = Router::new()
        .route(
            "/get_agent_response",
            post(api_agent::get_agent_response_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES));

    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/initiate_did_stream",
            post(api_agent::initiate_stream_handler),
        )
        .route(
            "/submit_sdp_answer",
            post(api_stream::submit_sdp_answer_handler),
        )
        .route("/start_talk_stream", post(api_stream::start_talk_handler))
        .route(
            "/destroy_did_session",
            post(api_stream::destroy_session_handler),
        )
        .merge(agent_routes);

    // Serve the browser client if the directory exists.
    // Configured via WICARA_CLIENT_DIR env var; defaults to "static".
    let client_dir =
        std::env::var("WICARA_CLIENT_DIR").unwrap_or_else(|_| "static".to_string());
    let router = if std::path::Path::new(&client_dir).join("index.html").exists() {
        tracing::info!(path = %client_dir, "serving client static files");
        let index = format!("{}/index.html", client_dir);
        router.fallback_service(ServeDir::new(&client_dir).fallback(ServeFile::new(index)))
    } else {
        tracing::info!(path = %client_dir, "client directory not found, skipping static file serving");
        router
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
