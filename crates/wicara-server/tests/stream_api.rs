//! Stream lifecycle routes tested against a stub avatar API listening on
//! an ephemeral local port.

use axum::body::Body;
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use wicara_avatar::{AvatarClient, AvatarConfig};
use wicara_server::{app, AppState};

async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Stub that answers all four lifecycle calls the way the real avatar API
/// shapes them.
async fn spawn_avatar_stub() -> String {
    let router = Router::new()
        .route(
            "/talks/streams",
            post(|| async {
                Json(json!({
                    "id": "s1",
                    "session_id": "sess1",
                    "offer": { "type": "offer", "sdp": "v=0" },
                    "ice_servers": [{ "urls": ["stun:stun.example.com:3478"] }]
                }))
            }),
        )
        .route(
            "/talks/streams/{stream_id}/sdp",
            post(
                |Path(stream_id): Path<String>, Json(body): Json<Value>| async move {
                    Json(json!({
                        "received_for": stream_id,
                        "session_id": body["session_id"],
                    }))
                },
            ),
        )
        .route(
            "/talks/streams/{stream_id}",
            post(
                |Path(stream_id): Path<String>, Json(body): Json<Value>| async move {
                    Json(json!({
                        "stream": stream_id,
                        "script_type": body["script"]["type"],
                        "voice_id": body["script"]["provider"]["voice_id"],
                    }))
                },
            )
            .delete(|| async { "" }),
        );
    spawn_stub(router).await
}

fn state_with_avatar(base_url: String) -> AppState {
    let config = AvatarConfig {
        base_url,
        api_key: "test-key".to_string(),
        source_url: "https://example.com/avatar.jpg".to_string(),
        voice_id: "id-ID-GadisNeural".to_string(),
    };
    AppState {
        speech: None,
        answer: None,
        avatar: Some(Arc::new(AvatarClient::new(config))),
        upload_dir: std::env::temp_dir().display().to_string(),
    }
}

fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn initiate_returns_session_identifiers_and_greeting() {
    let base = spawn_avatar_stub().await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/initiate_did_stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["stream_id_for_path"], "s1");
    assert_eq!(json["session_id_for_body"], "sess1");
    assert_eq!(json["offer_sdp"]["type"], "offer");
    assert!(json["ice_servers"].is_array());
    // No answer backend configured: the fixed fallback greeting is used and
    // must be non-empty.
    assert!(!json["agent_initial_greeting"]
        .as_str()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sdp_answer_is_relayed_to_the_stream_path() {
    let base = spawn_avatar_stub().await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(json_post(
            "/submit_sdp_answer",
            r#"{
                "stream_id_for_path": " s1 ",
                "session_id_for_body": "sess1",
                "sdp_answer": { "type": "answer", "sdp": "v=0" }
            }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "sdp_answer_submitted");
    // Path id was trimmed before the relay call.
    assert_eq!(json["d_id_response"]["received_for"], "s1");
    assert_eq!(json["d_id_response"]["session_id"], "sess1");
}

#[tokio::test]
async fn start_talk_sends_the_fixed_voice_script() {
    let base = spawn_avatar_stub().await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(json_post(
            "/start_talk_stream",
            r#"{
                "stream_id_for_path": "s1",
                "session_id_for_body": "sess1",
                "text_to_speak": "Halo dunia"
            }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "talk_stream_started");
    assert_eq!(json["d_id_response"]["script_type"], "text");
    assert_eq!(json["d_id_response"]["voice_id"], "id-ID-GadisNeural");
}

#[tokio::test]
async fn destroy_relays_the_delete_and_defaults_empty_bodies_to_ok() {
    let base = spawn_avatar_stub().await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(json_post(
            "/destroy_did_session",
            r#"{ "stream_id_for_path": "s1", "session_id_for_body": "sess1" }"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "session_destroyed");
    assert_eq!(json["d_id_response"], "OK");
}

#[tokio::test]
async fn upstream_create_failure_is_surfaced_as_500() {
    let router = Router::new().route(
        "/talks/streams",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream boom") }),
    );
    let base = spawn_stub(router).await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/initiate_did_stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("Failed to create avatar stream"));
    assert!(error.contains("500"));
}

#[tokio::test]
async fn incomplete_create_response_is_surfaced_as_500() {
    let router = Router::new().route(
        "/talks/streams",
        post(|| async { Json(json!({ "id": "s1" })) }),
    );
    let base = spawn_stub(router).await;
    let app = app(state_with_avatar(base));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/initiate_did_stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("session_id"));
}
