//! Talking-avatar streaming adapter for the Wicara relay.
//!
//! Wraps the four lifecycle calls of a remote avatar stream — create,
//! submit SDP answer, start talk, destroy — against the D-ID streaming
//! API. The adapter is a stateless proxy: it never tracks which state a
//! given stream is actually in, so out-of-order calls (e.g. talk before
//! the SDP answer was submitted) are rejected by the external service,
//! not here. The client holds the stream and session identifiers between
//! calls and drives the WebRTC negotiation itself.
//!
//! Every transition is one HTTPS call. Any transport failure or non-2xx
//! response surfaces as [`AvatarError`] carrying the upstream status and
//! body; no retry, no backoff.

pub mod error;

pub use error::AvatarError;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

fn default_base_url() -> String {
    "https://api.d-id.com".to_string()
}

fn default_source_url() -> String {
    "https://d-id-public-bucket.s3.us-west-2.amazonaws.com/alice.jpg".to_string()
}

fn default_voice_id() -> String {
    "id-ID-GadisNeural".to_string()
}

/// Configuration for the avatar streaming backend.
#[derive(Clone, Deserialize)]
pub struct AvatarConfig {
    /// Base URL of the avatar API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static credential, sent as `Authorization: Basic <key>`.
    pub api_key: String,

    /// Avatar portrait image used when creating a stream.
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Text-to-speech voice used for talk requests.
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
}

impl AvatarConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            api_key: api_key.into(),
            source_url: default_source_url(),
            voice_id: default_voice_id(),
        }
    }
}

impl fmt::Debug for AvatarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("source_url", &self.source_url)
            .field("voice_id", &self.voice_id)
            .finish()
    }
}

/// A freshly created avatar stream. The caller (ultimately the browser
/// client) is the sole holder of these identifiers between calls.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSession {
    /// Stream id, used in the URL path of subsequent calls.
    pub stream_id: String,
    /// Session id, echoed in the body of subsequent calls.
    pub session_id: String,
    /// SDP offer for the client-side WebRTC negotiation.
    pub offer: Value,
    /// ICE server list for the client-side WebRTC negotiation.
    pub ice_servers: Value,
}

/// Client for the avatar stream lifecycle.
#[derive(Debug, Clone)]
pub struct AvatarClient {
    http: reqwest::Client,
    config: AvatarConfig,
}

impl AvatarClient {
    pub fn new(config: AvatarConfig) -> Self {
        let http = reqwest::Client::builder().build().unwrap_or_default();
        Self { http, config }
    }

    fn auth_header(&self) -> String {
        format!("Basic {}", self.config.api_key)
    }

    fn stream_url(&self, stream_id: &str) -> String {
        format!(
            "{}/talks/streams/{}",
            self.config.base_url.trim_end_matches('/'),
            stream_id
        )
    }

    /// Creates a new stream for the configured avatar image. The response
    /// must carry both a stream id and a session id, else this fails.
    pub async fn create_stream(&self) -> Result<StreamSession, AvatarError> {
        let url = format!(
            "{}/talks/streams",
            self.config.base_url.trim_end_matches('/')
        );
        tracing::info!("creating avatar stream session");

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "source_url": self.config.source_url }))
            .send()
            .await?;
        let resp = check_status(resp, "create stream").await?;

        let data: Value = resp.json().await?;
        let session = session_from_response(&data)?;
        tracing::info!(
            stream_id = %session.stream_id,
            session_id = %session.session_id,
            "avatar stream created"
        );
        Ok(session)
    }

    /// Submits the client's SDP answer to finalize the media stream.
    pub async fn submit_sdp_answer(
        &self,
        stream_id: &str,
        session_id: &str,
        sdp_answer: &Value,
    ) -> Result<Value, AvatarError> {
        let url = format!("{}/sdp", self.stream_url(stream_id));
        tracing::info!(stream_id, "submitting SDP answer");

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "session_id": session_id, "answer": sdp_answer }))
            .send()
            .await?;
        let resp = check_status(resp, "submit SDP answer").await?;

        Ok(resp.json().await?)
    }

    /// Makes an existing live stream speak the given text. Repeatable any
    /// number of times while the session is live.
    pub async fn start_talk(
        &self,
        stream_id: &str,
        session_id: &str,
        text_to_speak: &str,
    ) -> Result<Value, AvatarError> {
        let url = self.stream_url(stream_id);
        tracing::info!(stream_id, chars = text_to_speak.len(), "starting talk");

        let payload = json!({
            "session_id": session_id,
            "script": {
                "type": "text",
                "input": text_to_speak,
                "provider": { "type": "microsoft", "voice_id": self.config.voice_id },
            },
            "config": { "stitch": true },
        });

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&payload)
            .send()
            .await?;
        let resp = check_status(resp, "start talk").await?;

        Ok(resp.json().await?)
    }

    /// Deletes the remote stream. Returns the upstream response body, or
    /// `"OK"` when it was empty.
    pub async fn destroy_stream(
        &self,
        stream_id: &str,
        session_id: &str,
    ) -> Result<String, AvatarError> {
        let url = self.stream_url(stream_id);
        tracing::info!(stream_id, "destroying avatar stream");

        let resp = self
            .http
            .delete(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&json!({ "session_id": session_id }))
            .send()
            .await?;
        let resp = check_status(resp, "destroy stream").await?;

        let body = resp.text().await.unwrap_or_default();
        if body.is_empty() {
            Ok("OK".to_string())
        } else {
            Ok(body)
        }
    }
}

/// Maps a non-2xx response to an upstream error, logging status and body.
async fn check_status(
    resp: reqwest::Response,
    context: &'static str,
) -> Result<reqwest::Response, AvatarError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(
        context,
        status = status.as_u16(),
        body = %body,
        "avatar API call failed"
    );
    Err(AvatarError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Builds a [`StreamSession`] from a create-stream response, requiring
/// non-empty `id` and `session_id` fields.
fn session_from_response(data: &Value) -> Result<StreamSession, AvatarError> {
    let stream_id = data
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AvatarError::IncompleteResponse("missing 'id' field".to_string()))?;
    let session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AvatarError::IncompleteResponse("missing 'session_id' field".to_string())
        })?;

    Ok(StreamSession {
        stream_id: stream_id.to_string(),
        session_id: session_id.to_string(),
        offer: data.get("offer").cloned().unwrap_or(Value::Null),
        ice_servers: data.get("ice_servers").cloned().unwrap_or(Value::Null),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_from_complete_response() {
        let data = json!({
            "id": "s1",
            "session_id": "sess1",
            "offer": { "type": "offer", "sdp": "v=0" },
            "ice_servers": [{ "urls": ["stun:stun.example.com:3478"] }]
        });

        let session = session_from_response(&data).expect("complete response");
        assert_eq!(session.stream_id, "s1");
        assert_eq!(session.session_id, "sess1");
        assert_eq!(session.offer["type"], "offer");
        assert!(session.ice_servers.is_array());
    }

    #[test]
    fn missing_stream_id_is_incomplete() {
        let data = json!({ "session_id": "sess1" });
        let err = session_from_response(&data).expect_err("must fail");
        assert!(matches!(err, AvatarError::IncompleteResponse(msg) if msg.contains("'id'")));
    }

    #[test]
    fn missing_session_id_is_incomplete() {
        let data = json!({ "id": "s1" });
        let err = session_from_response(&data).expect_err("must fail");
        assert!(
            matches!(err, AvatarError::IncompleteResponse(msg) if msg.contains("'session_id'"))
        );
    }

    #[test]
    fn blank_identifiers_are_incomplete() {
        let data = json!({ "id": "  ", "session_id": "sess1" });
        assert!(session_from_response(&data).is_err());
    }

    #[test]
    fn absent_offer_and_ice_servers_become_null() {
        let data = json!({ "id": "s1", "session_id": "sess1" });
        let session = session_from_response(&data).expect("parse");
        assert!(session.offer.is_null());
        assert!(session.ice_servers.is_null());
    }

    #[test]
    fn config_defaults_from_toml() {
        let config: AvatarConfig = toml::from_str(r#"api_key = "key""#).expect("parse");
        assert_eq!(config.base_url, "https://api.d-id.com");
        assert_eq!(config.voice_id, "id-ID-GadisNeural");
        assert!(config.source_url.ends_with("alice.jpg"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config: AvatarConfig = toml::from_str(r#"api_key = "super-secret""#).expect("parse");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
