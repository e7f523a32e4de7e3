//! Generative-answer adapter for the Wicara relay.
//!
//! Issues one `generateContent` call per question with a constant system
//! instruction (answer from the grounded documents when available, general
//! knowledge otherwise, always in Indonesian) and an optional managed
//! document-retrieval tool. The reply is the concatenation of all
//! text-typed parts of the first candidate, in order; non-text parts
//! (grounding metadata and the like) are logged, never returned.
//!
//! Failures are typed — the router decides how to present them. This
//! adapter never encodes an error as answer text.

pub mod error;

pub use error::AnswerError;

use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

/// System instruction sent with every request. Matches the assistant's
/// deployment: document-grounded answers when the retrieval tool applies,
/// general knowledge otherwise, responses in Indonesian.
const SYSTEM_INSTRUCTION: &str = "Anda adalah AI asisten yang bertugas menjawab pertanyaan hanya berdasarkan konten dari dokumen yang diunggah (jika ada). \
Gunakan hanya informasi yang terdapat di dalam dokumen ini jika sumbernya adalah dokumen. \
Jika pertanyaan bersifat umum dan tidak merujuk ke dokumen, Anda boleh menggunakan pengetahuan umum Anda. \
Jangan menambahkan informasi dari luar yang tidak relevan, atau asumsi pribadi yang tidak didukung. \
Berikan jawaban yang akurat dan sedetail mungkin. \
Selalu berikan respons dalam Bahasa Indonesia yang baik, jelas, dan mudah dipahami.";

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

/// Configuration for the generative-answer backend.
#[derive(Clone, Deserialize)]
pub struct AnswerConfig {
    /// Base URL override. When unset, the regional endpoint is derived
    /// from `location`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static bearer credential for the answer API.
    pub access_token: String,

    /// Cloud project that owns the model and the search datastore.
    pub project_id: String,

    /// Model serving region.
    #[serde(default = "default_location")]
    pub location: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Managed search datastore id for answer grounding. When unset, the
    /// retrieval tool is omitted and the model answers ungrounded.
    #[serde(default)]
    pub datastore_id: Option<String>,
}

impl fmt::Debug for AnswerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerConfig")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("datastore_id", &self.datastore_id)
            .finish()
    }
}

impl AnswerConfig {
    pub fn new(access_token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            access_token: access_token.into(),
            project_id: project_id.into(),
            location: default_location(),
            model: default_model(),
            datastore_id: None,
        }
    }

    fn base_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.location),
        }
    }

    /// Full resource path of the grounding datastore, if one is configured.
    fn datastore_path(&self) -> Option<String> {
        let id = self.datastore_id.as_deref()?.trim();
        if id.is_empty() {
            return None;
        }
        Some(format!(
            "projects/{}/locations/global/collections/default_collection/dataStores/{}",
            self.project_id, id
        ))
    }
}

/// Client for one-shot question answering.
#[derive(Debug, Clone)]
pub struct AnswerClient {
    http: reqwest::Client,
    config: AnswerConfig,
}

impl AnswerClient {
    pub fn new(config: AnswerConfig) -> Self {
        let http = reqwest::Client::builder().build().unwrap_or_default();
        Self { http, config }
    }

    /// Asks the model one question. Single attempt, no retry.
    pub async fn generate(&self, text_input: &str) -> Result<String, AnswerError> {
        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.config.base_endpoint(),
            self.config.project_id,
            self.config.location,
            self.config.model,
        );

        let mut request = json!({
            "contents": [{ "role": "user", "parts": [{ "text": text_input }] }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        });
        if let Some(datastore) = self.config.datastore_path() {
            request["tools"] =
                json!([{ "retrieval": { "vertexAiSearch": { "datastore": datastore } } }]);
        }

        tracing::info!(chars = text_input.len(), "sending question to answer model");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body,
                "answer model call failed"
            );
            return Err(AnswerError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let response: Value = resp.json().await?;
        match extract_candidate_text(&response) {
            Some(text) => {
                tracing::info!(chars = text.len(), "answer model replied");
                Ok(text)
            }
            None => {
                tracing::error!(response = %response, "answer response unexpected or empty");
                Err(AnswerError::EmptyResponse)
            }
        }
    }
}

/// Concatenates the text parts of the first candidate, in order. Non-text
/// parts are logged and skipped. Returns `None` when the response carries
/// no text at all.
fn extract_candidate_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let mut full_text = String::new();
    for part in parts {
        match part.get("text").and_then(Value::as_str) {
            Some(text) => full_text.push_str(text),
            None => tracing::info!(part = %part, "skipping non-text response part"),
        }
    }

    if full_text.is_empty() {
        None
    } else {
        Some(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml_str: &str) -> AnswerConfig {
        toml::from_str(toml_str).expect("parse answer config")
    }

    #[test]
    fn extracts_text_parts_in_order() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Jawaban " },
                        { "text": "lengkap." }
                    ]
                }
            }]
        });
        assert_eq!(
            extract_candidate_text(&response).as_deref(),
            Some("Jawaban lengkap.")
        );
    }

    #[test]
    fn skips_non_text_parts() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Jawaban." },
                        { "retrieval": { "source": "datastore" } }
                    ]
                }
            }]
        });
        assert_eq!(extract_candidate_text(&response).as_deref(), Some("Jawaban."));
    }

    #[test]
    fn only_first_candidate_is_read() {
        let response = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "pertama" }] } },
                { "content": { "parts": [{ "text": "kedua" }] } }
            ]
        });
        assert_eq!(extract_candidate_text(&response).as_deref(), Some("pertama"));
    }

    #[test]
    fn empty_or_malformed_responses_yield_none() {
        assert!(extract_candidate_text(&json!({})).is_none());
        assert!(extract_candidate_text(&json!({ "candidates": [] })).is_none());
        assert!(extract_candidate_text(&json!({
            "candidates": [{ "content": { "parts": [] } }]
        }))
        .is_none());
        assert!(extract_candidate_text(&json!({
            "candidates": [{ "content": { "parts": [{ "retrieval": {} }] } }]
        }))
        .is_none());
    }

    #[test]
    fn datastore_path_is_built_from_config() {
        let config = config(
            r#"
            access_token = "tok"
            project_id = "demo-project"
            datastore_id = "docs-123"
            "#,
        );
        assert_eq!(
            config.datastore_path().as_deref(),
            Some(
                "projects/demo-project/locations/global/collections/default_collection/dataStores/docs-123"
            )
        );
    }

    #[test]
    fn missing_or_blank_datastore_disables_grounding() {
        let config = config(
            r#"
            access_token = "tok"
            project_id = "demo-project"
            "#,
        );
        assert!(config.datastore_path().is_none());

        let config = self::config(
            r#"
            access_token = "tok"
            project_id = "demo-project"
            datastore_id = "  "
            "#,
        );
        assert!(config.datastore_path().is_none());
    }

    #[test]
    fn endpoint_defaults_to_regional_host() {
        let config = config(
            r#"
            access_token = "tok"
            project_id = "demo-project"
            "#,
        );
        assert_eq!(
            config.base_endpoint(),
            "https://us-central1-aiplatform.googleapis.com"
        );
    }

    #[test]
    fn endpoint_override_wins() {
        let config = config(
            r#"
            access_token = "tok"
            project_id = "demo-project"
            endpoint = "http://127.0.0.1:9999/"
            "#,
        );
        assert_eq!(config.base_endpoint(), "http://127.0.0.1:9999");
    }

    #[test]
    fn debug_redacts_access_token() {
        let config = config(
            r#"
            access_token = "super-secret"
            project_id = "demo-project"
            "#,
        );
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
