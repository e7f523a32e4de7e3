//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use wicara_answer::AnswerConfig;
use wicara_avatar::AvatarConfig;
use wicara_speech::SpeechConfig;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Uploaded-audio scratch directory settings.
    #[serde(default)]
    pub uploads: UploadsConfig,

    /// Speech-recognition backend. When absent, audio input is rejected.
    #[serde(default)]
    pub speech: Option<SpeechConfig>,

    /// Generative-answer backend. When absent, every answer request fails
    /// with the fixed error payload.
    #[serde(default)]
    pub answer: Option<AnswerConfig>,

    /// Avatar streaming backend. When absent, stream routes return 500.
    #[serde(default)]
    pub avatar: Option<AvatarConfig>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "wicara_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Uploaded-audio scratch directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Directory where uploaded audio is written to a per-request temp
    /// file. The file is removed on every exit path.
    #[serde(default = "default_upload_dir")]
    pub dir: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `WICARA_HOST` overrides `server.host`
/// - `WICARA_PORT` overrides `server.port`
/// - `WICARA_LOG_LEVEL` overrides `logging.level`
/// - `WICARA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `WICARA_UPLOAD_DIR` overrides `uploads.dir`
/// - `D_ID_API_KEY` sets or overrides the avatar API credential
/// - `GOOGLE_ACCESS_TOKEN` sets or overrides both Google-facing credentials
/// - `PROJECT_ID` sets or overrides the answer backend project
/// - `DATASTORE_ID` sets or overrides the grounding datastore id
///
/// Credentials are validated for presence only: a missing credential leaves
/// the corresponding backend unconfigured, and the affected routes report
/// that per request instead of failing startup.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var("WICARA_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("WICARA_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("WICARA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("WICARA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(dir) = std::env::var("WICARA_UPLOAD_DIR") {
        config.uploads.dir = dir;
    }

    if let Ok(key) = std::env::var("D_ID_API_KEY") {
        match &mut config.avatar {
            Some(avatar) => avatar.api_key = key,
            None => config.avatar = Some(AvatarConfig::new(key)),
        }
    }

    if let Ok(token) = std::env::var("GOOGLE_ACCESS_TOKEN") {
        match &mut config.speech {
            Some(speech) => speech.access_token = token.clone(),
            None => config.speech = Some(SpeechConfig::new(token.clone())),
        }
        match (&mut config.answer, std::env::var("PROJECT_ID")) {
            (Some(answer), project) => {
                answer.access_token = token;
                if let Ok(project) = project {
                    answer.project_id = project;
                }
            }
            (None, Ok(project)) => config.answer = Some(AnswerConfig::new(token, project)),
            // Without a project id there is no answer backend to point at.
            (None, Err(_)) => {}
        }
    }
    if let Ok(datastore) = std::env::var("DATASTORE_ID") {
        if let Some(answer) = &mut config.answer {
            answer.datastore_id = Some(datastore);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_backends_unconfigured() {
        let config = Config::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.uploads.dir, "uploads");
        assert!(config.speech.is_none());
        assert!(config.answer.is_none());
        assert!(config.avatar.is_none());
    }

    #[test]
    fn parses_backend_sections() {
        let toml_str = r#"
            [server]
            port = 8080

            [speech]
            access_token = "tok"

            [answer]
            access_token = "tok"
            project_id = "demo"
            datastore_id = "docs-1"

            [avatar]
            api_key = "key"
        "#;

        let config: Config = toml::from_str(toml_str).expect("parse config");
        assert_eq!(config.server.port, 8080);
        assert!(config.speech.is_some());
        assert!(config.avatar.is_some());
        let answer = config.answer.expect("answer section");
        assert_eq!(answer.project_id, "demo");
        assert_eq!(answer.datastore_id.as_deref(), Some("docs-1"));
    }

    #[test]
    fn partial_sections_use_field_defaults() {
        let toml_str = r#"
            [avatar]
            api_key = "key"
        "#;

        let config: Config = toml::from_str(toml_str).expect("parse config");
        let avatar = config.avatar.expect("avatar section");
        assert_eq!(avatar.base_url, "https://api.d-id.com");
        assert_eq!(config.server.port, 5001);
    }
}
