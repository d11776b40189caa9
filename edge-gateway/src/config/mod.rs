use config::{Config as Cfg, File};
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub session_service: SessionServiceSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionServiceSettings {
    /// Base URL of the session service.
    #[serde(default = "default_session_service_url")]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    /// Base URL of the application the gateway fronts.
    #[serde(default = "default_upstream_url")]
    pub url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_session_service_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_upstream_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SessionServiceSettings {
    fn default() -> Self {
        Self {
            url: default_session_service_url(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("gateway").required(false))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
