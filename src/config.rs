//! Configuration management module
//!
//! Loads and validates environment-based configuration.

use serde::Deserialize;
use std::env;
use thiserror::Error;

use crate::alerts::TransitionPolicy;
use crate::validation::InputConstraints;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid number format in environment variable {0}")]
    ParseError(&'static str),

    #[error("Unknown alert transition policy: {0}")]
    UnknownPolicy(String),

    #[error("Environment variable {0} is out of range")]
    OutOfRange(&'static str),
}

/// Server configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// External generator settings
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSettings {
    /// Absent key means every generator call fails with a configuration error
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Tourists requested per bulk generation
    pub tourist_count: u32,
}

/// Alert lifecycle settings
#[derive(Debug, Clone, Deserialize)]
pub struct AlertSettings {
    pub transition_policy: TransitionPolicy,
}

/// WebSocket push settings
#[derive(Debug, Clone, Deserialize)]
pub struct WsSettings {
    /// Interval in milliseconds between dashboard change checks
    pub push_interval_ms: u64,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub generator: GeneratorSettings,
    pub alerts: AlertSettings,
    pub ws: WsSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|_| SettingsError::ParseError("SERVER_PORT"))?;

        let tourist_count: u32 = env::var("GENERATION_COUNT")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .map_err(|_| SettingsError::ParseError("GENERATION_COUNT"))?;
        let count_range =
            InputConstraints::GENERATION_COUNT_MIN..=InputConstraints::GENERATION_COUNT_MAX;
        if !count_range.contains(&tourist_count) {
            return Err(SettingsError::OutOfRange("GENERATION_COUNT"));
        }

        let push_interval_ms: u64 = env::var("WS_PUSH_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .map_err(|_| SettingsError::ParseError("WS_PUSH_INTERVAL_MS"))?;
        // The push timer needs a non-zero period
        if push_interval_ms == 0 {
            return Err(SettingsError::OutOfRange("WS_PUSH_INTERVAL_MS"));
        }

        let transition_policy = match env::var("ALERT_TRANSITION_POLICY") {
            Ok(raw) => raw
                .parse::<TransitionPolicy>()
                .map_err(|_| SettingsError::UnknownPolicy(raw))?,
            Err(_) => TransitionPolicy::default(),
        };

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            server: ServerSettings {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
                port,
            },
            generator: GeneratorSettings {
                api_key,
                base_url: env::var("GEMINI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.into()),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into()),
                tourist_count,
            },
            alerts: AlertSettings { transition_policy },
            ws: WsSettings { push_interval_ms },
        })
    }
}
