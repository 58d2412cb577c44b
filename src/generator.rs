//! External generator contract
//!
//! The service never authors tourist records or incident reports itself; it
//! asks an external generator. Anything implementing [`ExternalGenerator`]
//! can be plugged in: the Gemini client in production, fixed fakes in tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Alert, Tourist};

/// Why a generator call produced nothing usable
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No credentials; no request was attempted
    #[error("generator credentials are not configured")]
    NotConfigured,

    /// Connection refused, DNS failure, reset, unreadable body
    #[error("generator unreachable: {0}")]
    Transport(String),

    /// Non-success HTTP status from the provider
    #[error("generator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Response arrived but does not have the expected shape
    #[error("generator returned a malformed payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ExternalGenerator: Send + Sync {
    /// Produce `count` synthetic tourist records. Implementations must
    /// validate the payload before returning it.
    async fn generate_tourists(&self, count: u32) -> Result<Vec<Tourist>, GenerationError>;

    /// Author an E-FIR for one alert/tourist pair. The text is opaque and is
    /// shown verbatim.
    async fn generate_report(&self, alert: &Alert, tourist: &Tourist)
        -> Result<String, GenerationError>;

    /// Whether calls can be attempted at all
    fn is_configured(&self) -> bool {
        true
    }
}
