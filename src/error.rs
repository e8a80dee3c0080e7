//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror,
//! plus the coarse [`ErrorKind`] used to decide whether a failure is worth
//! retrying.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse failure class attached to analysis outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// May succeed if the same request is sent again later.
    Transient,
    /// Can never succeed without operator action (bad credential, bad config).
    Fatal,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited by model API (status 429): {0}")]
    RateLimited(String),

    #[error("API key expired or invalid: {0}")]
    InvalidCredential(String),

    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Empty or invalid response received from model")]
    EmptyResponse,

    #[error("Model request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unable to process request after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("Interaction store is corrupt: {0}")]
    CorruptStore(String),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("PDF rasterization failed: {0}")]
    Rasterize(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredential(_) | Self::Config(_) | Self::EnvVar(_) => ErrorKind::Fatal,
            Self::RateLimited(_) | Self::Api { .. } | Self::EmptyResponse => ErrorKind::Transient,
            Self::RetriesExhausted { .. } => ErrorKind::Transient,
            _ => ErrorKind::Unknown,
        }
    }

    /// Whether another attempt of the same model request could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() != ErrorKind::Fatal
    }
}

pub type Result<T> = std::result::Result<T, Error>;
