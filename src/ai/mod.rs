//! Generative model integration
//!
//! A [`GenerativeModel`] performs exactly one request against the hosted
//! model. [`RemoteCaller`] wraps it with bounded retry, exponential backoff
//! and the fatal-credential short circuit; every analysis goes through it.

pub mod gemini;
pub mod mime;
pub mod mock;
pub mod retry;

pub use gemini::GeminiClient;
pub use mock::{MockModel, MockReply};
pub use retry::{RemoteCaller, RetryPolicy};

use crate::models::ContentPart;
use crate::Result;
use async_trait::async_trait;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Send `parts` to `model` once and return the non-empty response text.
    ///
    /// Implementations classify failures into the crate error variants
    /// (`RateLimited`, `InvalidCredential`, `Api`, `EmptyResponse`, ...) but
    /// never retry on their own.
    async fn generate(&self, model: &str, parts: &[ContentPart], temperature: f32)
        -> Result<String>;
}
