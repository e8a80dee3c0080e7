//! Resilient remote call wrapper
//!
//! Every analysis funnels through [`RemoteCaller::call`]. One logical call is
//! up to `max_attempts` model requests with exponential backoff between them.
//! Rate limits, empty responses, timeouts and other API errors are retried;
//! an invalid or expired credential aborts immediately because no amount of
//! retrying can fix it.

use super::{GenerativeModel, DEFAULT_TEMPERATURE};
use crate::models::ContentPart;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Sleeps between attempts: `base * 2^i` for each attempt but the last.
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_attempts.max(1) - 1)
            .map(|i| {
                self.base_delay
                    .saturating_mul(1u32.checked_shl(i).unwrap_or(u32::MAX))
            })
            .collect()
    }
}

/// Retrying front end for a [`GenerativeModel`].
#[derive(Clone)]
pub struct RemoteCaller {
    model: Arc<dyn GenerativeModel>,
    policy: RetryPolicy,
    temperature: f32,
}

impl RemoteCaller {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            policy: RetryPolicy::default(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `parts ++ [prompt]` to `model`, retrying recoverable failures.
    ///
    /// Returns the first non-empty response text. Fails with
    /// [`Error::InvalidCredential`] as soon as the key is rejected, or with
    /// [`Error::RetriesExhausted`] once the attempt budget is spent.
    pub async fn call(&self, prompt: &str, parts: &[ContentPart], model: &str) -> Result<String> {
        let mut content = parts.to_vec();
        content.push(ContentPart::text(prompt));

        let max_attempts = self.policy.max_attempts.max(1);
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;
        let content_ref = content.as_slice();

        let result = RetryIf::spawn(
            self.policy.delays(),
            move || {
                let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
                async move { self.attempt(model, content_ref, attempt, max_attempts).await }
            },
            |e: &Error| e.is_retryable(),
        )
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) if !e.is_retryable() => Err(e),
            Err(e) => {
                let attempts = attempts.load(Ordering::SeqCst);
                error!(
                    attempts,
                    model,
                    "Failed to get response from model after {} attempts: {}",
                    attempts,
                    e
                );
                Err(Error::RetriesExhausted {
                    attempts,
                    message: e.to_string(),
                })
            }
        }
    }

    async fn attempt(
        &self,
        model: &str,
        content: &[ContentPart],
        attempt: u32,
        max_attempts: u32,
    ) -> Result<String> {
        let outcome = match tokio::time::timeout(
            self.policy.attempt_timeout,
            self.model.generate(model, content, self.temperature),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(self.policy.attempt_timeout)),
        };

        if let Err(e) = &outcome {
            self.log_failure(e, model, attempt, max_attempts);
        }
        outcome
    }

    fn log_failure(&self, e: &Error, model: &str, attempt: u32, max_attempts: u32) {
        let next_delay = if attempt < max_attempts {
            self.policy.delays().get(attempt as usize - 1).copied()
        } else {
            None
        };
        let retry_in = next_delay.map(|d| d.as_secs_f64());

        match e {
            Error::InvalidCredential(_) => {
                error!(
                    attempt,
                    model, "Model API key has expired or is invalid; not retrying"
                );
            }
            Error::RateLimited(_) => {
                warn!(
                    attempt,
                    max_attempts,
                    model,
                    retry_in_secs = ?retry_in,
                    "Rate limit hit on attempt {}",
                    attempt
                );
            }
            Error::EmptyResponse => {
                warn!(
                    attempt,
                    max_attempts,
                    model,
                    retry_in_secs = ?retry_in,
                    "Empty or invalid response from model on attempt {}",
                    attempt
                );
            }
            other => {
                warn!(
                    attempt,
                    max_attempts,
                    model,
                    retry_in_secs = ?retry_in,
                    error = %other,
                    "Error calling model on attempt {}",
                    attempt
                );
            }
        }
    }
}
