use super::GenerativeModel;
use crate::models::ContentPart;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// One scripted outcome for [`MockModel`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Empty,
    RateLimited,
    ExpiredKey,
    ServerError(u16),
}

impl MockReply {
    fn into_result(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Empty => Err(Error::EmptyResponse),
            Self::RateLimited => Err(Error::RateLimited("quota exceeded".to_string())),
            Self::ExpiredKey => Err(Error::InvalidCredential(
                "API key expired. Please renew the API key.".to_string(),
            )),
            Self::ServerError(status) => Err(Error::Api {
                status,
                message: "mock server error".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub at: Instant,
}

/// Scripted model. Replies are consumed in order; the last one repeats.
/// Clones share state, so a clone can be kept as a probe.
#[derive(Clone)]
pub struct MockModel {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_reply(MockReply::Text(text.to_string()))
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Text of the last part of the most recent call, i.e. the prompt.
    pub fn last_prompt(&self) -> Option<String> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .and_then(|call| match call.parts.last() {
                Some(ContentPart::Text(text)) => Some(text.clone()),
                _ => None,
            })
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate(
        &self,
        model: &str,
        parts: &[ContentPart],
        _temperature: f32,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            parts: parts.to_vec(),
            at: Instant::now(),
        });

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };

        reply
            .unwrap_or_else(|| MockReply::Text("Mock analysis".to_string()))
            .into_result()
    }
}
