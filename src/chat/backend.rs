//! Remote assistant endpoint

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

/// The chat call failed; surfaced to the user as a synthetic transcript entry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatTransportError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("chat backend answered with status {0}")]
    Status(u16),

    #[error("invalid chat response: {0}")]
    InvalidResponse(String),
}

/// Body of `POST <chat-backend>`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub file_url: String,
    pub page_number: usize,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    reply: String,
}

/// Sends one chat turn and waits for the reply.
///
/// Implementations block; the session calls them from a background thread.
pub trait ChatBackend: Send + Sync {
    fn ask(&self, request: &ChatRequest) -> Result<String, ChatTransportError>;
}

/// JSON-over-HTTP chat backend
pub struct HttpChatBackend {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpChatBackend {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            endpoint: endpoint.into(),
        }
    }
}

impl ChatBackend for HttpChatBackend {
    fn ask(&self, request: &ChatRequest) -> Result<String, ChatTransportError> {
        debug!(
            "Chat request for page {} of {}",
            request.page_number, request.file_url
        );

        let response = self
            .agent
            .post(&self.endpoint)
            .send_json(request)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => ChatTransportError::Status(code),
                ureq::Error::Transport(t) => ChatTransportError::Transport(t.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|e| ChatTransportError::Transport(e.to_string()))?;
        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<String, ChatTransportError> {
    serde_json::from_str::<ChatReply>(body)
        .map(|r| r.reply)
        .map_err(|e| ChatTransportError::InvalidResponse(e.to_string()))
}
