//! Chat session: transcript state machine over the remote assistant

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::backend::{ChatBackend, ChatRequest, ChatTransportError};
use crate::source::DocumentReference;

/// Assistant-role text appended when a turn fails
pub const FAILED_REPLY: &str = "Failed to get a response.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, append-only list of chat turns
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }
}

/// What happened to a send attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message was blank; nothing changed
    Ignored,
    /// A reply is still pending; nothing changed
    Busy,
    /// User message appended and the call started
    Sent,
}

/// Owns the transcript and at most one outstanding assistant call.
///
/// Sends while a reply is pending are rejected with [`SendOutcome::Busy`].
pub struct ChatSession {
    transcript: Transcript,
    pending_input: String,
    awaiting_reply: bool,
    backend: Arc<dyn ChatBackend>,
    reply_tx: Sender<Result<String, ChatTransportError>>,
    reply_rx: Receiver<Result<String, ChatTransportError>>,
}

impl ChatSession {
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (reply_tx, reply_rx) = flume::unbounded();
        Self {
            transcript: Transcript::default(),
            pending_input: String::new(),
            awaiting_reply: false,
            backend,
            reply_tx,
            reply_rx,
        }
    }

    /// Send the pending input buffer
    pub fn submit(&mut self, reference: &DocumentReference, page: usize) -> SendOutcome {
        let message = self.pending_input.clone();
        self.send(&message, reference, page)
    }

    /// Send a message about `page` of the referenced document
    pub fn send(
        &mut self,
        message: &str,
        reference: &DocumentReference,
        page: usize,
    ) -> SendOutcome {
        let message = message.trim();
        if message.is_empty() {
            return SendOutcome::Ignored;
        }
        if self.awaiting_reply {
            debug!("Chat send rejected: reply still pending");
            return SendOutcome::Busy;
        }

        self.transcript.push(ChatMessage::user(message));
        self.pending_input.clear();
        self.awaiting_reply = true;

        let request = ChatRequest {
            message: message.to_string(),
            file_url: reference.raw_content_url(),
            page_number: page,
        };
        info!("Chat turn started for page {page}");

        let backend = Arc::clone(&self.backend);
        let tx = self.reply_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("pagechat-chat".to_string())
            .spawn(move || {
                let _ = tx.send(backend.ask(&request));
            });

        if let Err(e) = spawned {
            let _ = self
                .reply_tx
                .send(Err(ChatTransportError::Transport(e.to_string())));
        }

        SendOutcome::Sent
    }

    /// Apply a finished reply. Returns true if the transcript changed.
    pub fn poll(&mut self) -> bool {
        let Ok(result) = self.reply_rx.try_recv() else {
            return false;
        };

        match result {
            Ok(reply) => {
                info!("Chat turn finished");
                self.transcript.push(ChatMessage::assistant(reply));
            }
            Err(e) => {
                warn!("Chat turn failed: {e}");
                self.transcript.push(ChatMessage::assistant(FAILED_REPLY));
            }
        }
        self.awaiting_reply = false;
        true
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    #[must_use]
    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.pending_input = input.into();
    }

    pub fn push_char(&mut self, c: char) {
        self.pending_input.push(c);
    }

    pub fn backspace(&mut self) {
        self.pending_input.pop();
    }
}
