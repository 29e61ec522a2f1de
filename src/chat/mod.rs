//! Conversation with the remote assistant about the current page

mod backend;
mod session;

pub use backend::{ChatBackend, ChatRequest, ChatTransportError, HttpChatBackend};
pub use session::{ChatMessage, ChatSession, FAILED_REPLY, Role, SendOutcome, Transcript};
