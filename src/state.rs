//! UI-agnostic conversation types
//!
//! These are shared by the store, the completion client and whatever renders
//! the transcript. None of them depend on a UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assistant message shown once when a conversation starts.
pub const GREETING: &str =
    "Hi! I'm your DeFi assistant. Ask me about protocols, yields, liquidity pools or wallets.";

/// Assistant content used whenever the service yields nothing usable.
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't get an answer right now. Please try again in a moment.";

/// A single entry in the chat transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "Assistant",
        }
    }
}
