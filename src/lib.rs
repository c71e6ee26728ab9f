pub mod completion;
pub mod config;
pub mod reply;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use completion::CompletionClient;
pub use config::Config;
pub use reply::{CompletionError, Reply};
pub use state::{ChatMessage, ChatRole, FALLBACK_REPLY, GREETING};
pub use store::{ConversationStore, StoreEvent, Submission, Ticket};
