//! Conversation state and the single-flight submission rule
//!
//! Every change to the transcript goes through [`ConversationStore::submit`] or
//! [`ConversationStore::resolve`]. A submit that is accepted hands back a
//! [`Ticket`]; only that ticket can close the request again, so each accepted
//! submit is resolved exactly once.

use tracing::{debug, warn};

use crate::reply::Reply;
use crate::state::{ChatMessage, GREETING};

/// Proof of the one outstanding request. Deliberately not `Clone`.
#[derive(Debug)]
pub struct Ticket {
    seq: u64,
}

/// An accepted submit: the ticket to resolve with, plus the history to send.
#[derive(Debug)]
pub struct Submission {
    pub ticket: Ticket,
    /// Conversation messages in order, newest user message last. The greeting
    /// is display-only and not part of this.
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Appended(ChatMessage),
    PendingChanged(bool),
    DraftChanged,
}

type Observer = Box<dyn FnMut(&StoreEvent) + Send>;

pub struct ConversationStore {
    history: Vec<ChatMessage>,
    greeting_len: usize,
    pending: Option<u64>,
    next_seq: u64,
    draft: String,
    revision: u64,
    observers: Vec<Observer>,
}

impl ConversationStore {
    /// A new session seeded with the assistant greeting.
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.history.push(ChatMessage::assistant(GREETING));
        store.greeting_len = 1;
        store
    }

    /// A new session with no greeting.
    pub fn empty() -> Self {
        Self {
            history: Vec::new(),
            greeting_len: 0,
            pending: None,
            next_seq: 0,
            draft: String::new(),
            revision: 0,
            observers: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Bumped on every mutation, for renderers that poll.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&StoreEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Replace the draft. Allowed while a request is outstanding.
    pub fn edit_draft(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text == self.draft {
            return;
        }
        self.draft = text;
        self.changed(StoreEvent::DraftChanged);
    }

    /// Append a user message and open a request.
    ///
    /// Returns `None` without touching anything when `text` is blank or a
    /// request is already outstanding.
    pub fn submit(&mut self, text: &str) -> Option<Submission> {
        if text.trim().is_empty() {
            debug!("ignoring blank submit");
            return None;
        }
        if let Some(seq) = self.pending {
            debug!(outstanding = seq, "ignoring submit while a request is pending");
            return None;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending = Some(seq);

        let message = ChatMessage::user(text);
        self.history.push(message.clone());
        self.changed(StoreEvent::Appended(message));

        if !self.draft.is_empty() {
            self.draft.clear();
            self.changed(StoreEvent::DraftChanged);
        }
        self.changed(StoreEvent::PendingChanged(true));

        debug!(seq, messages = self.history.len(), "submit accepted");
        Some(Submission {
            ticket: Ticket { seq },
            history: self.history[self.greeting_len..].to_vec(),
        })
    }

    /// Close the request opened by `ticket`, appending the assistant reply or
    /// the fallback text. Always leaves the store not pending.
    pub fn resolve(&mut self, ticket: Ticket, reply: Reply) {
        if self.pending != Some(ticket.seq) {
            warn!(seq = ticket.seq, "ticket does not belong to this store; ignoring");
            return;
        }

        if let Reply::Failed(err) = &reply {
            warn!(seq = ticket.seq, code = ?err.code(), "completion failed: {err}");
        }

        let message = ChatMessage::assistant(reply.into_text());
        self.history.push(message.clone());
        self.changed(StoreEvent::Appended(message));

        self.pending = None;
        self.changed(StoreEvent::PendingChanged(false));
    }

    fn changed(&mut self, event: StoreEvent) {
        self.revision += 1;
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
