use ratatui::layout::Rect;
use defi_chat::{CompletionClient, ConversationStore, Reply, Submission, Ticket};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub store: ConversationStore,
    pub client: CompletionClient,

    // Input
    pub cursor: usize, // char position in the draft

    // Transcript viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, for scroll calculations
    pub chat_width: u16,  // inner width, for wrap calculations
    pub chat_area: Option<Rect>,
    transcript_lines: u16, // wrapped height, measured by `ui` each frame
    seen_revision: u64,
    follow_pending: bool,

    // 0-2 for the typing ellipsis
    pub animation_frame: u8,
}

impl App {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            should_quit: false,
            store: ConversationStore::new(),
            client,
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            transcript_lines: 0,
            seen_revision: 0,
            follow_pending: true,
            animation_frame: 0,
        }
    }

    // Draft editing
    pub fn insert_char(&mut self, c: char) {
        let mut draft = self.store.draft().to_string();
        draft.insert(char_to_byte_index(&draft, self.cursor), c);
        self.store.edit_draft(draft);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.remove_at_cursor();
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.draft_len() {
            self.remove_at_cursor();
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.draft_len());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.draft_len();
    }

    fn draft_len(&self) -> usize {
        self.store.draft().chars().count()
    }

    fn remove_at_cursor(&mut self) {
        let mut draft = self.store.draft().to_string();
        draft.remove(char_to_byte_index(&draft, self.cursor));
        self.store.edit_draft(draft);
    }

    /// Submit the current draft. `None` if it was blank or a reply is still pending.
    pub fn take_submission(&mut self) -> Option<Submission> {
        let text = self.store.draft().to_string();
        let submission = self.store.submit(&text)?;
        self.cursor = 0;
        Some(submission)
    }

    pub fn resolve(&mut self, ticket: Ticket, reply: Reply) {
        self.store.resolve(ticket, reply);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.store.pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Transcript scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
    }

    /// Mark the view to jump to the newest message if the conversation changed.
    /// The jump happens once `ui` has measured the new transcript.
    pub fn follow_transcript(&mut self) {
        let revision = self.store.revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.follow_pending = true;
        }
    }

    /// Record the transcript's wrapped height for the current frame.
    pub fn set_transcript_lines(&mut self, lines: u16) {
        self.transcript_lines = lines;
        if self.follow_pending {
            self.follow_pending = false;
            self.scroll_to_bottom();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn max_scroll(&self) -> u16 {
        self.transcript_lines.saturating_sub(self.visible_height())
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defi_chat::{ChatRole, CompletionError};

    fn test_app() -> App {
        App::new(CompletionClient::new(None))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    #[test]
    fn test_editing_is_utf8_safe() {
        let mut app = test_app();
        type_text(&mut app, "ETH→USDC");
        assert_eq!(app.cursor, 8);

        app.cursor_left();
        app.cursor_left();
        app.cursor_left();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.store.draft(), "ETHUSDC");

        app.cursor_home();
        app.delete();
        app.cursor_end();
        app.insert_char('!');
        assert_eq!(app.store.draft(), "THUSDC!");
        assert_eq!(app.cursor, 7);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut app = test_app();
        app.backspace();
        app.delete();
        app.cursor_left();
        app.cursor_right();
        assert_eq!(app.cursor, 0);
        assert_eq!(app.store.draft(), "");
    }

    #[test]
    fn test_submission_clears_draft_and_cursor() {
        let mut app = test_app();
        type_text(&mut app, "What is TVL?");

        let submission = app.take_submission().unwrap();
        assert_eq!(submission.history.len(), 1);
        assert_eq!(app.store.draft(), "");
        assert_eq!(app.cursor, 0);
        assert!(app.store.pending());
    }

    #[test]
    fn test_typing_allowed_while_pending_but_not_submitting() {
        let mut app = test_app();
        type_text(&mut app, "first");
        let submission = app.take_submission().unwrap();

        type_text(&mut app, "second");
        assert!(app.take_submission().is_none());
        assert_eq!(app.store.draft(), "second");
        assert_eq!(app.cursor, 6);

        app.resolve(submission.ticket, Reply::Failed(CompletionError::Network("reset".into())));
        assert!(!app.store.pending());
        assert_eq!(app.store.history().last().unwrap().role, ChatRole::Assistant);
        assert!(app.take_submission().is_some());
    }

    #[test]
    fn test_animation_only_runs_while_pending() {
        let mut app = test_app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        type_text(&mut app, "hi");
        let _submission = app.take_submission().unwrap();
        for _ in 0..4 {
            app.tick_animation();
        }
        assert_eq!(app.animation_frame, 1);
    }

    #[test]
    fn test_follow_waits_for_measured_height() {
        let mut app = test_app();
        app.chat_height = 4;
        app.set_transcript_lines(3);
        assert_eq!(app.chat_scroll, 0);

        type_text(&mut app, "question");
        let submission = app.take_submission().unwrap();
        app.resolve(submission.ticket, Reply::Text("answer".into()));
        app.follow_transcript();
        assert_eq!(app.chat_scroll, 0);

        app.set_transcript_lines(12);
        assert_eq!(app.chat_scroll, 8);

        app.scroll_up(2);
        app.follow_transcript();
        app.set_transcript_lines(12);
        assert_eq!(app.chat_scroll, 6);

        app.scroll_down(100);
        assert_eq!(app.chat_scroll, 8);
    }

    #[test]
    fn test_scroll_clamped_when_transcript_shrinks() {
        let mut app = test_app();
        app.chat_height = 4;
        app.set_transcript_lines(20);
        assert_eq!(app.chat_scroll, 16);

        app.set_transcript_lines(10);
        assert_eq!(app.chat_scroll, 6);
    }
}
