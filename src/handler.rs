use std::future::Future;

use anyhow::{Result, anyhow};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error};
use defi_chat::{CompletionError, Reply, Submission, Ticket};
use crate::app::App;
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Completed(ticket, reply) => {
            debug!(ok = reply.is_ok(), "completion settled");
            app.resolve(ticket, reply);
        }
        AppEvent::InputFailed(reason) => {
            app.should_quit = true;
            return Err(anyhow!("terminal input failed: {reason}"));
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => start_completion(app, tx),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(2) / 2),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(2) / 2),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

/// Submit the draft and run the request in the background. The reply comes
/// back through the event loop as `AppEvent::Completed`.
fn start_completion(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    let Some(Submission { ticket, history }) = app.take_submission() else {
        return;
    };

    let client = app.client.clone();
    spawn_resolving(ticket, async move { client.complete(&history).await }, tx);
}

/// Run `request` on its own task and always report back with `ticket`, even
/// if that task panics, so the store never stays pending.
fn spawn_resolving<F>(ticket: Ticket, request: F, tx: &UnboundedSender<AppEvent>)
where
    F: Future<Output = Reply> + Send + 'static,
{
    let worker = tokio::spawn(request);
    let tx = tx.clone();
    tokio::spawn(async move {
        let reply = match worker.await {
            Ok(reply) => reply,
            Err(e) => {
                error!("completion task failed: {e}");
                Reply::Failed(CompletionError::Network(format!("completion task failed: {e}")))
            }
        };
        // Receiver is gone only when the app is quitting
        let _ = tx.send(AppEvent::Completed(ticket, reply));
    });
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        _ => {}
    }
}
