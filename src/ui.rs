use chrono::Local;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use defi_chat::{ChatMessage, ChatRole};
use crate::app::App;

/// Parse a line of text and style `**bold**` and `` `code` `` spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        let (closing, style, literal) = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                ("**", Style::default().add_modifier(Modifier::BOLD), "**")
            }
            '`' => ("`", Style::default().fg(Color::Green), "`"),
            _ => {
                current_text.push(c);
                continue;
            }
        };

        let mut inner = String::new();
        let mut found_close = false;
        while let Some(c) = chars.next() {
            if closing == "**" && c == '*' && chars.peek() == Some(&'*') {
                chars.next();
                found_close = true;
                break;
            }
            if closing == "`" && c == '`' {
                found_close = true;
                break;
            }
            inner.push(c);
        }

        if found_close && !inner.is_empty() {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }
            spans.push(Span::styled(inner, style));
        } else {
            // Unclosed marker, keep it literal
            current_text.push_str(literal);
            current_text.push_str(&inner);
            if found_close {
                current_text.push_str(literal);
            }
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let credential = if app.client.has_credential() {
        Span::raw("")
    } else {
        Span::styled(" [no API key]", Style::default().fg(Color::Red))
    };

    let title = Line::from(vec![
        Span::styled(" DeFi Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.model().to_string(), Style::default().fg(Color::White)),
        credential,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn message_header(msg: &ChatMessage) -> Line<'static> {
    let color = match msg.role {
        ChatRole::User => Color::Cyan,
        ChatRole::Assistant => Color::Yellow,
    };
    let time = msg.timestamp.with_timezone(&Local).format("%H:%M").to_string();

    Line::from(vec![
        Span::styled(
            msg.role.label(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", time), Style::default().fg(Color::DarkGray)),
    ])
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.store.history() {
        lines.push(message_header(msg));
        match msg.role {
            ChatRole::User => {
                lines.extend(msg.content.lines().map(|l| Line::from(l.to_string())));
            }
            ChatRole::Assistant => {
                lines.extend(msg.content.lines().map(parse_markdown_line));
            }
        }
        lines.push(Line::default());
    }

    if app.store.pending() {
        lines.push(Line::from(Span::styled(
            ChatRole::Assistant.label(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let transcript = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    // Measured without the block so borders are not counted
    let wrapped_lines = transcript.line_count(app.chat_width);
    app.set_transcript_lines(u16::try_from(wrapped_lines).unwrap_or(u16::MAX));

    let chat = transcript
        .block(chat_block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (title, border_color) = if app.store.pending() {
        (" Message (sending...) ", Color::DarkGray)
    } else {
        (" Message ", Color::Yellow)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else {
        (app.cursor + 1).saturating_sub(inner_width)
    };

    let visible_text: String = app
        .store
        .draft()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    let cursor_x = (app.cursor - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = if app.store.pending() {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use defi_chat::{CompletionClient, Reply, GREETING};
    use ratatui::{backend::TestBackend, Terminal};

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_markdown_bold_and_code() {
        let line = parse_markdown_line("Use **Aave** via `deposit()` carefully");
        assert_eq!(line.spans.len(), 5);
        assert_eq!(line.spans[1].content, "Aave");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(line.spans[3].content, "deposit()");
        assert_eq!(line.spans[3].style.fg, Some(Color::Green));
        assert_eq!(plain(&line), "Use Aave via deposit() carefully");
    }

    #[test]
    fn test_markdown_unclosed_markers_stay_literal() {
        assert_eq!(plain(&parse_markdown_line("**half bold")), "**half bold");
        assert_eq!(plain(&parse_markdown_line("a `tick")), "a `tick");
        assert_eq!(plain(&parse_markdown_line("2 * 3 = 6")), "2 * 3 = 6");
        assert_eq!(plain(&parse_markdown_line("empty ``")), "empty ``");
        assert!(parse_markdown_line("").spans.is_empty());
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_render_shows_transcript_and_typing_indicator() {
        let mut terminal = Terminal::new(TestBackend::new(120, 20)).unwrap();
        let mut app = App::new(CompletionClient::new(None));
        for c in "gm".chars() {
            app.insert_char(c);
        }
        let submission = app.take_submission().unwrap();

        terminal.draw(|f| render(&mut app, f)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains(&GREETING[..20]));
        assert!(text.contains("typing."));
        assert!(text.contains("WAITING"));
        assert!(text.contains("[no API key]"));

        app.resolve(submission.ticket, Reply::Text("gm, anon".into()));
        terminal.draw(|f| render(&mut app, f)).unwrap();
        let text = screen_text(&terminal);
        assert!(text.contains("gm, anon"));
        assert!(!text.contains("typing"));
        assert!(text.contains("READY"));
    }

    #[test]
    fn test_long_reply_is_followed_to_its_last_line() {
        let mut terminal = Terminal::new(TestBackend::new(30, 12)).unwrap();
        let mut app = App::new(CompletionClient::new(None));
        for c in "explain".chars() {
            app.insert_char(c);
        }
        let submission = app.take_submission().unwrap();
        // Word wrapping needs more rows than a plain char count suggests
        let reply = "Liquidity providers deposit paired assets into pools and earn swap fees \
            while carrying impermanent loss risk whenever relative prices drift apart FINALWORD";
        app.resolve(submission.ticket, Reply::Text(reply.into()));

        app.follow_transcript();
        terminal.draw(|f| render(&mut app, f)).unwrap();

        assert!(app.chat_scroll > 0);
        assert!(screen_text(&terminal).contains("FINALWORD"));
    }
}
