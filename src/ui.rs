use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use number_master::{GuessRecord, Outcome, Provider};
use crate::app::{App, ConnectionStatus};

const IDLE_COMMENT: &str = "Enter a number to start the game.";

fn outcome_color(outcome: Outcome) -> Color {
    match outcome {
        Outcome::TooHigh => Color::Red,
        Outcome::TooLow => Color::Blue,
        Outcome::Correct => Color::Green,
    }
}

fn ellipsis(frame: u8) -> &'static str {
    match frame {
        0 => ".",
        1 => "..",
        _ => "...",
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [game_area, history_area] = Layout::horizontal([
        Constraint::Min(30),
        Constraint::Length(32),
    ])
    .areas(body_area);

    let [feedback_area, board_area, attempts_area, _] = Layout::vertical([
        Constraint::Length(6),
        Constraint::Length(6),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(game_area);

    render_feedback(app, frame, feedback_area);
    render_board(app, frame, board_area);
    render_attempts(app, frame, attempts_area);
    render_history(app.game.history(), frame, history_area);

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status_color = match app.connection_status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Error | ConnectionStatus::NotSet => Color::Red,
        ConnectionStatus::Checking | ConnectionStatus::Unchecked => Color::Yellow,
    };

    let title = Line::from(vec![
        Span::styled(" NUMBER MASTER ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("{} / {} ", app.current_provider.display_name(), app.selected_model),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("[{}]", app.connection_status.label()),
            Style::default().fg(status_color),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_feedback(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue))
        .title(" AI Game Master ");

    let line = if app.game.is_comment_pending() {
        Line::from(Span::styled(
            format!("Thinking{}", ellipsis(app.animation_frame)),
            Style::default().fg(Color::Blue),
        ))
    } else {
        let comment = if app.game.comment().is_empty() {
            IDLE_COMMENT
        } else {
            app.game.comment()
        };
        Line::from(Span::styled(
            format!("\"{}\"", comment),
            Style::default().add_modifier(Modifier::ITALIC),
        ))
    };

    let paragraph = Paragraph::new(line).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_board(app: &App, frame: &mut Frame, area: Rect) {
    if let Some(target) = app.game.revealed_target() {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green))
            .title(" You won! ");
        let text = vec![
            Line::from(Span::styled(
                format!("The number was {}.", target),
                Style::default().fg(Color::Green).bold(),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter or r to play again",
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let pending = app.game.is_comment_pending();
    let border_color = if pending { Color::DarkGray } else { Color::Yellow };
    let title = if pending {
        " Thinking... "
    } else {
        " Guess the number (1-100) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input_style = if pending {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White).bold()
    };
    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Yellow)),
            Span::styled(app.guess_input.clone(), input_style),
        ])),
        input_area,
    );

    if !pending {
        let cursor_x = (2 + app.guess_input.chars().count()).min(inner.width as usize) as u16;
        frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
    }

    if let Some(err) = &app.input_error {
        if inner.height > 2 {
            let error_area = Rect::new(inner.x, inner.y + 2, inner.width, inner.height - 2);
            frame.render_widget(
                Paragraph::new(err.as_str())
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: true }),
                error_area,
            );
        }
    }
}

fn render_attempts(app: &App, frame: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled("Attempts so far ", Style::default().fg(Color::Gray)),
        Span::styled(app.game.attempts().to_string(), Style::default().fg(Color::Cyan).bold()),
    ]);
    let block = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(Paragraph::new(line).block(block).centered(), area);
}

fn render_history(history: &[GuessRecord], frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" History ({}) ", history.len()));

    // Newest first
    let items: Vec<ListItem> = history
        .iter()
        .rev()
        .enumerate()
        .map(|(i, record)| {
            let color = outcome_color(record.outcome);
            let line = Line::from(vec![
                Span::styled(format!("{:>3}", record.value), Style::default().fg(color).bold()),
                Span::raw("  "),
                Span::styled(
                    record.submitted_at.format("%H:%M:%S").to_string(),
                    Style::default().fg(Color::Gray),
                ),
                Span::raw("  "),
                Span::styled(record.outcome.label(), Style::default().fg(color)),
            ]);
            let item = ListItem::new(line);
            if i == 0 {
                item.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                item
            }
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.show_api_key_input {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" save ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ]
    } else if app.show_provider_picker {
        vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" select ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" close ", label_style),
        ]
    } else if app.game.is_won() {
        vec![
            Span::styled(" Enter/r ", key_style),
            Span::styled(" play again ", label_style),
        ]
    } else {
        vec![
            Span::styled(" 0-9 ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" guess ", label_style),
            Span::styled(" ^R ", key_style),
            Span::styled(" restart ", label_style),
        ]
    };

    if !app.show_api_key_input && !app.show_provider_picker {
        hints.extend(vec![
            Span::styled(" P ", key_style),
            Span::styled(" provider ", label_style),
            Span::styled(" T ", key_style),
            Span::styled(" test ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]);
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();

    // Calculate popup size and position (centered)
    let popup_width = 45.min(area.width.saturating_sub(4));
    let popup_height = (providers.len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Provider ");

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let key_source = app.key_source(*provider);
            let is_current = *provider == app.current_provider;

            let status = match key_source {
                Some("env") => "(env var)",
                Some("config") => "(configured)",
                Some("local") => "(local)",
                _ => "(needs key)",
            };
            let prefix = if is_current { "* " } else { "  " };

            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if key_source.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(format!("{}{} {}", prefix, provider.display_name(), status)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.provider_picker_state);
}

/// Mask all but the last four characters of a key
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider_name = app.api_key_target_provider
        .map(|p| p.display_name())
        .unwrap_or("Provider");

    // Calculate popup size and position (centered)
    let popup_width = 60.min(area.width.saturating_sub(4));
    let popup_height = 7.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Enter API Key for {} ", provider_name));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));

    let instructions_area = Rect::new(inner.x, inner.y, inner.width, inner.height.min(1));
    frame.render_widget(instructions, instructions_area);

    // Input field, or the first line when the popup is squeezed
    let input_row = if inner.height > 2 { 2 } else { 0 };
    let input_area = Rect::new(inner.x, inner.y + input_row, inner.width, inner.height.min(1));
    let input = Paragraph::new(mask_key(&app.api_key_input))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let char_count = format!("{} characters", app.api_key_input.chars().count());
    let status = Paragraph::new(char_count)
        .style(Style::default().fg(Color::DarkGray));

    if inner.height > 4 {
        let status_area = Rect::new(inner.x, inner.y + 4, inner.width, 1);
        frame.render_widget(status, status_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use number_master::{Config, Game};
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        buffer_text(&terminal)
    }

    fn app() -> App {
        let mut config = Config::new();
        config.ollama_url = "http://127.0.0.1:1".to_string();
        let mut app = App::new(config, Provider::Ollama, None);
        app.game = Game::with_target(42);
        app
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key(""), "");
        assert_eq!(mask_key("abcd"), "****");
        assert_eq!(mask_key("sk-123456"), "*****...3456");
    }

    #[tokio::test]
    async fn target_is_hidden_until_won() {
        let mut app = app();
        app.guess_input = "50".to_string();
        app.submit_guess();

        let screen = draw(&mut app);
        assert!(screen.contains("NUMBER MASTER"));
        assert!(screen.contains("History (1)"));
        assert!(screen.contains("Too high"));
        assert!(screen.contains("Thinking"));
        assert!(!screen.contains("The number was"));

        let ticket = app.game.pending_ticket().unwrap();
        app.game.resolve_comment(ticket, "Nope.".to_string());
        app.guess_input = "42".to_string();
        app.submit_guess();

        let screen = draw(&mut app);
        assert!(screen.contains("The number was 42."));
        assert!(screen.contains("History (2)"));
    }

    #[tokio::test]
    async fn idle_screen_prompts_for_a_number() {
        let mut app = app();
        let screen = draw(&mut app);
        assert!(screen.contains(IDLE_COMMENT));
        assert!(screen.contains("Guess the number (1-100)"));
    }

    #[tokio::test]
    async fn input_error_is_shown() {
        let mut app = app();
        app.guess_input = "0".to_string();
        app.submit_guess();
        let screen = draw(&mut app);
        assert!(screen.contains("out of range"));
    }

    #[tokio::test]
    async fn api_key_popup_fits_short_terminals() {
        let mut app = app();
        app.show_api_key_input = true;
        app.api_key_target_provider = Some(Provider::Claude);
        app.api_key_input = "sk-123456".to_string();
        app.api_key_input_cursor = 9;

        for height in [1, 3, 5, 7, 11] {
            let mut terminal = Terminal::new(TestBackend::new(80, height)).unwrap();
            terminal
                .draw(|frame| {
                    let area = frame.area();
                    render_api_key_input(&app, frame, area);
                })
                .unwrap();
            let screen = buffer_text(&terminal);
            if height == 11 {
                assert!(screen.contains("Enter API Key for Claude"));
                assert!(screen.contains("9 characters"));
            }
        }
    }
}
