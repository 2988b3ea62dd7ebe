use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::App;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('r') => {
                app.reset_game();
                return;
            }
            _ => {}
        }
    }

    if app.show_api_key_input {
        handle_api_key_input(app, key);
    } else if app.show_provider_picker {
        handle_provider_picker(app, key);
    } else if app.game.is_won() {
        handle_won(app, key);
    } else {
        handle_playing(app, key);
    }
}

fn handle_playing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) if c.is_ascii_digit() => app.push_guess_char(c),
        KeyCode::Backspace => app.pop_guess_char(),
        KeyCode::Enter => app.submit_guess(),
        KeyCode::Esc => {
            if app.guess_input.is_empty() {
                app.should_quit = true;
            } else {
                app.guess_input.clear();
                app.input_error = None;
            }
        }
        KeyCode::Char('q') if app.guess_input.is_empty() => app.should_quit = true,
        KeyCode::Char('P') => app.open_provider_picker(),
        KeyCode::Char('T') => app.start_connection_test(),
        _ => {}
    }
}

fn handle_won(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Char('r') => app.reset_game(),
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('P') => app.open_provider_picker(),
        KeyCode::Char('T') => app.start_connection_test(),
        _ => {}
    }
}

fn handle_provider_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_provider_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => app.choose_picked_provider(),
        _ => {}
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_api_key_input(),
        KeyCode::Enter => app.confirm_api_key_input(),
        KeyCode::Backspace => {
            if app.api_key_input_cursor > 0 {
                app.api_key_input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_input_cursor += 1;
        }
        KeyCode::Left => {
            app.api_key_input_cursor = app.api_key_input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_input_cursor = (app.api_key_input_cursor + 1).min(char_count);
        }
        _ => {}
    }
}
