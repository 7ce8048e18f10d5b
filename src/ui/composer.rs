use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

use crate::ui::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// Single-line input box with a slash-command palette.
pub struct Composer {
    content: String,
    /// Byte offset, always on a char boundary
    cursor: usize,
    placeholder: String,
    has_focus: bool,
    busy: bool,
    command_entries: Vec<CommandEntry>,
    filtered: Vec<CommandEntry>,
    palette_open: bool,
    selected: usize,
}

impl Composer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            placeholder: placeholder.into(),
            has_focus: true,
            busy: false,
            command_entries: command_entries(),
            filtered: Vec::new(),
            palette_open: false,
            selected: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if self.palette_open && self.apply_selected_command() {
                    return ComposerResult::None;
                }
                if self.content.trim().is_empty() {
                    return ComposerResult::None;
                }
                let content = std::mem::take(&mut self.content);
                self.cursor = 0;
                self.close_palette();
                return match parse_slash_command(&content) {
                    Some(command) => ComposerResult::Command(command),
                    None => ComposerResult::Submitted(content.trim().to_string()),
                };
            }
            KeyCode::Up if self.palette_open => self.move_selection(-1),
            KeyCode::Down if self.palette_open => self.move_selection(1),
            KeyCode::Esc if self.palette_open => self.close_palette(),
            KeyCode::Tab if self.palette_open => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.content.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                self.refresh_palette();
            }
            KeyCode::Backspace => {
                if let Some(prev) = self.prev_boundary() {
                    self.content.remove(prev);
                    self.cursor = prev;
                    self.refresh_palette();
                }
            }
            KeyCode::Delete => {
                if self.cursor < self.content.len() {
                    self.content.remove(self.cursor);
                    self.refresh_palette();
                }
            }
            KeyCode::Left => {
                if let Some(prev) = self.prev_boundary() {
                    self.cursor = prev;
                }
            }
            KeyCode::Right => {
                if let Some(c) = self.content[self.cursor..].chars().next() {
                    self.cursor += c.len_utf8();
                }
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.content.len(),
            _ => {}
        }

        ComposerResult::None
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.content[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
    }

    /// The palette is open while the input is a bare `/word`.
    fn refresh_palette(&mut self) {
        let query = match self.content.strip_prefix('/') {
            Some(q) if !q.contains(char::is_whitespace) => q.to_lowercase(),
            _ => {
                self.close_palette();
                return;
            }
        };

        self.filtered = self
            .command_entries
            .iter()
            .filter(|entry| entry.keyword.starts_with(&query))
            .copied()
            .collect();
        self.palette_open = !self.filtered.is_empty();
        self.selected = self.selected.min(self.filtered.len().saturating_sub(1));
    }

    fn close_palette(&mut self) {
        self.palette_open = false;
        self.filtered.clear();
        self.selected = 0;
    }

    fn move_selection(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let len = self.filtered.len() as isize;
        self.selected = (self.selected as isize + delta).rem_euclid(len) as usize;
    }

    /// Complete the input to the highlighted command.
    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self.filtered.get(self.selected).copied() else {
            return false;
        };
        let completed = format!("/{}", entry.keyword);
        if self.content == completed {
            // already complete; let Enter submit it
            self.close_palette();
            return false;
        }
        self.content = completed;
        self.cursor = self.content.len();
        self.close_palette();
        true
    }

    /// Replace the content, e.g. with an example prompt.
    pub fn set_content(&mut self, text: &str) {
        self.content = text.to_string();
        self.cursor = self.content.len();
        self.close_palette();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let title = if self.busy { "You: (waiting for reply)" } else { "You:" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });
        let inner = block.inner(area);
        block.render(area, buf);

        if self.content.is_empty() {
            let placeholder = Line::from(Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner.x, inner.y, &placeholder, inner.width);
        } else {
            let mut content = self.content.clone();
            if self.has_focus {
                content.insert(self.cursor, '▌');
            }
            // keep the cursor in view on long input
            let width = inner.width as usize;
            let chars: Vec<char> = content.chars().collect();
            let skip = chars.len().saturating_sub(width);
            let visible: String = chars[skip..].iter().collect();
            buf.set_line(inner.x, inner.y, &Line::from(visible), inner.width);
        }

        if self.palette_open {
            self.render_palette(inner, buf);
        }
    }

    fn render_palette(&self, anchor: Rect, buf: &mut Buffer) {
        let height = (self.filtered.len().min(6) + 2) as u16;
        let area = Rect {
            x: anchor.x,
            y: anchor.y.saturating_sub(height + 1),
            width: anchor.width,
            height,
        };
        Clear.render(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Commands")
            .style(Style::default().fg(Color::Blue));
        let inner = block.inner(area);
        block.render(area, buf);

        for (index, entry) in self.filtered.iter().enumerate().take(inner.height as usize) {
            let style = if index == self.selected {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let line = Line::from(vec![
                Span::styled(format!("/{}", entry.keyword), style),
                Span::styled("  ", Style::default()),
                Span::styled(entry.description, Style::default().fg(Color::Gray)),
            ]);
            buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::commands::SlashCommand;

    fn press(composer: &mut Composer, code: KeyCode) -> ComposerResult {
        composer.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(composer: &mut Composer, text: &str) {
        for c in text.chars() {
            press(composer, KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_submits_trimmed_text_and_clears() {
        let mut composer = Composer::new("");
        type_str(&mut composer, " Hello ");
        assert_eq!(
            press(&mut composer, KeyCode::Enter),
            ComposerResult::Submitted("Hello".to_string())
        );
        assert_eq!(composer.content(), "");
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let mut composer = Composer::new("");
        type_str(&mut composer, "   ");
        assert_eq!(press(&mut composer, KeyCode::Enter), ComposerResult::None);
    }

    #[test]
    fn multibyte_editing() {
        let mut composer = Composer::new("");
        type_str(&mut composer, "héllo");
        press(&mut composer, KeyCode::Left);
        press(&mut composer, KeyCode::Left);
        press(&mut composer, KeyCode::Left);
        press(&mut composer, KeyCode::Backspace);
        assert_eq!(composer.content(), "hllo");
    }

    #[test]
    fn palette_completes_then_enter_runs_command() {
        let mut composer = Composer::new("");
        type_str(&mut composer, "/res");
        assert_eq!(press(&mut composer, KeyCode::Enter), ComposerResult::None);
        assert_eq!(composer.content(), "/reset");
        match press(&mut composer, KeyCode::Enter) {
            ComposerResult::Command(cmd) => assert_eq!(cmd.command, SlashCommand::Reset),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_with_argument_bypasses_palette() {
        let mut composer = Composer::new("");
        type_str(&mut composer, "/example 3");
        match press(&mut composer, KeyCode::Enter) {
            ComposerResult::Command(cmd) => {
                assert_eq!(cmd.command, SlashCommand::Example);
                assert_eq!(cmd.argument(), Some("3"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn set_content_moves_cursor_to_end() {
        let mut composer = Composer::new("");
        composer.set_content("abc");
        type_str(&mut composer, "d");
        assert_eq!(composer.content(), "abcd");
    }
}
