//! Chat feed: the session's turns, transient notices and the busy spinner.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::events::{Notice, Speaker, Turn};
use crate::ui::avatar::Avatars;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MAX_NOTICES: usize = 3;

pub struct HistoryView {
    notices: Vec<Notice>,
    /// Lines scrolled up from the bottom
    scroll: usize,
}

impl HistoryView {
    pub fn new() -> Self {
        Self { notices: Vec::new(), scroll: 0 }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > MAX_NOTICES {
            self.notices.remove(0);
        }
        self.scroll = 0;
    }

    pub fn clear_notices(&mut self) {
        self.notices.clear();
    }

    #[cfg(test)]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    pub fn render(
        &self,
        turns: &[Turn],
        avatars: &Avatars,
        busy_tick: Option<usize>,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let block = Block::default().borders(Borders::ALL).title("Chat");
        let inner = block.inner(area);
        block.render(area, buf);

        let width = inner.width.saturating_sub(4) as usize;
        let mut lines: Vec<Line> = Vec::new();

        if turns.is_empty() && busy_tick.is_none() {
            lines.push(Line::from(Span::styled(
                "Chat with Falcon-7B-Instruct",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Choose an example (F1-F3) or write your own. /help lists commands.",
                Style::default().fg(Color::Gray),
            )));
        }

        for turn in turns {
            let (avatar, style) = match turn.speaker {
                Speaker::Human => (avatars.user, Style::default().fg(Color::Cyan)),
                Speaker::Ai => (avatars.falcon, Style::default().fg(Color::Green)),
            };
            lines.push(Line::from(Span::styled(
                format!("{avatar} {}", turn.speaker.prefix()),
                Style::default().fg(Color::DarkGray),
            )));
            for text in wrap_text(&turn.text, width) {
                lines.push(Line::from(vec![Span::raw("  "), Span::styled(text, style)]));
            }
            lines.push(Line::from(""));
        }

        if let Some(tick) = busy_tick {
            lines.push(Line::from(vec![
                Span::styled(SPINNER[tick % SPINNER.len()], Style::default().fg(Color::Yellow)),
                Span::styled(" Generating response...", Style::default().fg(Color::Yellow)),
            ]));
        }

        for notice in &self.notices {
            let style = match notice {
                Notice::Info(_) => Style::default().fg(Color::Blue),
                Notice::Error(_) => Style::default().fg(Color::Red),
            };
            for text in wrap_text(notice.text(), width) {
                lines.push(Line::from(Span::styled(text, style)));
            }
        }

        let height = inner.height as usize;
        let max_scroll = lines.len().saturating_sub(height);
        let end = lines.len() - self.scroll.min(max_scroll);
        let start = end.saturating_sub(height);
        for (i, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

/// Wrap text to fit within the given width, keeping explicit line breaks.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;
        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + 1 + word_len > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        lines.push(current);
    }
    lines
}
