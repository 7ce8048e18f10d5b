use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::events::StoredSession;
use crate::settings::{SettingField, Settings};

/// What the sidebar asks the app to do after a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SidebarAction {
    None,
    Confirm(Settings),
    Leave,
}

/// Settings form editing a draft copy; the live settings only change on
/// confirm.
pub struct Sidebar {
    fields: Vec<SettingField>,
    draft: Settings,
    selected: usize,
    has_focus: bool,
}

impl Sidebar {
    pub fn new(settings: Settings) -> Self {
        Self {
            fields: SettingField::all(),
            draft: settings,
            selected: 0,
            has_focus: false,
        }
    }

    #[cfg(test)]
    pub fn draft(&self) -> &Settings {
        &self.draft
    }

    pub fn selected_field(&self) -> SettingField {
        self.fields[self.selected]
    }

    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Throw away unconfirmed edits.
    pub fn revert(&mut self, settings: Settings) {
        self.draft = settings;
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> SidebarAction {
        if key.kind != KeyEventKind::Press {
            return SidebarAction::None;
        }
        let notches = if key.modifiers.contains(KeyModifiers::SHIFT) { 10 } else { 1 };

        match key.code {
            KeyCode::Up => {
                self.selected = self.selected.checked_sub(1).unwrap_or(self.fields.len() - 1);
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1) % self.fields.len();
            }
            KeyCode::Left => self.draft.step(self.selected_field(), -notches),
            KeyCode::Right => self.draft.step(self.selected_field(), notches),
            KeyCode::Enter => return SidebarAction::Confirm(self.draft),
            KeyCode::Esc | KeyCode::Tab => return SidebarAction::Leave,
            _ => {}
        }
        SidebarAction::None
    }

    pub fn render(
        &self,
        banner: &[&str],
        live: &Settings,
        stored: &[StoredSession],
        area: Rect,
        buf: &mut Buffer,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(banner.len() as u16 + 2),
                Constraint::Length(self.fields.len() as u16 * 2 + 5),
                Constraint::Min(3),
            ])
            .split(area);

        self.render_banner(banner, chunks[0], buf);
        self.render_settings(live, chunks[1], buf);
        render_stored(stored, chunks[2], buf);
    }

    fn render_banner(&self, banner: &[&str], area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("Falcon-7B-Instruct");
        let inner = block.inner(area);
        block.render(area, buf);
        for (i, row) in banner.iter().enumerate().take(inner.height as usize) {
            buf.set_line(
                inner.x,
                inner.y + i as u16,
                &Line::from(Span::styled(*row, Style::default().fg(Color::Yellow))),
                inner.width,
            );
        }
    }

    fn render_settings(&self, live: &Settings, area: Rect, buf: &mut Buffer) {
        let border = if self.has_focus { Color::Green } else { Color::Gray };
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Chat settings")
            .style(Style::default().fg(border));
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = vec![Line::from(Span::styled(
            "Confirming resets memory and chat history!",
            Style::default().fg(Color::Red),
        ))];

        for (index, field) in self.fields.iter().enumerate() {
            let is_selected = self.has_focus && index == self.selected;
            let label_style = if is_selected {
                Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            let changed = self.draft.display(*field) != live.display(*field);
            let value_style = if changed {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            };
            lines.push(Line::from(Span::styled(field.label(), label_style)));
            lines.push(Line::from(vec![
                Span::raw("  ◀ "),
                Span::styled(self.draft.display(*field), value_style),
                Span::raw(" ▶"),
            ]));
        }

        lines.push(Line::from(""));
        let hint = if self.has_focus {
            self.selected_field().help()
        } else {
            "Tab to edit, Enter to confirm"
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));

        for (i, line) in lines.iter().enumerate().take(inner.height as usize) {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}

fn render_stored(stored: &[StoredSession], area: Rect, buf: &mut Buffer) {
    let block = Block::default().borders(Borders::ALL).title("Stored chat sessions");
    let inner = block.inner(area);
    block.render(area, buf);

    if stored.is_empty() {
        buf.set_line(
            inner.x,
            inner.y,
            &Line::from(Span::styled("none", Style::default().fg(Color::DarkGray))),
            inner.width,
        );
        return;
    }

    for (i, session) in stored.iter().enumerate().take(inner.height as usize) {
        let line = Line::from(vec![
            Span::styled(format!("Conversation session {}", i + 1), Style::default().fg(Color::White)),
            Span::styled(
                format!("  {} · {} exchanges", session.saved_at.format("%m/%d %H:%M"), session.exchanges),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(sidebar: &mut Sidebar, code: KeyCode) -> SidebarAction {
        sidebar.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn edits_stay_in_draft_until_confirm() {
        let live = Settings::default();
        let mut sidebar = Sidebar::new(live);
        press(&mut sidebar, KeyCode::Right);
        assert_eq!(sidebar.draft().display(SettingField::Temperature), "0.2");

        match press(&mut sidebar, KeyCode::Enter) {
            SidebarAction::Confirm(settings) => {
                assert!((settings.temperature - 0.2).abs() < 1e-6);
                assert_eq!(settings.memory_k, live.memory_k);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn navigation_wraps_around() {
        let mut sidebar = Sidebar::new(Settings::default());
        press(&mut sidebar, KeyCode::Up);
        assert_eq!(sidebar.selected_field(), SettingField::MemoryK);
        press(&mut sidebar, KeyCode::Down);
        assert_eq!(sidebar.selected_field(), SettingField::Temperature);
    }

    #[test]
    fn shift_steps_ten_notches() {
        let mut sidebar = Sidebar::new(Settings::default());
        press(&mut sidebar, KeyCode::Down);
        press(&mut sidebar, KeyCode::Down);
        sidebar.handle_key(KeyEvent::new(KeyCode::Left, KeyModifiers::SHIFT));
        assert_eq!(sidebar.draft().max_new_tokens, 246);
    }

    #[test]
    fn revert_discards_draft() {
        let live = Settings::default();
        let mut sidebar = Sidebar::new(live);
        press(&mut sidebar, KeyCode::Right);
        sidebar.revert(live);
        assert_eq!(sidebar.draft(), &live);
        assert_eq!(press(&mut sidebar, KeyCode::Esc), SidebarAction::Leave);
    }
}
