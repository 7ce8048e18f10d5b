use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    Frame, Terminal,
};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{ProviderError, SessionError};
use crate::events::Notice;
use crate::llm::TextGenerator;
use crate::prompts::EXAMPLE_PROMPTS;
use crate::session::{ChatSession, PendingRequest};
use crate::settings::Settings;
use crate::storage::StorageManager;
use crate::ui::avatar::Avatars;
use crate::ui::commands::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::composer::{Composer, ComposerResult};
use crate::ui::history::HistoryView;
use crate::ui::sidebar::{Sidebar, SidebarAction};

const TICK: Duration = Duration::from_millis(100);
const SIDEBAR_WIDTH: u16 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Composer,
    Sidebar,
}

struct InFlight {
    pending: PendingRequest,
    reply: oneshot::Receiver<Result<String, ProviderError>>,
}

/// The chat screen: owns the session and every widget.
pub struct App {
    session: ChatSession,
    generator: Arc<dyn TextGenerator>,
    storage: StorageManager,
    avatars: Avatars,
    composer: Composer,
    history: HistoryView,
    sidebar: Sidebar,
    focus: Focus,
    in_flight: Option<InFlight>,
    tick: usize,
    should_quit: bool,
}

impl App {
    pub fn new(
        session: ChatSession,
        generator: Arc<dyn TextGenerator>,
        storage: StorageManager,
        avatars: Avatars,
    ) -> Self {
        let sidebar = Sidebar::new(*session.settings());
        Self {
            session,
            generator,
            storage,
            avatars,
            composer: Composer::new("I'm your AI assistant, how may I help you?"),
            history: HistoryView::new(),
            sidebar,
            focus: Focus::Composer,
            in_flight: None,
            tick: 0,
            should_quit: false,
        }
    }

    #[cfg(test)]
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[cfg(test)]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    fn notify(&mut self, notice: Notice) {
        match &notice {
            Notice::Info(text) => debug!(notice = %text, "info notice"),
            Notice::Error(text) => error!(notice = %text, "error notice"),
        }
        self.history.push_notice(notice);
    }

    fn info(&mut self, text: impl Into<String>) {
        self.notify(Notice::Info(text.into()));
    }

    fn fail(&mut self, text: impl Into<String>) {
        self.notify(Notice::Error(text.into()));
    }

    fn set_focus(&mut self, focus: Focus) {
        if focus == Focus::Composer {
            self.sidebar.revert(*self.session.settings());
        }
        self.focus = focus;
        self.composer.set_focus(focus == Focus::Composer);
        self.sidebar.set_focus(focus == Focus::Sidebar);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::PageUp => return self.history.scroll_up(5),
            KeyCode::PageDown => return self.history.scroll_down(5),
            KeyCode::F(n @ 1..=3) => return self.use_example(n as usize),
            _ => {}
        }

        match self.focus {
            Focus::Sidebar => match self.sidebar.handle_key(key) {
                SidebarAction::Confirm(settings) => self.confirm_settings(settings),
                SidebarAction::Leave => self.set_focus(Focus::Composer),
                SidebarAction::None => {}
            },
            Focus::Composer => {
                if key.code == KeyCode::Tab && !self.composer.content().starts_with('/') {
                    self.set_focus(Focus::Sidebar);
                    return;
                }
                match self.composer.handle_key(key) {
                    ComposerResult::Submitted(text) => self.submit(text),
                    ComposerResult::Command(command) => self.run_command(command),
                    ComposerResult::None => {}
                }
            }
        }
    }

    /// Start generating a reply to `text` in the background.
    pub fn submit(&mut self, text: String) {
        let pending = match self.session.begin_submission(&text) {
            Ok(pending) => pending,
            Err(SessionError::Busy) => {
                self.composer.set_content(&text);
                self.fail("Still generating the previous response.");
                return;
            }
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };

        self.history.clear_notices();
        self.history.scroll_to_bottom();
        self.composer.set_busy(true);

        let (tx, rx) = oneshot::channel();
        let generator = Arc::clone(&self.generator);
        let prompt = pending.prompt.clone();
        let settings = pending.settings;
        tokio::spawn(async move {
            let result = generator.generate(&prompt, &settings).await;
            let _ = tx.send(result);
        });

        self.in_flight = Some(InFlight { pending, reply: rx });
    }

    /// Collect a finished reply, if any. Returns true when one arrived.
    pub fn poll_reply(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return false;
        };
        let result = match in_flight.reply.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(ProviderError::Request("generation task ended without a reply".into()))
            }
        };

        let Some(InFlight { pending, .. }) = self.in_flight.take() else {
            return false;
        };
        self.composer.set_busy(false);
        if let Err(e) = self.session.complete_submission(pending, result) {
            self.fail(format!("Generation failed: {e}"));
        }
        self.history.scroll_to_bottom();
        true
    }

    fn use_example(&mut self, number: usize) {
        match number.checked_sub(1).and_then(|i| EXAMPLE_PROMPTS.get(i)) {
            Some(example) => {
                self.set_focus(Focus::Composer);
                self.composer.set_content(example);
            }
            None => self.fail(format!("Choose an example between 1 and {}.", EXAMPLE_PROMPTS.len())),
        }
    }

    fn confirm_settings(&mut self, settings: Settings) {
        if self.session.is_busy() {
            self.fail("Wait for the current response before changing settings.");
            return;
        }
        if let Err(e) = settings.validate() {
            self.fail(e.to_string());
            return;
        }
        self.session.apply_settings(settings);
        self.set_focus(Focus::Composer);
        self.history.clear_notices();
        self.info("Settings applied. Memory and chat history were reset.");
    }

    pub fn run_command(&mut self, command: ParsedCommand) {
        if self.session.is_busy() && !command.command.available_while_busy() {
            self.fail(format!("/{} is unavailable while a response is generating.", command.command.command()));
            return;
        }

        match command.command {
            SlashCommand::Reset => {
                if self.session.is_empty() {
                    self.info("Nothing to reset.");
                } else {
                    self.session.reset();
                    self.history.clear_notices();
                    self.info("Chat session reset.");
                }
            }
            SlashCommand::Save => self.save_session(),
            SlashCommand::Download => {
                let path = command.argument().map(Path::new);
                match self.session.transcript(Local::now()) {
                    Some(text) => self.export(&text, "chat_history", path),
                    None => self.info("No chat history to download."),
                }
            }
            SlashCommand::DeleteStored => {
                if self.session.stored().is_empty() {
                    self.info("No stored sessions to delete.");
                } else {
                    self.session.delete_stored();
                    match self.storage.clear_stored() {
                        Ok(()) => self.info("Stored sessions deleted."),
                        Err(e) => self.fail(format!("{e:#}")),
                    }
                }
            }
            SlashCommand::DownloadStored => {
                let path = command.argument().map(Path::new);
                match self.session.stored_transcript() {
                    Some(text) => self.export(&text, "stored_sessions", path),
                    None => self.info("No stored sessions to download."),
                }
            }
            SlashCommand::Stored => {
                let count = self.session.stored().len();
                let session = command.stored_index().and_then(|i| self.session.stored().get(i));
                match session {
                    Some(session) => {
                        let text = session.transcript.clone();
                        self.history.clear_notices();
                        self.info(text);
                    }
                    None if count == 0 => self.info("No stored sessions to show."),
                    None => self.fail(format!("Usage: /stored <1-{count}>")),
                }
            }
            SlashCommand::Example => match command.example_prompt() {
                Some(example) => self.composer.set_content(example),
                None => self.fail(format!("Usage: /example <1-{}>", EXAMPLE_PROMPTS.len())),
            },
            SlashCommand::Settings => self.set_focus(Focus::Sidebar),
            SlashCommand::Help => self.info(get_help_text()),
            SlashCommand::Quit => self.should_quit = true,
        }
    }

    fn save_session(&mut self) {
        let saved = self.session.save(Local::now()).is_some();
        if !saved {
            self.info("No chat history to save.");
            return;
        }
        match self.storage.save_stored(self.session.stored()) {
            Ok(()) => {
                let count = self.session.stored().len();
                self.info(format!("Saved as conversation session {count}."));
            }
            Err(e) => self.fail(format!("Saved for this run only: {e:#}")),
        }
    }

    fn export(&mut self, text: &str, stem: &str, target: Option<&Path>) {
        match self.storage.export_text(text, stem, target, Local::now()) {
            Ok(path) => self.info(format!("Downloaded to {}", path.display())),
            Err(e) => self.fail(format!("{e:#}")),
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let area = frame.size();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
            .split(area);

        self.sidebar.render(
            self.avatars.banner,
            self.session.settings(),
            self.session.stored(),
            columns[0],
            frame.buffer_mut(),
        );

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(5), Constraint::Length(3)])
            .split(columns[1]);

        self.render_header(rows[0], frame);

        let turns = self.session.turns();
        let busy = self.session.is_busy().then_some(self.tick);
        self.history
            .render(&turns, &self.avatars, busy, rows[1], frame.buffer_mut());
        self.composer.render(rows[2], frame.buffer_mut());
    }

    fn render_header(&self, area: Rect, frame: &mut Frame) {
        let memory = self.session.memory();
        let header = Line::from(vec![
            Span::styled(
                format!("{} {}", self.avatars.falcon, self.generator.name()),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!(
                    "  memory {}/{}  stored {}",
                    memory.len(),
                    memory.k(),
                    self.session.stored().len()
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.buffer_mut().set_line(area.x, area.y, &header, area.width);
    }
}

fn restore_terminal() {
    disable_raw_mode().ok();
    execute!(io::stdout(), LeaveAlternateScreen).ok();
}

/// Run `restore` before the previously installed panic hook.
fn install_panic_hook(restore: impl Fn() + Send + Sync + 'static) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore();
        previous(info);
    }));
}

/// Take over the terminal and run the chat screen until the user quits.
pub async fn run(mut app: App) -> Result<()> {
    install_panic_hook(restore_terminal);
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut app).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    info!("chat screen started");
    while !app.should_quit() {
        terminal.draw(|frame| app.draw(frame))?;

        // crossterm polling blocks; keep it off the async workers
        let next = tokio::task::block_in_place(|| -> io::Result<Option<Event>> {
            if event::poll(TICK)? {
                Ok(Some(event::read()?))
            } else {
                Ok(None)
            }
        })?;

        if let Some(Event::Key(key)) = next {
            app.handle_key(key);
        }

        app.poll_reply();
        app.tick = app.tick.wrapping_add(1);
    }
    info!("chat screen closed");
    Ok(())
}
