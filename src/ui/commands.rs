use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::prompts::EXAMPLE_PROMPTS;

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Clear the chat and the model's memory
    Reset,
    /// Archive the current chat as a stored session
    Save,
    /// Write the current chat to a text file
    Download,
    /// Delete every stored session
    DeleteStored,
    /// Write all stored sessions to a text file
    DownloadStored,
    /// Show one stored session's transcript
    Stored,
    /// Put an example prompt in the input box
    Example,
    /// Focus the settings sidebar
    Settings,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Example prompt selected by `/example <n>` (1-based).
    pub fn example_prompt(&self) -> Option<&'static str> {
        if self.command != SlashCommand::Example {
            return None;
        }
        let index: usize = self.argument()?.trim().parse().ok()?;
        EXAMPLE_PROMPTS.get(index.checked_sub(1)?).copied()
    }

    /// Zero-based index chosen by `/stored <n>` (1-based).
    pub fn stored_index(&self) -> Option<usize> {
        if self.command != SlashCommand::Stored {
            return None;
        }
        self.argument()?.trim().parse::<usize>().ok()?.checked_sub(1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Reset => "reset the chat session and memory",
            SlashCommand::Save => "save the chat as a stored session",
            SlashCommand::Download => "download the chat history [path]",
            SlashCommand::DeleteStored => "delete all stored sessions",
            SlashCommand::DownloadStored => "download stored sessions [path]",
            SlashCommand::Stored => "show a stored session <n>",
            SlashCommand::Example => "use an example prompt <1-3>",
            SlashCommand::Settings => "edit chat settings",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command may run while a response is being generated.
    pub fn available_while_busy(self) -> bool {
        !matches!(self, SlashCommand::Reset | SlashCommand::Settings)
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next()?;
    let argument = parts
        .next()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string);

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "clear" => Some(SlashCommand::Reset),
        "h" | "?" => Some(SlashCommand::Help),
        "ex" => Some(SlashCommand::Example),
        _ => None,
    })?;

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n");
    for entry in command_entries() {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }
    help.push_str("\nExamples:\n");
    for (i, example) in EXAMPLE_PROMPTS.iter().enumerate() {
        help.push_str(&format!("F{} or /example {} - {}\n", i + 1, i + 1, example));
    }
    help.push_str("\nTab switches between the input box and the settings sidebar. Ctrl+C quits.");
    help
}
