use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Upload a PDF and attach it to following messages
    Upload,
    /// Switch to a different model
    Model,
    /// Switch to a different developer prompt
    Prompt,
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

    /// The argument as a 1-based list position, if it is a number.
    pub fn position(&self) -> Option<usize> {
        self.argument()?.parse().ok()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Upload => "upload a PDF: /upload <path>",
            SlashCommand::Model => "cycle models, or pick one: /model [name|n]",
            SlashCommand::Prompt => "cycle developer prompts, or pick one: /prompt [n]",
            SlashCommand::Help => "show available commands and keys",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input.
///
/// Everything after the command word is kept verbatim (trimmed) as the
/// argument, so paths with spaces survive.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let body = input.trim().strip_prefix('/')?;
    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };
    let head = head.to_lowercase();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "models" | "m" => Some(SlashCommand::Model),
        "prompts" | "p" => Some(SlashCommand::Prompt),
        "u" | "pdf" => Some(SlashCommand::Upload),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    };

    Some(ParsedCommand { command, argument })
}

/// Help text for all commands and keys.
pub fn get_help_text() -> String {
    let mut help = String::from("Commands:\n\n");
    for entry in command_entries() {
        help.push_str(&format!("/{:<8} {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nAliases: /q and /exit for /quit, /m for /model, /p for /prompt, /u for /upload");
    help.push_str("\n\nKeys:\n\n");
    help.push_str("Enter      send the message\n");
    help.push_str("Tab        switch between API key and message\n");
    help.push_str("Esc        cancel the response being streamed\n");
    help.push_str("PgUp/PgDn  scroll the conversation\n");
    help.push_str("Ctrl+C     quit");

    help
}
