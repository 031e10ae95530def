//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the client itself and are never sent to
//! the chatbot.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Redraw the whole transcript.
    History,

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be submitted as a regular message.
///
/// # Examples
///
/// ```
/// # use crcbot::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert!(parse_command("Where is the syllabus?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "history" | "transcript" => without_argument(ChatCommand::History, &command, argument),
        "stats" | "status" => without_argument(ChatCommand::Stats, &command, argument),
        "help" | "?" => without_argument(ChatCommand::Help, &command, argument),
        "quit" | "exit" | "q" => without_argument(ChatCommand::Quit, &command, argument),
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn without_argument(command: ChatCommand, name: &str, argument: Option<&str>) -> ChatCommand {
    match argument {
        Some(_) => ChatCommand::Invalid(format!("/{} takes no arguments", name)),
        None => command,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /history               Show the conversation so far
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat
Anything else is sent to the chatbot. Press Enter to send."#
}
