//! Command line tokenizer.

/// A command line split into its token and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// First token, sigil included (`/ask`).
    pub command: String,
    /// Whitespace-separated arguments.
    pub args: Vec<String>,
    /// Everything after the command token, with inner spacing preserved.
    pub rest: String,
}

/// Split `raw` on its first whitespace run. Returns `None` for blank input.
pub fn parse_command(raw: &str) -> Option<ParsedCommand> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (command, rest) = match trimmed.find(char::is_whitespace) {
        Some(idx) => (&trimmed[..idx], trimmed[idx..].trim_start()),
        None => (trimmed, ""),
    };
    Some(ParsedCommand {
        command: command.to_string(),
        args: rest.split_whitespace().map(str::to_string).collect(),
        rest: rest.to_string(),
    })
}
