//! Line-oriented input: one typed line becomes one [`Command`].
//!
//! A bare line is an attack answer. Colon-prefixed words are meta commands;
//! full-width colons (IME input) are accepted too.

/// All player commands, normalized from a raw input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Attack with the typed reading.
    Attack(String),
    /// Heal with the typed reading.
    Heal(String),
    /// Cycle the hint for the current question.
    Hint,
    /// Leave the stage.
    Quit,
    /// Nothing to do (blank line).
    Empty,
    /// Unrecognised `:command`.
    Unknown(String),
}

fn strip_command_prefix(line: &str) -> Option<&str> {
    line.strip_prefix(':').or_else(|| line.strip_prefix('：'))
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = strip_command_prefix(line) else {
        return Command::Attack(line.to_string());
    };

    let (word, arg) = match rest.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (rest, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "heal" | "h" => Command::Heal(arg.to_string()),
        "hint" | "?" => Command::Hint,
        "quit" | "q" => Command::Quit,
        "attack" | "a" => Command::Attack(arg.to_string()),
        _ => Command::Unknown(word.to_string()),
    }
}
