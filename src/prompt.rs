//! Prompters for the terminal.

use linkcal_core::Prompter;
use std::io::{self, BufRead, Write};

/// Asks on stderr and reads answers from stdin.
///
/// End of input counts as cancelling. Answers are returned as typed, so an
/// empty line is an empty answer; the default is only shown.
pub struct TerminalPrompter<R> {
    input: R,
}

impl TerminalPrompter<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(e) => {
                tracing::warn!("Failed to read answer: {}", e);
                None
            }
        }
    }
}

impl<R: BufRead + Send> Prompter for TerminalPrompter<R> {
    fn prompt(&mut self, message: &str, default: &str) -> Option<String> {
        if default.is_empty() {
            eprint!("{} ", message);
        } else {
            eprint!("{} (currently \"{}\") ", message, default);
        }
        let _ = io::stderr().flush();

        self.read_line()
    }

    fn confirm(&mut self, message: &str) -> bool {
        eprint!("{} [y/N] ", message);
        let _ = io::stderr().flush();

        matches!(
            self.read_line().as_deref().map(str::trim),
            Some("y") | Some("Y") | Some("yes") | Some("Yes")
        )
    }
}

/// Answers from command-line flags, falling back to another prompter for
/// anything the flags leave open.
pub struct FlagPrompter<P> {
    title: Option<String>,
    yes: bool,
    fallback: P,
}

impl<P: Prompter> FlagPrompter<P> {
    pub fn new(title: Option<String>, yes: bool, fallback: P) -> Self {
        Self {
            title,
            yes,
            fallback,
        }
    }
}

impl<P: Prompter> Prompter for FlagPrompter<P> {
    fn prompt(&mut self, message: &str, default: &str) -> Option<String> {
        match self.title.take() {
            Some(title) => Some(title),
            None => self.fallback.prompt(message, default),
        }
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.yes || self.fallback.confirm(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkcal_core::ScriptedPrompter;
    use std::io::Cursor;

    #[test]
    fn test_terminal_reads_lines() {
        let mut prompter = TerminalPrompter::new(Cursor::new("Lunch\ny\n"));
        assert_eq!(prompter.prompt("Event title:", ""), Some("Lunch".to_string()));
        assert!(prompter.confirm("Delete event?"));
    }

    #[test]
    fn test_terminal_empty_answer_is_not_the_default() {
        let mut prompter = TerminalPrompter::new(Cursor::new("\r\n"));
        assert_eq!(prompter.prompt("Change event title:", "Old"), Some(String::new()));
        assert_eq!(prompter.prompt("Change event title:", "Old"), None);
    }

    #[test]
    fn test_terminal_end_of_input_cancels() {
        let mut prompter = TerminalPrompter::new(Cursor::new(""));
        assert_eq!(prompter.prompt("Event title:", ""), None);
        assert!(!prompter.confirm("Delete event?"));
    }

    #[test]
    fn test_terminal_confirm_defaults_to_no() {
        let mut prompter = TerminalPrompter::new(Cursor::new("\nnope\n"));
        assert!(!prompter.confirm("Delete event?"));
        assert!(!prompter.confirm("Delete event?"));
    }

    #[test]
    fn test_flags_answer_first() {
        let mut prompter = FlagPrompter::new(
            Some("Standup".to_string()),
            true,
            ScriptedPrompter::new().answer("from fallback"),
        );
        assert_eq!(prompter.prompt("Event title:", ""), Some("Standup".to_string()));
        assert_eq!(
            prompter.prompt("Event title:", ""),
            Some("from fallback".to_string())
        );
        assert!(prompter.confirm("Delete event?"));
    }

    #[test]
    fn test_flags_defer_confirmation() {
        let mut prompter =
            FlagPrompter::new(None, false, ScriptedPrompter::new().confirm_with(false));
        assert!(!prompter.confirm("Delete event?"));
    }
}
