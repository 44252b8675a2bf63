use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

pub const QUIET: u8 = 0;
pub const WARNINGS: u8 = 1;
pub const INFO: u8 = 2;

/// Severity-prefixed console output gated by verbosity: 0 prints errors
/// only, 1 adds warnings, 2 adds info.
#[derive(Debug, Clone)]
pub struct Console {
    verbosity: u8,
    colorize: bool,
    transcript: Option<Rc<RefCell<Vec<String>>>>,
}

impl Console {
    pub fn new(verbosity: u8, colorize: bool) -> Self {
        Self {
            verbosity,
            colorize,
            transcript: None,
        }
    }

    /// Keeps emitted lines in memory instead of printing them. Clones share
    /// the same transcript.
    #[cfg(test)]
    pub fn capturing(verbosity: u8) -> Self {
        Self {
            verbosity,
            colorize: false,
            transcript: Some(Rc::default()),
        }
    }

    #[cfg(test)]
    pub fn captured(&self) -> Vec<String> {
        self.transcript
            .as_ref()
            .map(|lines| lines.borrow().clone())
            .unwrap_or_default()
    }

    fn paint(&self, color: &str, text: impl Display) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Highlights a path or value inside a message.
    pub fn green(&self, text: impl Display) -> String {
        self.paint(GREEN, text)
    }

    pub fn yellow(&self, text: impl Display) -> String {
        self.paint(YELLOW, text)
    }

    fn emit(&self, line: String, to_stderr: bool) {
        match &self.transcript {
            Some(lines) => lines.borrow_mut().push(line),
            None if to_stderr => eprintln!("{line}"),
            None => println!("{line}"),
        }
    }

    pub fn info(&self, message: impl Display) {
        if self.verbosity >= INFO {
            self.emit(format!("{} {message}", self.paint(BLUE, "[info]:")), false);
        }
    }

    pub fn warning(&self, message: impl Display) {
        if self.verbosity >= WARNINGS {
            self.emit(
                format!("{} {message}", self.paint(YELLOW, "[warning]:")),
                false,
            );
        }
    }

    pub fn error(&self, message: impl Display) {
        self.emit(format!("{} {message}", self.paint(RED, "[error]:")), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_respects_colorize() {
        let plain = Console::new(INFO, false);
        assert_eq!(plain.green("a.mp3"), "a.mp3");
        let colored = Console::new(QUIET, true);
        assert_eq!(colored.yellow("-r"), "\x1b[33m-r\x1b[0m");
    }

    #[test]
    fn verbosity_gates_each_level() {
        let expected = [
            (QUIET, vec!["[error]: e"]),
            (WARNINGS, vec!["[warning]: w", "[error]: e"]),
            (INFO, vec!["[info]: i", "[warning]: w", "[error]: e"]),
        ];
        for (verbosity, lines) in expected {
            let console = Console::capturing(verbosity);
            console.info("i");
            console.warning("w");
            console.error("e");
            assert_eq!(console.captured(), lines, "verbosity {verbosity}");
        }
    }

    #[test]
    fn clones_share_the_transcript() {
        let console = Console::capturing(INFO);
        console.clone().warning("from a clone");
        assert_eq!(console.captured(), vec!["[warning]: from a clone"]);
    }
}
