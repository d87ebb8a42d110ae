//! User-facing terminal output.
//!
//! Diagnostic logging goes through `tracing`; this is the conversation
//! transcript: what the user said, what the agent answers, narrator lines.

use regex::Regex;
use std::io::{self, Write};
use std::sync::{LazyLock, Mutex};

const DEFAULT_WIDTH: usize = 80;
const RESET: &str = "\x1b[0m";

static ANSI_CODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[mK]").expect("static ANSI pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent,
    Narrator,
}

impl Speaker {
    fn color(self) -> &'static str {
        match self {
            Speaker::User => "\x1b[38;5;39m",
            Speaker::Agent => "\x1b[38;5;160m",
            Speaker::Narrator => "\x1b[38;5;208m",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Speaker::User => "You",
            Speaker::Agent => "GANGLIA",
            Speaker::Narrator => "Narrator",
        }
    }
}

/// Serialises transcript lines so concurrent speakers don't interleave.
pub struct Console {
    width: usize,
    lock: Mutex<()>,
}

impl Console {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(10),
            lock: Mutex::new(()),
        }
    }

    /// Width from `GANGLIA_TERMINAL_WIDTH`, then `COLUMNS`, then 80.
    pub fn from_env() -> Self {
        let width = ["GANGLIA_TERMINAL_WIDTH", "COLUMNS"]
            .iter()
            .find_map(|var| std::env::var(var).ok()?.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_WIDTH);
        Self::new(width)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// A partial transcription that overwrites the current line.
    pub fn user_interim(&self, text: &str) {
        let line = format_interim(text, self.width);
        self.emit(|out| write!(out, "{}\r\x1b[K{}{}", Speaker::User.color(), line, RESET));
    }

    /// A finished user utterance, word-wrapped to the terminal.
    pub fn user_final(&self, text: &str) {
        let lines = wrap_final(text, self.width);
        self.emit(|out| {
            for line in &lines {
                writeln!(out, "{}{}{}", Speaker::User.color(), line, RESET)?;
            }
            Ok(())
        });
    }

    pub fn say(&self, speaker: Speaker, text: &str) {
        self.emit(|out| writeln!(out, "{}{}{}", speaker.color(), text, RESET));
    }

    pub fn print_legend(&self) {
        let bar = "=".repeat(20);
        self.emit(|out| {
            writeln!(out, "{bar}\n    COLOR LEGEND\n{bar}")?;
            for speaker in [Speaker::User, Speaker::Agent, Speaker::Narrator] {
                writeln!(out, "{}{}{}", speaker.color(), speaker.label(), RESET)?;
            }
            writeln!(out, "{bar}")
        });
    }

    fn emit<F>(&self, write_fn: F)
    where
        F: FnOnce(&mut io::StdoutLock<'static>) -> io::Result<()>,
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut out = io::stdout().lock();
        if let Err(e) = write_fn(&mut out).and_then(|_| out.flush()) {
            tracing::debug!("console write failed: {}", e);
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::from_env()
    }
}

pub fn strip_ansi(text: &str) -> String {
    ANSI_CODES.replace_all(text, "").replace('\r', "")
}

/// Keeps the tail of an over-long interim line: `"..."` plus the last
/// `width - 8` visible characters.
pub fn format_interim(text: &str, width: usize) -> String {
    let clean = strip_ansi(text);
    let len = clean.chars().count();
    if len <= width.saturating_sub(5) {
        return clean;
    }
    let visible = width.saturating_sub(8);
    let tail: String = clean.chars().skip(len - visible.min(len)).collect();
    format!("...{}", tail)
}

/// Greedy word wrap to `width - 2` columns. Short text is returned unchanged.
pub fn wrap_final(text: &str, width: usize) -> Vec<String> {
    let clean = strip_ansi(text);
    let limit = width.saturating_sub(2);
    if clean.chars().count() <= limit {
        return vec![clean];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in clean.split_whitespace() {
        let word_len = word.chars().count();
        let needed = word_len + usize::from(!current.is_empty());
        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len += needed;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
