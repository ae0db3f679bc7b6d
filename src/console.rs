// src/console.rs
//! Line-oriented output sinks.
//!
//! Runners never print directly. They write styled lines into an
//! [`OutputSink`], which the CLI backs with a terminal [`Console`] and tests
//! back with a [`RecordingSink`].

use std::io::{self, IsTerminal, Write};

/// How a line should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Heading,
    Success,
    Failure,
    Emphasis,
}

impl Style {
    fn ansi(self) -> Option<&'static str> {
        match self {
            Style::Plain => None,
            Style::Heading => Some("\x1b[1;34m"),
            Style::Success => Some("\x1b[1;32m"),
            Style::Failure => Some("\x1b[1;31m"),
            Style::Emphasis => Some("\x1b[1m"),
        }
    }
}

pub trait OutputSink {
    fn write_line(&mut self, style: Style, text: &str);

    /// A horizontal rule, optionally titled.
    fn rule(&mut self, title: Option<&str>);

    /// Progress of a tracked iteration; `done` counts completed items.
    fn progress(&mut self, _description: &str, _done: usize, _total: usize) {}

    fn plain(&mut self, text: &str) {
        self.write_line(Style::Plain, text);
    }
}

/// Terminal sink with ANSI colours when attached to a tty.
pub struct Console<W: Write> {
    out: W,
    color: bool,
    width: usize,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self { out, color, width: 60 }
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color, width: 60 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, style: Style, text: &str) {
        let result = match style.ansi().filter(|_| self.color) {
            Some(code) => writeln!(self.out, "{}{}\x1b[0m", code, text),
            None => writeln!(self.out, "{}", text),
        };
        if let Err(e) = result {
            log::warn!("failed to write to console: {}", e);
        }
    }
}

impl<W: Write> OutputSink for Console<W> {
    fn write_line(&mut self, style: Style, text: &str) {
        self.emit(style, text);
    }

    fn rule(&mut self, title: Option<&str>) {
        let line = match title {
            Some(title) => {
                let side = self.width.saturating_sub(title.chars().count() + 2) / 2;
                format!("{} {} {}", "─".repeat(side), title, "─".repeat(side))
            }
            None => "─".repeat(self.width),
        };
        self.emit(Style::Heading, &line);
    }

    fn progress(&mut self, description: &str, done: usize, total: usize) {
        let text = format!("{} [{}/{}]", description, done, total);
        self.emit(Style::Plain, &text);
    }
}

/// Keeps every line in memory. Rules are stored as `---` or `--- title ---`.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub lines: Vec<(Style, String)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, line)| line.contains(needle))
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|(_, line)| line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputSink for RecordingSink {
    fn write_line(&mut self, style: Style, text: &str) {
        self.lines.push((style, text.to_string()));
    }

    fn rule(&mut self, title: Option<&str>) {
        let line = match title {
            Some(title) => format!("--- {} ---", title),
            None => "---".to_string(),
        };
        self.lines.push((Style::Heading, line));
    }

    fn progress(&mut self, description: &str, done: usize, total: usize) {
        self.lines
            .push((Style::Plain, format!("{} [{}/{}]", description, done, total)));
    }
}

/// Visit every item, reporting progress to the sink after each one. The
/// callback gets the sink back so it can write between updates.
pub fn track<T, E>(
    output: &mut dyn OutputSink,
    description: &str,
    items: &[T],
    mut visit: impl FnMut(&mut dyn OutputSink, &T) -> Result<(), E>,
) -> Result<(), E> {
    let total = items.len();
    for (index, item) in items.iter().enumerate() {
        visit(&mut *output, item)?;
        output.progress(description, index + 1, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_without_color() {
        let mut console = Console::new(Vec::new(), false);
        console.write_line(Style::Success, "Passed!");
        console.rule(Some("hw1"));

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.starts_with("Passed!\n"));
        assert!(text.contains(" hw1 "));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn test_console_with_color() {
        let mut console = Console::new(Vec::new(), true);
        console.write_line(Style::Failure, "Failed!");

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert_eq!(text, "\x1b[1;31mFailed!\x1b[0m\n");
    }

    #[test]
    fn test_track_reports_progress() {
        let mut sink = RecordingSink::new();
        let items = ["a", "b"];
        let mut seen = Vec::new();

        track(&mut sink, "Saving", &items, |output, item| {
            output.plain(&format!("saw {}", item));
            seen.push(*item);
            Ok::<_, ()>(())
        })
        .unwrap();

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(
            sink.text(),
            "saw a\nSaving [1/2]\nsaw b\nSaving [2/2]"
        );
    }

    #[test]
    fn test_track_stops_on_error() {
        let mut sink = RecordingSink::new();
        let result = track(&mut sink, "Saving", &[1, 2, 3], |_, item| {
            if *item == 2 { Err(*item) } else { Ok(()) }
        });

        assert_eq!(result, Err(2));
        assert!(sink.contains("Saving [1/3]"));
        assert!(!sink.contains("Saving [2/3]"));
    }
}
