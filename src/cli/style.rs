//! Terminal styling helpers
//!
//! Colors are applied only when stdout supports them; output goes through
//! `anstream`, which strips escapes for pipes.

use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Stream};
use std::fmt::Display;

/// Check mark used for completed steps
pub const CHECK: &str = "✓";

/// Semantic styles for CLI output
pub trait Stylize {
    /// De-emphasized text (hints, secondary details)
    fn muted(&self) -> String;
    /// Bold headline text
    fn emphasis(&self) -> String;
    /// Names worth spotting: branches, PR numbers, counts
    fn accent(&self) -> String;
    /// Warnings
    fn warn(&self) -> String;
    /// Success
    fn success(&self) -> String;
    /// Errors
    fn error(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn muted(&self) -> String {
        self.if_supports_color(Stream::Stdout, |t| t.dimmed())
            .to_string()
    }

    fn emphasis(&self) -> String {
        self.if_supports_color(Stream::Stdout, |t| t.bold())
            .to_string()
    }

    fn accent(&self) -> String {
        self.if_supports_color(Stream::Stdout, |t| t.cyan())
            .to_string()
    }

    fn warn(&self) -> String {
        self.if_supports_color(Stream::Stdout, |t| t.yellow())
            .to_string()
    }

    fn success(&self) -> String {
        self.if_supports_color(Stream::Stdout, |t| t.green())
            .to_string()
    }

    fn error(&self) -> String {
        self.if_supports_color(Stream::Stderr, |t| t.red())
            .to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Dimmed arrow for list items
pub fn arrow() -> String {
    "→".muted()
}

/// Spinner used while waiting on the hosting provider
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "])
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// `text` as a terminal hyperlink to `url`, when the terminal supports it
pub fn hyperlink(text: &str, url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        terminal_link::Link::new(text, url).to_string()
    } else {
        text.to_string()
    }
}
