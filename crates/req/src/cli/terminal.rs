//! Colored output, when the terminal supports it.

use owo_colors::{OwoColorize, colors::css};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Color as info (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

fn paint(text: &str, painted: impl std::fmt::Display) -> String {
    if supports_color() {
        painted.to_string()
    } else {
        text.to_string()
    }
}

impl Colorize for str {
    fn success(&self) -> String {
        paint(self, self.fg::<css::Green>())
    }

    fn warning(&self) -> String {
        paint(self, self.fg::<css::Orange>())
    }

    fn info(&self) -> String {
        paint(self, self.fg::<css::LightBlue>())
    }

    fn dim(&self) -> String {
        paint(self, self.dimmed())
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}
