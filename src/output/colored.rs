//! Console color scheme keyed by log level
//!
//! Colors only ever reach the terminal. The file sink is written from the
//! uncolored rendering of the same entry.

use crate::logging::LogLevel;
use colored::{Color, ColoredString, Colorize};

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub debug: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Cyan,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::White,
            debug: Color::BrightBlack,
        }
    }
}

impl ColorScheme {
    pub fn for_level(&self, level: LogLevel) -> Color {
        match level {
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Success => self.success,
            LogLevel::Warning => self.warning,
            LogLevel::Error => self.error,
        }
    }

    /// Apply the level's color if colors are enabled
    pub fn paint(&self, text: &str, level: LogLevel, enabled: bool) -> ColoredString {
        if enabled {
            text.color(self.for_level(level))
        } else {
            text.normal()
        }
    }

    /// Bold header text for the banner
    pub fn header(&self, text: &str, enabled: bool) -> ColoredString {
        if enabled {
            text.color(self.header).bold()
        } else {
            text.normal()
        }
    }
}
