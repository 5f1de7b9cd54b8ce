use std::{error::Error, fmt::Write};

use chrono::Local;
use colored::Colorize;

use crate::config::LogConfig;

/// Joins the description and the failure text of error and fatal messages.
pub const ERROR_WORD: &str = ". error: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Debug,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Info,
        Level::Debug,
        Level::Warn,
        Level::Error,
        Level::Fatal,
    ];
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

/// One emitted line. Built fresh for every call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: String,
    level: Level,
    message: String,
}

impl LogRecord {
    pub fn new(timestamp: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            level,
            message: message.into(),
        }
    }

    /// Stamps `message` with the current local time.
    pub fn now(level: Level, message: impl Into<String>, config: &LogConfig) -> Self {
        let now = Local::now();
        let mut timestamp = String::new();
        // chrono reports bad format strings through fmt::Error
        if write!(timestamp, "{}", now.format(&config.time_format)).is_err() {
            timestamp = now.to_rfc3339();
        }
        Self::new(timestamp, level, message)
    }

    /// `description. error: failure`
    pub fn failure_message(description: &str, failure: &dyn Error) -> String {
        format!("{description}{ERROR_WORD}{failure}")
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.level == Level::Fatal
    }

    /// Renders `timestamp SEP label SEP message END`.
    pub fn render(&self, config: &LogConfig) -> String {
        let label = config.labels.get(self.level);
        let sep = &config.item_separator;
        let end = &config.line_ending;
        let label = if config.colored_labels {
            match self.level {
                Level::Info => label.green(),
                Level::Debug => label.blue(),
                Level::Warn => label.yellow(),
                Level::Error => label.red(),
                Level::Fatal => label.red().bold(),
            }
            .to_string()
        } else {
            label.to_string()
        };
        format!("{}{sep}{label}{sep}{}{end}", self.timestamp, self.message)
    }
}
