use derive_from_env::FromEnv;
use thiserror::Error;

use crate::record::Level;

/// ISO-8601 with a numeric offset, e.g. `2024-05-01T13:37:00+02:00`.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

#[derive(FromEnv)]
#[from_env(prefix = "MULTILOG")]
#[allow(non_snake_case)]
struct MultilogEnv {
    #[from_env(default = "true")]
    DEBUG: bool,
    #[from_env(default = "true")]
    WARN: bool,
    // same value as DEFAULT_TIME_FORMAT, attribute arguments must be literals
    #[from_env(default = "%Y-%m-%dT%H:%M:%S%:z")]
    TIME_FORMAT: String,
    #[from_env(default = "1")]
    FATAL_EXIT_CODE: i32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid multilog environment: {0}")]
    Env(String),
}

/// Text printed in the level column of each line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub info: String,
    pub debug: String,
    pub warn: String,
    pub error: String,
    pub fatal: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            info: "INF".into(),
            debug: "DBG".into(),
            warn: "WRN".into(),
            error: "ERR".into(),
            fatal: "FTL".into(),
        }
    }
}

impl Labels {
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::Info => &self.info,
            Level::Debug => &self.debug,
            Level::Warn => &self.warn,
            Level::Error => &self.error,
            Level::Fatal => &self.fatal,
        }
    }

    pub fn set(&mut self, level: Level, label: impl Into<String>) {
        let slot = match level {
            Level::Info => &mut self.info,
            Level::Debug => &mut self.debug,
            Level::Warn => &mut self.warn,
            Level::Error => &mut self.error,
            Level::Fatal => &mut self.fatal,
        };
        *slot = label.into();
    }
}

/// Formatting and gating settings of a logger.
///
/// Nothing here is validated. An unusable `time_format` falls back to
/// RFC 3339 timestamps instead of failing the log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub enable_debug: bool,
    pub enable_warn: bool,
    pub item_separator: String,
    pub line_ending: String,
    pub labels: Labels,
    /// chrono `strftime` format of the timestamp column.
    pub time_format: String,
    pub fatal_exit_code: i32,
    /// Colorize the level column on the primary streams.
    pub colored_labels: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enable_debug: true,
            enable_warn: true,
            item_separator: " ".into(),
            line_ending: "\n".into(),
            labels: Labels::default(),
            time_format: DEFAULT_TIME_FORMAT.into(),
            fatal_exit_code: 1,
            colored_labels: false,
        }
    }
}

impl LogConfig {
    /// Defaults overridden by `MULTILOG_DEBUG`, `MULTILOG_WARN`,
    /// `MULTILOG_TIME_FORMAT` and `MULTILOG_FATAL_EXIT_CODE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = MultilogEnv::from_env()
            .map_err(|e| ConfigError::Env(format!("{e:?}")))?;
        Ok(Self {
            enable_debug: env.DEBUG,
            enable_warn: env.WARN,
            time_format: env.TIME_FORMAT,
            fatal_exit_code: env.FATAL_EXIT_CODE,
            ..Self::default()
        })
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        match level {
            Level::Debug => self.enable_debug,
            Level::Warn => self.enable_warn,
            Level::Info | Level::Error | Level::Fatal => true,
        }
    }
}
