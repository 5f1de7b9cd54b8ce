//! # multilog
//! Leveled logger writing timestamped lines to per-level streams and fanning
//! them out to named writers, with a fatal level that only ends the process
//! once every writer has been offered the fatal line.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! multilog = "0.1.0"
//! ```
//!
//! ```rust
//! use multilog::logger_config;
//!
//! let logger = logger_config().with_warn(false).build();
//! logger.info("Hello, world!");
//! assert!(logger.warn("not printed").is_none());
//! ```
//!
//! ## Writers
//! Every info, debug, warn and error line is handed to each registered writer.
//! A writer failing is reported on the error stream and never reaches the caller.
//!
//! ```rust
//! use multilog::{ChannelWriter, logger_config};
//!
//! let (writer, lines) = ChannelWriter::unbounded();
//! let logger = logger_config().with_writer("remote", writer).build();
//! logger.info("shipped");
//! assert_eq!(lines.try_recv().unwrap().message, "shipped");
//! ```
//!
//! ## Fatal lines
//! Without writers, `fatal` exits right after writing its line. With writers,
//! it returns the pending record and the process keeps running until the
//! record has been delivered to each of them.
//!
//! ```rust,no_run
//! use multilog::{ChannelWriter, logger_config};
//!
//! let (writer, _lines) = ChannelWriter::unbounded();
//! let logger = logger_config().with_writer("remote", writer).build();
//! let err = std::io::Error::other("disk full");
//! let pending = logger.fatal("cannot continue", &err);
//! // still running, "remote" has not seen the fatal line yet
//! logger.deliver_to_writer(&pending, "remote"); // exits with status 1
//! ```
//!
//! ## Process-wide logger
//! ```rust
//! multilog::logger_config()
//!     .with_debug(false)
//!     .init_global()
//!     .ok();
//! log::info!("through the log facade");
//! multilog::info("or directly");
//! ```

mod logger;
mod streams;
#[cfg(test)]
mod test_utils;

use std::{
    error::Error,
    io::Write,
    sync::{Arc, Once, OnceLock},
};

use log::{LevelFilter, Log};
use multilog_core::WriterRegistry;
use streams::Streams;

pub use logger::Logger;
pub use multilog_core::{
    BarrierState, ChannelWriter, ConfigError, Delivery, DeliveryError, Labels, Level, LogConfig,
    LogFile, LogLine, LogRecord, LogWriter, ProcessExit, Terminate,
};
pub use streams::OutputStream;

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();
static BRIDGE: Once = Once::new();

/// Routes `log` macros to the process-wide logger.
struct MultiLogger;

impl Log for MultiLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        global().is_enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from(record.level());
        let logger = global();
        if logger.is_enabled(level) {
            logger.emit(level, record.args().to_string());
        }
    }

    fn flush(&self) {}
}

fn install_bridge() {
    BRIDGE.call_once(|| {
        if log::set_logger(&MultiLogger).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Builds from the `MULTILOG_*` environment. An invalid environment is
/// reported as an error line and the builder's own configuration is kept.
fn env_logger(builder: ConfigBuilder) -> Logger {
    match LogConfig::from_env() {
        Ok(config) => builder.with_config(config).build(),
        Err(err) => {
            let logger = builder.build();
            logger.error("ignoring MULTILOG_* environment", &err);
            logger
        }
    }
}

/// The process-wide logger. Configured from the `MULTILOG_*` environment on
/// first use unless [`ConfigBuilder::init_global`] ran before.
pub fn global() -> &'static Logger {
    let logger = GLOBAL_LOGGER.get_or_init(|| env_logger(logger_config()));
    install_bridge();
    logger
}

pub fn info(msg: &str) -> LogRecord {
    global().info(msg)
}

pub fn debug(msg: &str) -> Option<LogRecord> {
    global().debug(msg)
}

pub fn warn(msg: &str) -> Option<LogRecord> {
    global().warn(msg)
}

pub fn error(desc: &str, err: &dyn Error) -> LogRecord {
    global().error(desc, err)
}

pub fn fatal(desc: &str, err: &dyn Error) -> LogRecord {
    global().fatal(desc, err)
}

pub fn register_writer<W: LogWriter + 'static>(name: &str, writer: W) {
    global().register_writer(name, writer)
}

pub fn unregister_writer(name: &str) -> bool {
    global().unregister_writer(name)
}

pub fn deliver_to_writer(record: &LogRecord, name: &str) -> Delivery {
    global().deliver_to_writer(record, name)
}

pub fn fan_out_fatal(record: &LogRecord) {
    global().fan_out_fatal(record)
}

/// Builder for configuring a [`Logger`].
pub struct ConfigBuilder {
    config: LogConfig,
    streams: Streams,
    writers: Vec<(String, Arc<dyn LogWriter>)>,
    terminator: Arc<dyn Terminate>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            config: LogConfig::default(),
            streams: Streams::default(),
            writers: Vec::new(),
            terminator: Arc::new(ProcessExit),
        }
    }
}

impl ConfigBuilder {
    /// Replaces the whole formatting configuration.
    pub fn with_config(self, config: LogConfig) -> Self {
        Self { config, ..self }
    }
    /// Loads the configuration from the `MULTILOG_*` environment.
    pub fn from_env(self) -> Result<Self, ConfigError> {
        Ok(Self {
            config: LogConfig::from_env()?,
            ..self
        })
    }
    pub fn with_debug(mut self, yes: bool) -> Self {
        self.config.enable_debug = yes;
        self
    }
    pub fn with_warn(mut self, yes: bool) -> Self {
        self.config.enable_warn = yes;
        self
    }
    pub fn with_item_separator(mut self, separator: &str) -> Self {
        self.config.item_separator = separator.into();
        self
    }
    pub fn with_line_ending(mut self, ending: &str) -> Self {
        self.config.line_ending = ending.into();
        self
    }
    pub fn with_label(mut self, level: Level, label: &str) -> Self {
        self.config.labels.set(level, label);
        self
    }
    /// chrono `strftime` format of the timestamp column.
    pub fn with_time_format(mut self, format: &str) -> Self {
        self.config.time_format = format.into();
        self
    }
    pub fn with_fatal_exit_code(mut self, code: i32) -> Self {
        self.config.fatal_exit_code = code;
        self
    }
    pub fn with_colored_labels(mut self, yes: bool) -> Self {
        self.config.colored_labels = yes;
        self
    }
    /// Sends the lines of `level` to `stream` instead of stderr.
    pub fn with_output<W: Write + Send + 'static>(self, level: Level, stream: W) -> Self {
        self.streams.replace(level, Box::new(stream));
        self
    }
    /// Sends the lines of every level to `stream`.
    pub fn with_output_all<W: Write + Send + Clone + 'static>(self, stream: W) -> Self {
        for level in Level::ALL {
            self.streams.replace(level, Box::new(stream.clone()));
        }
        self
    }
    pub fn with_writer<W: LogWriter + 'static>(mut self, name: &str, writer: W) -> Self {
        self.writers.push((name.into(), Arc::new(writer)));
        self
    }
    /// Overrides how the process ends on fatal.
    pub fn with_terminator(self, terminator: Arc<dyn Terminate>) -> Self {
        Self { terminator, ..self }
    }

    pub fn build(self) -> Logger {
        let Self {
            config,
            streams,
            writers,
            terminator,
        } = self;
        let registry = WriterRegistry::new(terminator);
        for (name, writer) in writers {
            registry.register(name, writer);
        }
        Logger::from_parts(config, streams, registry)
    }

    /// Installs the logger process-wide and routes the `log` macros to it.
    /// Hands the logger back if a process-wide logger already exists.
    pub fn init_global(self) -> Result<&'static Logger, Logger> {
        GLOBAL_LOGGER.set(self.build())?;
        Ok(global())
    }
}

/// Returns a default ConfigBuilder for configuring the logger.
pub fn logger_config() -> ConfigBuilder {
    ConfigBuilder::default()
}
