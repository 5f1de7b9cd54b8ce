use std::{
    error::Error,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use multilog_core::{
    BarrierState, Delivery, DeliveryError, Level, LogConfig, LogRecord, LogWriter, WriterRegistry,
};

use crate::streams::{OutputStream, Streams};

/// Formats leveled lines, writes them to per-level streams and fans them out
/// to the registered writers.
///
/// A fatal record ends the process only once every registered writer has
/// been offered it, see [`Logger::fatal`].
pub struct Logger {
    config: RwLock<LogConfig>,
    streams: Streams,
    registry: WriterRegistry,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl Logger {
    /// A logger writing everything to stderr and exiting the process on fatal.
    pub fn new(config: LogConfig) -> Self {
        Self::from_parts(config, Streams::default(), WriterRegistry::default())
    }

    pub(crate) fn from_parts(
        config: LogConfig,
        streams: Streams,
        registry: WriterRegistry,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            streams,
            registry,
        }
    }

    fn read_config(&self) -> RwLockReadGuard<'_, LogConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> LogConfig {
        self.read_config().clone()
    }

    /// Edits the configuration in place. Takes effect on the next call.
    pub fn configure<F: FnOnce(&mut LogConfig)>(&self, f: F) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut config);
    }

    /// Whether lines of `level` are currently written.
    pub fn is_enabled(&self, level: Level) -> bool {
        self.read_config().is_enabled(level)
    }

    /// Replaces the destination of `level`, returning the previous one.
    pub fn set_output(&self, level: Level, stream: OutputStream) -> OutputStream {
        self.streams.replace(level, stream)
    }

    pub fn info(&self, msg: &str) -> LogRecord {
        self.emit(Level::Info, msg.to_string())
    }

    /// `None` when debug lines are disabled.
    pub fn debug(&self, msg: &str) -> Option<LogRecord> {
        let enabled = self.read_config().enable_debug;
        enabled.then(|| self.emit(Level::Debug, msg.to_string()))
    }

    /// `None` when warn lines are disabled.
    pub fn warn(&self, msg: &str) -> Option<LogRecord> {
        let enabled = self.read_config().enable_warn;
        enabled.then(|| self.emit(Level::Warn, msg.to_string()))
    }

    pub fn error(&self, desc: &str, err: &dyn Error) -> LogRecord {
        self.emit(Level::Error, LogRecord::failure_message(desc, err))
    }

    /// Writes the fatal line, then either ends the process (no writer
    /// registered) or arms the fatal barrier and returns the pending record.
    ///
    /// While armed, each [`Logger::deliver_to_writer`] call with the returned
    /// record counts one confirmation; the last one ends the process with
    /// the configured exit code. [`Logger::fan_out_fatal`] does all of them.
    pub fn fatal(&self, desc: &str, err: &dyn Error) -> LogRecord {
        let (record, exit_code) = {
            let config = self.read_config();
            let message = LogRecord::failure_message(desc, err);
            let record = LogRecord::now(Level::Fatal, message, &config);
            self.streams.write(Level::Fatal, &record.render(&config));
            (record, config.fatal_exit_code)
        };
        self.registry.arm_fatal(&record, exit_code);
        record
    }

    /// Builds, writes and fans out a non-fatal line.
    pub(crate) fn emit(&self, level: Level, message: String) -> LogRecord {
        let (record, label) = {
            let config = self.read_config();
            let record = LogRecord::now(level, message, &config);
            self.streams.write(level, &record.render(&config));
            (record, config.labels.get(level).to_string())
        };
        for (name, _) in self.registry.writers() {
            if let Delivery::Failed(err) = self.registry.deliver(&record, &label, &name) {
                self.report_failure(&name, &err);
            }
        }
        record
    }

    /// Error line on the error stream only; never fanned out again.
    fn report_failure(&self, name: &str, err: &DeliveryError) {
        let config = self.read_config();
        let desc = format!("could not write to log writer \"{name}\"");
        let message = LogRecord::failure_message(&desc, err);
        let record = LogRecord::now(Level::Error, message, &config);
        self.streams.write(Level::Error, &record.render(&config));
    }

    /// Adds or replaces the writer known as `name`.
    pub fn register_writer<W: LogWriter + 'static>(&self, name: &str, writer: W) {
        self.register_shared_writer(name, Arc::new(writer));
    }

    pub fn register_shared_writer(&self, name: &str, writer: Arc<dyn LogWriter>) {
        self.registry.register(name, writer);
    }

    /// Removes `name`. If a fatal record is pending and has not been offered
    /// to that writer yet, its confirmation is considered given.
    pub fn unregister_writer(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    /// Offers `record` to the writer registered as `name`.
    ///
    /// Unknown names are a no-op. A failed delivery is reported on the error
    /// stream. A fatal record counts against the barrier even when its
    /// delivery failed.
    pub fn deliver_to_writer(&self, record: &LogRecord, name: &str) -> Delivery {
        let label = self.read_config().labels.get(record.level()).to_string();
        let delivery = self.registry.deliver(record, &label, name);
        match &delivery {
            Delivery::NotFound => return delivery,
            Delivery::Failed(err) => self.report_failure(name, err),
            Delivery::Delivered => {}
        }
        self.registry.confirm(record, name);
        delivery
    }

    /// Offers `record` to every registered writer once. For a pending fatal
    /// record this drains the barrier and ends the process.
    pub fn fan_out_fatal(&self, record: &LogRecord) {
        for (name, _) in self.registry.writers() {
            self.deliver_to_writer(record, &name);
        }
    }

    pub fn barrier_state(&self) -> BarrierState {
        self.registry.barrier_state()
    }

    /// Names of the registered writers, in no particular order.
    pub fn writer_names(&self) -> Vec<String> {
        self.registry
            .writers()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use multilog_core::ChannelWriter;

    use super::*;
    use crate::{
        ConfigBuilder, logger_config,
        test_utils::{RecordingExit, SharedBuffer},
    };

    fn boom() -> io::Error {
        io::Error::other("boom")
    }

    fn broken(_: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected("down".into()))
    }

    /// Fixed "TS" timestamps, every level into one buffer.
    fn builder() -> (ConfigBuilder, SharedBuffer, Arc<RecordingExit>) {
        let out = SharedBuffer::default();
        let exit = Arc::new(RecordingExit::default());
        let builder = logger_config()
            .with_time_format("TS")
            .with_output_all(out.clone())
            .with_terminator(exit.clone());
        (builder, out, exit)
    }

    #[test]
    fn test_info_line_layout() {
        let (builder, out, _) = builder();
        let logger = builder.build();
        let record = logger.info("hello");
        assert_eq!(record.message(), "hello");
        assert_eq!(record.level(), Level::Info);
        assert_eq!(out.contents(), "TS INF hello\n");
    }

    #[test]
    fn test_each_enabled_level_writes_one_line() {
        let (builder, out, _) = builder();
        let logger = builder.build();
        logger.debug("d");
        logger.warn("w");
        logger.error("e", &boom());
        assert_eq!(out.contents(), "TS DBG d\nTS WRN w\nTS ERR e. error: boom\n");
    }

    #[test]
    fn test_disabled_levels_are_silent() {
        let (builder, out, _) = builder();
        let (writer, lines) = ChannelWriter::unbounded();
        let logger = builder
            .with_debug(false)
            .with_warn(false)
            .with_writer("remote", writer)
            .build();
        assert!(logger.debug("d").is_none());
        assert!(logger.warn("w").is_none());
        assert_eq!(out.contents(), "");
        assert!(lines.try_recv().is_err());
    }

    #[test]
    fn test_toggles_apply_at_runtime() {
        let (builder, out, _) = builder();
        let logger = builder.build();
        logger.configure(|config| config.enable_warn = false);
        assert!(logger.warn("hidden").is_none());
        logger.configure(|config| config.enable_warn = true);
        assert!(logger.warn("shown").is_some());
        assert_eq!(out.contents(), "TS WRN shown\n");
    }

    #[test]
    fn test_error_message_joins_description_and_failure() {
        let (builder, _, _) = builder();
        let logger = builder.build();
        let record = logger.error("ctx", &boom());
        assert_eq!(record.message(), "ctx. error: boom");
    }

    #[test]
    fn test_non_fatal_lines_fan_out_with_their_label() {
        let (builder, _, exit) = builder();
        let (writer, lines) = ChannelWriter::unbounded();
        let logger = builder.with_writer("remote", writer).build();
        logger.info("i");
        logger.debug("d");
        logger.error("e", &boom());
        let received: Vec<_> = lines.try_iter().map(|l| (l.level, l.message)).collect();
        assert_eq!(
            received,
            vec![
                ("INF".to_string(), "i".to_string()),
                ("DBG".to_string(), "d".to_string()),
                ("ERR".to_string(), "e. error: boom".to_string()),
            ]
        );
        assert!(exit.codes().is_empty());
    }

    #[test]
    fn test_fatal_without_writers_exits_after_writing() {
        let (builder, out, exit) = builder();
        let logger = builder.build();
        logger.fatal("x", &boom());
        assert_eq!(out.contents(), "TS FTL x. error: boom\n");
        assert_eq!(exit.codes(), vec![1]);
        assert_eq!(logger.barrier_state(), BarrierState::Terminated);
    }

    #[test]
    fn test_fatal_waits_for_every_writer() {
        let (builder, _, exit) = builder();
        let (w1, lines1) = ChannelWriter::unbounded();
        let (w2, lines2) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", w1).with_writer("w2", w2).build();

        let pending = logger.fatal("x", &boom());
        assert_eq!(logger.barrier_state(), BarrierState::Awaiting(2));
        assert!(exit.codes().is_empty());

        assert!(logger.deliver_to_writer(&pending, "w1").is_delivered());
        assert!(exit.codes().is_empty());
        assert_eq!(lines1.try_recv().unwrap().level, "FTL");

        assert!(logger.deliver_to_writer(&pending, "w2").is_delivered());
        assert_eq!(exit.codes(), vec![1]);
        assert_eq!(lines2.try_recv().unwrap().message, "x. error: boom");
    }

    #[test]
    fn test_delivery_past_zero_is_noop() {
        let (builder, _, exit) = builder();
        let (writer, _lines) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", writer).build();
        let pending = logger.fatal("x", &boom());
        logger.deliver_to_writer(&pending, "w1");
        logger.deliver_to_writer(&pending, "w1");
        assert_eq!(exit.codes(), vec![1]);
    }

    #[test]
    fn test_unknown_writer_is_noop_before_and_after_fatal() {
        let (builder, _, exit) = builder();
        let (writer, _lines) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", writer).build();
        let info = logger.info("i");
        assert!(matches!(
            logger.deliver_to_writer(&info, "missing"),
            Delivery::NotFound
        ));
        let pending = logger.fatal("x", &boom());
        assert!(matches!(
            logger.deliver_to_writer(&pending, "missing"),
            Delivery::NotFound
        ));
        assert!(exit.codes().is_empty());
        assert_eq!(logger.barrier_state(), BarrierState::Awaiting(1));
    }

    #[test]
    fn test_unregistered_writer_becomes_noop() {
        let (builder, _, _) = builder();
        let (writer, lines) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", writer).build();
        assert!(logger.unregister_writer("w1"));
        let record = logger.info("i");
        assert!(lines.try_recv().is_err());
        assert!(matches!(
            logger.deliver_to_writer(&record, "w1"),
            Delivery::NotFound
        ));
        assert!(logger.writer_names().is_empty());
    }

    #[test]
    fn test_writer_failure_is_reported_not_propagated() {
        let (builder, out, _) = builder();
        let logger = builder.with_writer("broken", broken).build();
        let record = logger.info("hi");
        assert_eq!(record.message(), "hi");
        assert_eq!(
            out.contents(),
            "TS INF hi\nTS ERR could not write to log writer \"broken\". error: message rejected: down\n"
        );
    }

    #[test]
    fn test_failed_fatal_delivery_still_counts() {
        let (builder, _, exit) = builder();
        let logger = builder.with_writer("broken", broken).build();
        let pending = logger.fatal("x", &boom());
        assert!(matches!(
            logger.deliver_to_writer(&pending, "broken"),
            Delivery::Failed(_)
        ));
        assert_eq!(exit.codes(), vec![1]);
    }

    #[test]
    fn test_fan_out_fatal_drains_barrier_once() {
        let (builder, _, exit) = builder();
        let (w1, lines1) = ChannelWriter::unbounded();
        let (w2, lines2) = ChannelWriter::unbounded();
        let logger = builder
            .with_writer("w1", w1)
            .with_writer("w2", w2)
            .with_writer("broken", broken)
            .with_fatal_exit_code(3)
            .build();
        let pending = logger.fatal("x", &boom());
        logger.fan_out_fatal(&pending);
        assert_eq!(exit.codes(), vec![3]);
        assert_eq!(lines1.try_iter().count(), 1);
        assert_eq!(lines2.try_iter().count(), 1);
    }

    #[test]
    fn test_unregister_during_fatal_counts_as_confirmed() {
        let (builder, _, exit) = builder();
        let (w1, _lines1) = ChannelWriter::unbounded();
        let (w2, _lines2) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", w1).with_writer("w2", w2).build();
        let pending = logger.fatal("x", &boom());
        logger.unregister_writer("w1");
        assert_eq!(logger.barrier_state(), BarrierState::Awaiting(1));
        logger.deliver_to_writer(&pending, "w2");
        assert_eq!(exit.codes(), vec![1]);
    }

    #[test]
    fn test_unregister_after_delivery_still_waits_for_others() {
        let (builder, _, exit) = builder();
        let (w1, _lines1) = ChannelWriter::unbounded();
        let (w2, lines2) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", w1).with_writer("w2", w2).build();
        let pending = logger.fatal("x", &boom());
        logger.deliver_to_writer(&pending, "w1");
        logger.unregister_writer("w1");
        assert!(exit.codes().is_empty());
        assert!(lines2.try_recv().is_err());

        logger.deliver_to_writer(&pending, "w2");
        assert_eq!(lines2.try_recv().unwrap().level, "FTL");
        assert_eq!(exit.codes(), vec![1]);
    }

    #[test]
    fn test_writer_added_after_fatal_does_not_release_barrier() {
        let (builder, _, exit) = builder();
        let (w1, lines1) = ChannelWriter::unbounded();
        let (late, _late_lines) = ChannelWriter::unbounded();
        let logger = builder.with_writer("w1", w1).build();
        let pending = logger.fatal("x", &boom());
        logger.register_writer("late", late);
        logger.unregister_writer("late");
        assert_eq!(logger.barrier_state(), BarrierState::Awaiting(1));
        assert!(exit.codes().is_empty());

        logger.deliver_to_writer(&pending, "w1");
        assert_eq!(lines1.try_recv().unwrap().message, "x. error: boom");
        assert_eq!(exit.codes(), vec![1]);
    }

    #[test]
    fn test_custom_layout_and_exit_code() {
        let (builder, out, exit) = builder();
        let logger = builder
            .with_item_separator(" | ")
            .with_line_ending("\r\n")
            .with_label(Level::Fatal, "FATAL")
            .with_fatal_exit_code(42)
            .build();
        logger.fatal("x", &boom());
        assert_eq!(out.contents(), "TS | FATAL | x. error: boom\r\n");
        assert_eq!(exit.codes(), vec![42]);
    }

    #[test]
    fn test_per_level_outputs() {
        let (builder, out, _) = builder();
        let errors = SharedBuffer::default();
        let logger = builder.with_output(Level::Error, errors.clone()).build();
        logger.info("i");
        logger.error("e", &boom());
        assert_eq!(out.contents(), "TS INF i\n");
        assert_eq!(errors.contents(), "TS ERR e. error: boom\n");

        let warnings = SharedBuffer::default();
        logger.set_output(Level::Warn, Box::new(warnings.clone()));
        logger.warn("w");
        assert_eq!(warnings.contents(), "TS WRN w\n");
    }

    #[test]
    fn test_rendering_is_byte_identical() {
        let (builder, out, _) = builder();
        let logger = builder.build();
        let record = logger.info("same");
        let config = logger.config();
        assert_eq!(record.render(&config), record.render(&config));
        assert_eq!(record.render(&config), out.contents());
    }
}
