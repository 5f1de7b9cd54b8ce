use std::{
    io::{self, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};

use multilog_core::Level;

/// Destination of the primary lines of one level.
pub type OutputStream = Box<dyn Write + Send>;

/// One independently replaceable destination per level.
pub(crate) struct Streams {
    info: Mutex<OutputStream>,
    debug: Mutex<OutputStream>,
    warn: Mutex<OutputStream>,
    error: Mutex<OutputStream>,
    fatal: Mutex<OutputStream>,
}

impl Default for Streams {
    fn default() -> Self {
        let stderr = || Mutex::new(Box::new(io::stderr()) as OutputStream);
        Self {
            info: stderr(),
            debug: stderr(),
            warn: stderr(),
            error: stderr(),
            fatal: stderr(),
        }
    }
}

impl Streams {
    fn lock(&self, level: Level) -> MutexGuard<'_, OutputStream> {
        let slot = match level {
            Level::Info => &self.info,
            Level::Debug => &self.debug,
            Level::Warn => &self.warn,
            Level::Error => &self.error,
            Level::Fatal => &self.fatal,
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps the destination of `level`, returning the previous one.
    pub fn replace(&self, level: Level, stream: OutputStream) -> OutputStream {
        std::mem::replace(&mut *self.lock(level), stream)
    }

    /// Writes and flushes one line. Failures are dropped: the primary stream
    /// is where failures would be reported.
    pub fn write(&self, level: Level, line: &str) {
        let mut stream = self.lock(level);
        stream.write_all(line.as_bytes()).ok();
        stream.flush().ok();
    }
}
