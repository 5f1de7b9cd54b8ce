use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::{Mutex, PoisonError},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("target disconnected: {0}")]
    Disconnected(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// A secondary target receiving a copy of every log line.
///
/// Delivery is synchronous: when `deliver` returns `Ok` the line is
/// considered received by the target.
pub trait LogWriter: Send + Sync {
    fn deliver(&self, timestamp: &str, level: &str, message: &str) -> Result<(), DeliveryError>;
}

impl<F> LogWriter for F
where
    F: Fn(&str, &str, &str) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, timestamp: &str, level: &str, message: &str) -> Result<(), DeliveryError> {
        self(timestamp, level, message)
    }
}

/// Appends one space separated line per delivery to a file.
pub struct LogFile {
    file: Mutex<BufWriter<File>>,
}

impl LogFile {
    /// Opens `path` for appending, creating it if needed.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl LogWriter for LogFile {
    fn deliver(&self, timestamp: &str, level: &str, message: &str) -> Result<(), DeliveryError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{timestamp} {level} {message}")?;
        file.flush()?;
        Ok(())
    }
}

/// A line as received by a [`ChannelWriter`] consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Forwards lines to whoever holds the receiving end, e.g. a thread shipping
/// them to a remote sink.
#[derive(Clone)]
pub struct ChannelWriter {
    sender: Sender<LogLine>,
}

impl ChannelWriter {
    pub fn new(sender: Sender<LogLine>) -> Self {
        Self { sender }
    }

    pub fn unbounded() -> (Self, Receiver<LogLine>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }
}

impl LogWriter for ChannelWriter {
    fn deliver(&self, timestamp: &str, level: &str, message: &str) -> Result<(), DeliveryError> {
        self.sender
            .send(LogLine {
                timestamp: timestamp.into(),
                level: level.into(),
                message: message.into(),
            })
            .map_err(|_| DeliveryError::Disconnected("receiver dropped".into()))
    }
}
