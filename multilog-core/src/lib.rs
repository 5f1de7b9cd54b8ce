//! # multilog-core
//! Core machinery for multilog - records, writer plugins, the writer registry
//! and the fatal barrier.

mod config;
mod log_writer;
mod record;
mod registry;

pub use config::{ConfigError, DEFAULT_TIME_FORMAT, Labels, LogConfig};
pub use log_writer::{ChannelWriter, DeliveryError, LogFile, LogLine, LogWriter};
pub use record::{ERROR_WORD, Level, LogRecord};
pub use registry::{BarrierState, Delivery, ProcessExit, Terminate, WriterRegistry};
