use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    log_writer::{DeliveryError, LogWriter},
    record::LogRecord,
};

/// How the process ends once a fatal record has been handled.
pub trait Terminate: Send + Sync {
    fn terminate(&self, code: i32);
}

/// Exits the process immediately, without running destructors.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminate for ProcessExit {
    fn terminate(&self, code: i32) {
        std::process::exit(code)
    }
}

/// Observable state of the fatal barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Normal,
    /// Confirmations still expected before exit.
    Awaiting(usize),
    Terminated,
}

/// Outcome of handing a record to one named writer.
#[derive(Debug)]
pub enum Delivery {
    Delivered,
    Failed(DeliveryError),
    /// No writer under that name. The record was not delivered and this is
    /// not an error.
    NotFound,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

struct PendingFatal {
    record: LogRecord,
    remaining: usize,
    /// Writers registered when the barrier was armed that have not been
    /// offered the record yet.
    owed: HashSet<String>,
    exit_code: i32,
}

enum Barrier {
    Normal,
    Awaiting(PendingFatal),
    Terminated,
}

struct RegistryState {
    writers: HashMap<String, Arc<dyn LogWriter>>,
    /// Grows with every registration, overwrites included, and shrinks with
    /// every removal. Never reconciled with `writers.len()`.
    required: usize,
    barrier: Barrier,
}

/// Named writers plus the barrier holding process exit back until a fatal
/// record has been offered to each of them.
///
/// Writers are always called with the internal lock released, so a writer may
/// log through the same logger without deadlocking.
pub struct WriterRegistry {
    state: Mutex<RegistryState>,
    terminator: Arc<dyn Terminate>,
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::new(Arc::new(ProcessExit))
    }
}

impl WriterRegistry {
    pub fn new(terminator: Arc<dyn Terminate>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                writers: HashMap::new(),
                required: 0,
                barrier: Barrier::Normal,
            }),
            terminator,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, name: impl Into<String>, writer: Arc<dyn LogWriter>) {
        let mut state = self.lock();
        state.writers.insert(name.into(), writer);
        state.required += 1;
    }

    /// Removes `name`. Returns `false` if it was not registered.
    ///
    /// While a fatal record is pending and still owed to `name`, that
    /// confirmation counts as given, which may end the process. Writers that
    /// already confirmed or joined after the barrier was armed do not count.
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.lock();
        if state.writers.remove(name).is_none() {
            return false;
        }
        state.required = state.required.saturating_sub(1);
        let owed = match &mut state.barrier {
            Barrier::Awaiting(pending) => pending.owed.remove(name),
            Barrier::Normal | Barrier::Terminated => false,
        };
        let exit_code = if owed {
            Self::confirm_locked(&mut state)
        } else {
            None
        };
        drop(state);
        if let Some(code) = exit_code {
            self.terminator.terminate(code);
        }
        true
    }

    pub fn writer(&self, name: &str) -> Option<Arc<dyn LogWriter>> {
        self.lock().writers.get(name).cloned()
    }

    /// Snapshot of the registered writers.
    pub fn writers(&self) -> Vec<(String, Arc<dyn LogWriter>)> {
        self.lock()
            .writers
            .iter()
            .map(|(name, writer)| (name.clone(), Arc::clone(writer)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Confirmations a fatal record emitted now would wait for.
    pub fn required(&self) -> usize {
        self.lock().required
    }

    pub fn barrier_state(&self) -> BarrierState {
        match &self.lock().barrier {
            Barrier::Normal => BarrierState::Normal,
            Barrier::Awaiting(pending) => BarrierState::Awaiting(pending.remaining),
            Barrier::Terminated => BarrierState::Terminated,
        }
    }

    /// The fatal record currently holding the process back, if any.
    pub fn pending(&self) -> Option<LogRecord> {
        match &self.lock().barrier {
            Barrier::Awaiting(pending) => Some(pending.record.clone()),
            Barrier::Normal | Barrier::Terminated => None,
        }
    }

    /// Arms the barrier for a fatal record whose primary line is written.
    ///
    /// With no writer required the process ends right away. A record arriving
    /// while another is pending joins the existing countdown.
    pub fn arm_fatal(&self, record: &LogRecord, exit_code: i32) -> BarrierState {
        let mut state = self.lock();
        match &state.barrier {
            Barrier::Awaiting(pending) => return BarrierState::Awaiting(pending.remaining),
            Barrier::Terminated => return BarrierState::Terminated,
            Barrier::Normal => {}
        }
        if state.required == 0 {
            state.barrier = Barrier::Terminated;
            drop(state);
            self.terminator.terminate(exit_code);
            return BarrierState::Terminated;
        }
        let remaining = state.required;
        let owed = state.writers.keys().cloned().collect();
        state.barrier = Barrier::Awaiting(PendingFatal {
            record: record.clone(),
            remaining,
            owed,
            exit_code,
        });
        BarrierState::Awaiting(remaining)
    }

    /// Hands `record` to the writer registered as `name`, labelled `label`.
    pub fn deliver(&self, record: &LogRecord, label: &str, name: &str) -> Delivery {
        let Some(writer) = self.writer(name) else {
            return Delivery::NotFound;
        };
        match writer.deliver(record.timestamp(), label, record.message()) {
            Ok(()) => Delivery::Delivered,
            Err(err) => Delivery::Failed(err),
        }
    }

    /// Counts one confirmation from `name` of a fatal record against the
    /// barrier, whether the delivery succeeded or not. Non-fatal records and
    /// calls past zero are no-ops.
    pub fn confirm(&self, record: &LogRecord, name: &str) -> BarrierState {
        if !record.is_fatal() {
            return self.barrier_state();
        }
        let mut state = self.lock();
        if let Barrier::Awaiting(pending) = &mut state.barrier {
            pending.owed.remove(name);
        }
        let exit_code = Self::confirm_locked(&mut state);
        drop(state);
        match exit_code {
            Some(code) => {
                self.terminator.terminate(code);
                BarrierState::Terminated
            }
            None => self.barrier_state(),
        }
    }

    fn confirm_locked(state: &mut RegistryState) -> Option<i32> {
        let Barrier::Awaiting(pending) = &mut state.barrier else {
            return None;
        };
        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.remaining > 0 {
            return None;
        }
        let code = pending.exit_code;
        state.barrier = Barrier::Terminated;
        Some(code)
    }
}
