use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use multilog_core::Terminate;

/// Cloneable in-memory stream.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records exit codes instead of ending the test process.
#[derive(Default)]
pub struct RecordingExit(Mutex<Vec<i32>>);

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.0.lock().unwrap().clone()
    }
}

impl Terminate for RecordingExit {
    fn terminate(&self, code: i32) {
        self.0.lock().unwrap().push(code);
    }
}
