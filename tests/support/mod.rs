pub mod mock_daemon;

use std::cell::RefCell;

use empath_p0f::LogSink;

/// Keeps every line written to it.
#[derive(Default)]
pub struct RecordingSink {
    lines: RefCell<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl LogSink for RecordingSink {
    fn log_write(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }
}
