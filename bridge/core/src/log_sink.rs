use nesbridge_common::log::{LogLine, Severity};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Destination for user-visible diagnostic lines.
///
/// Implementations must not panic: the sink is the runtime's only output channel and is
/// called from inside foreign callbacks.
pub trait LogSink {
    fn write(&self, severity: Severity, text: &str);

    fn info(&self, text: &str) {
        self.write(Severity::Info, text);
    }

    fn error(&self, text: &str) {
        self.write(Severity::Error, text);
    }
}

impl<T: LogSink + ?Sized> LogSink for Rc<T> {
    fn write(&self, severity: Severity, text: &str) {
        (**self).write(severity, text);
    }
}

/// In-memory append-only log, optionally capped to the most recent `capacity` lines.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: RefCell<VecDeque<LogLine>>,
    capacity: Option<usize>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            lines: RefCell::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.borrow().iter().cloned().collect()
    }

    pub fn errors(&self) -> Vec<LogLine> {
        self.lines
            .borrow()
            .iter()
            .filter(|l| l.is_error())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }
}

impl LogSink for MemoryLog {
    fn write(&self, severity: Severity, text: &str) {
        // A reentrant write from inside a borrow is dropped rather than panicking.
        let Ok(mut lines) = self.lines.try_borrow_mut() else {
            return;
        };
        if let Some(cap) = self.capacity {
            while lines.len() >= cap.max(1) {
                lines.pop_front();
            }
        }
        lines.push_back(LogLine::new(severity, text));
    }
}
