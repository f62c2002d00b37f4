//! Log buffer service
//!
//! Collects the diagnostics of the stage currently running: the command
//! lines it executed and the captured tool output. The engine drains the
//! buffer into the stage's outcome once the stage reaches a terminal state.

use slipway_core::domain::log::{LogEntry, LogLevel};
use std::sync::{Arc, Mutex};

/// Service for managing log buffers
pub trait LogBufferService: Send + Sync {
    /// Adds a log entry to the buffer
    fn add_entry(&self, entry: LogEntry);

    /// Drains all log entries from the buffer
    ///
    /// This returns all buffered entries and clears the buffer.
    fn drain(&self) -> Vec<LogEntry>;

    /// Adds a message at the given level, stamped now
    fn log(&self, level: LogLevel, message: String) {
        self.add_entry(LogEntry::now(level, message));
    }
}

/// In-memory implementation of LogBufferService
///
/// Uses Arc<Mutex<Vec<LogEntry>>> so clones share one buffer.
#[derive(Clone)]
pub struct InMemoryLogBuffer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl InMemoryLogBuffer {
    /// Creates a new in-memory log buffer
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryLogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBufferService for InMemoryLogBuffer {
    fn add_entry(&self, entry: LogEntry) {
        self.lock().push(entry);
    }

    fn drain(&self) -> Vec<LogEntry> {
        self.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_buffer() {
        let buffer = InMemoryLogBuffer::new();
        buffer.log(LogLevel::Info, "$ mvn clean install".to_string());
        buffer.log(LogLevel::Error, "BUILD FAILURE".to_string());
        assert_eq!(buffer.len(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].level, LogLevel::Error);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let buffer = InMemoryLogBuffer::new();
        let clone = buffer.clone();
        clone.log(LogLevel::Debug, "shared".to_string());
        assert_eq!(buffer.len(), 1);
    }
}
