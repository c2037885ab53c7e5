use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorLevel {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct ErrorEntry {
    pub timestamp: SystemTime,
    pub level: ErrorLevel,
    pub message: String,
    pub target: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub fields: HashMap<String, String>,
}

/// Bounded log of warnings and errors for display in the UI
#[derive(Clone)]
pub struct ErrorStore {
    entries: Arc<Mutex<VecDeque<ErrorEntry>>>,
    max_entries: usize,
}

impl ErrorStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries,
        }
    }

    pub fn add_entry(&self, entry: ErrorEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);

        // FIFO eviction when exceeding max
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub fn get_all_entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ErrorLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == ErrorLevel::Warning)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for ErrorStore {
    fn default() -> Self {
        Self::new(100)
    }
}
