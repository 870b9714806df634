use std::{collections::VecDeque, fmt::Write};

use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// Fixed size, timestamped log of notable events kept for diagnostics.
#[derive(Debug)]
pub struct EventLog {
    title: String,
    capacity: usize,
    entries: Mutex<VecDeque<Entry>>,
}

#[derive(Debug)]
struct Entry {
    at: DateTime<Local>,
    message: String,
}

impl EventLog {
    /// Create a log that keeps the last `capacity` events.
    pub fn new(title: impl Into<String>, capacity: usize) -> Self {
        Self {
            title: title.into(),
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records an event, dropping the oldest one when full.
    pub fn record(&self, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Entry {
            at: Local::now(),
            message: message.into(),
        });
    }

    /// Recorded messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Appends a human readable rendering of the log to `out`.
    pub fn dump(&self, out: &mut String) {
        let entries = self.entries.lock();
        let _ = writeln!(out, "{}:", self.title);
        if entries.is_empty() {
            let _ = writeln!(out, "    <empty>");
        }
        for entry in entries.iter() {
            let _ = writeln!(
                out,
                "    {} {}",
                entry.at.format("%m-%d %H:%M:%S%.3f"),
                entry.message
            );
        }
    }
}
