//! Log capture for front-ends that own the terminal.
//!
//! [`LogCollector`] is a `tracing` layer that keeps the most recent events in
//! a bounded ring buffer; [`LogReader`] hands them to a UI panel. Structured
//! fields are rendered after the message as `key=value`.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Monotonic sequence number, starting at 0 for the first event.
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Ring {
    fn push(&mut self, level: Level, target: String, message: String) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            seq: self.next_seq,
            timestamp: Local::now(),
            level,
            target,
            message,
        });
        self.next_seq += 1;
    }
}

#[derive(Debug, Clone)]
pub struct LogCollector {
    ring: Arc<Mutex<Ring>>,
    max_level: Level,
}

impl LogCollector {
    /// Keep at most `capacity` entries, at every level.
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                next_seq: 0,
            })),
            max_level: Level::TRACE,
        }
    }

    /// Drop events more verbose than `level`.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    pub fn reader(&self) -> LogReader {
        LogReader {
            ring: Arc::clone(&self.ring),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut ring) = self.ring.lock() {
            ring.push(
                *metadata.level(),
                metadata.target().to_string(),
                visitor.finish(),
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogReader {
    ring: Arc<Mutex<Ring>>,
}

impl LogReader {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.ring
            .lock()
            .map(|ring| ring.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries with `seq >= from`, for incremental consumers.
    pub fn entries_since(&self, from: u64) -> Vec<LogEntry> {
        self.ring
            .lock()
            .map(|ring| {
                ring.entries
                    .iter()
                    .filter(|e| e.seq >= from)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().map(|ring| ring.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects the message plus any structured fields.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }
}
