//! In-process log console.
//!
//! A tracing layer mirrors every event into a bounded ring of formatted
//! lines that the interactive shell can print on demand.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Local;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounded, append-only buffer of log lines. The oldest line is evicted
/// once capacity is reached.
#[derive(Debug)]
pub struct LogConsole {
    inner: Mutex<Ring>,
}

#[derive(Debug)]
struct Ring {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LogConsole {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring {
                lines: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity: capacity.max(1),
            }),
        }
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        // A panic while holding the lock leaves the ring usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, line: String) {
        let mut ring = self.ring();
        while ring.lines.len() >= ring.capacity {
            ring.lines.pop_front();
        }
        ring.lines.push_back(line);
    }

    /// Change the capacity, dropping the oldest lines if it shrank
    pub fn set_capacity(&self, capacity: usize) {
        let mut ring = self.ring();
        ring.capacity = capacity.max(1);
        while ring.lines.len() > ring.capacity {
            ring.lines.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring().capacity
    }

    /// The most recent `n` lines, oldest first
    pub fn tail(&self, n: usize) -> Vec<String> {
        let ring = self.ring();
        let skip = ring.lines.len().saturating_sub(n);
        ring.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring().lines.len()
    }
}

impl Default for LogConsole {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Collects the message plus any structured fields as `key=value`
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}

/// Tracing layer feeding a [`LogConsole`]
pub struct ConsoleLayer {
    console: Arc<LogConsole>,
}

impl ConsoleLayer {
    pub fn new(console: Arc<LogConsole>) -> Self {
        Self { console }
    }
}

impl<S> Layer<S> for ConsoleLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let message = if visitor.message.is_empty() {
            event.metadata().name().to_string()
        } else {
            visitor.message
        };

        self.console.push(format!(
            "{} | {} | {}{}",
            Local::now().format("%H:%M:%S"),
            event.metadata().level(),
            message,
            visitor.fields
        ));
    }
}
