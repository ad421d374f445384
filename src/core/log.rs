//! Log sinks for failure messages.
//!
//! The data-access layer hands every execution failure to a [`LogSink`] as a
//! single line of text. Failing to log is never an error for the caller.
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, warn};

/// Receives one text message per failure.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Default sink: forwards messages to `tracing` at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        error!(target: "thindb", "{}", message);
    }
}

/// Appends timestamped lines to a file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }
}

impl LogSink for FileSink {
    fn log(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!("Failed to write to log file {:?}: {}", self.path, e);
        }
    }
}

/// Keeps messages in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything logged so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
