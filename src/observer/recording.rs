use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::{LockEvent, LockObserver};

/// Keeps every observed event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LockEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events observed so far, oldest first.
    pub fn events(&self) -> Vec<LockEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the mutating-call events.
    pub fn calls(&self) -> Vec<LockEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.is_call())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LockObserver for RecordingObserver {
    fn observe(&self, event: &LockEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogObserverError {
    BufferPoisoned,
}

impl fmt::Display for LogObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogObserverError::BufferPoisoned => write!(f, "log observer buffer poisoned"),
        }
    }
}

impl std::error::Error for LogObserverError {}

/// Formats each event as one `[LOCK] <kind> <json>` line, written to a
/// shared buffer or to `log::info!`.
pub struct LogObserver {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl LogObserver {
    pub fn new() -> Self {
        LogObserver { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogObserver {
            buffer: Some(buffer),
        }
    }

    fn write(&self, event: &LockEvent) -> Result<(), LogObserverError> {
        let line = format!("[LOCK] {} {}", event.kind(), event.to_json());
        if let Some(buffer) = &self.buffer {
            let mut buffer = buffer
                .lock()
                .map_err(|_| LogObserverError::BufferPoisoned)?;
            buffer.push(line);
        } else {
            log::info!("{}", line);
        }
        Ok(())
    }
}

impl LockObserver for LogObserver {
    fn observe(&self, event: &LockEvent) {
        if let Err(e) = self.write(event) {
            log::warn!("dropping lock event {}: {}", event.kind(), e);
        }
    }
}
