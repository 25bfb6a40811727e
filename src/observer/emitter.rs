use std::sync::{Mutex, PoisonError};

use event_emitter_rs::EventEmitter;

use super::{LockEvent, LockObserver};

/// Republishes lock events on an [`EventEmitter`] for in-process listeners.
///
/// Each event is emitted under its kind (`"acquire"`, `"granted"`, ...) with
/// its JSON form as payload. Listeners run on the emitter's own threads, so
/// they may call back into the lock manager.
pub struct EmitterObserver {
    emitter: Mutex<EventEmitter>,
}

impl EmitterObserver {
    pub fn new(emitter: EventEmitter) -> Self {
        EmitterObserver {
            emitter: Mutex::new(emitter),
        }
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: &str, listener: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.emitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on(kind, listener);
    }
}

impl Default for EmitterObserver {
    fn default() -> Self {
        Self::new(EventEmitter::new())
    }
}

impl LockObserver for EmitterObserver {
    fn observe(&self, event: &LockEvent) {
        self.emitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(event.kind(), event.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockType, ResourceName};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn emits_by_kind() {
        let observer = EmitterObserver::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        observer.on("granted", move |payload: String| {
            sink.lock().unwrap().push(payload);
        });

        observer.observe(&LockEvent::Release {
            transaction: 1,
            name: ResourceName::new("database"),
        });
        observer.observe(&LockEvent::Granted {
            transaction: 2,
            name: ResourceName::new("database"),
            lock_type: LockType::S,
        });

        // EventEmitter is async, give it time
        thread::sleep(Duration::from_millis(50));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains(r#""transaction":2"#));
    }
}
