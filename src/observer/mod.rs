//! Hooks for watching lock-table activity.
//!
//! Observers are invoked inside the lock manager's critical section, in the
//! order the table changes. They must not call back into the manager.
//!
//! Observers are optional diagnostics. The manager keeps no record of lock
//! state outside memory and never reads anything back from an observer;
//! [`LogObserver`] and [`EmitterObserver`] only forward events for tracing.

#[cfg(feature = "emitter")]
mod emitter;
mod recording;

use serde::{Deserialize, Serialize};

use crate::lock::{LockType, ResourceName};
use crate::transaction::TransactionId;

#[cfg(feature = "emitter")]
pub use emitter::EmitterObserver;
pub use recording::{LogObserver, LogObserverError, RecordingObserver};

/// Something that happened in the lock table.
///
/// The first four variants are the mutating calls, each reported once after
/// its validation passed. `Blocked` follows a call that had to wait and
/// `Granted` reports a queued request leaving the wait queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LockEvent {
    Acquire {
        transaction: TransactionId,
        name: ResourceName,
        lock_type: LockType,
    },
    Release {
        transaction: TransactionId,
        name: ResourceName,
    },
    Promote {
        transaction: TransactionId,
        name: ResourceName,
        lock_type: LockType,
    },
    AcquireAndRelease {
        transaction: TransactionId,
        name: ResourceName,
        lock_type: LockType,
        released: Vec<ResourceName>,
    },
    Blocked {
        transaction: TransactionId,
        name: ResourceName,
        lock_type: LockType,
    },
    Granted {
        transaction: TransactionId,
        name: ResourceName,
        lock_type: LockType,
    },
}

impl LockEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LockEvent::Acquire { .. } => "acquire",
            LockEvent::Release { .. } => "release",
            LockEvent::Promote { .. } => "promote",
            LockEvent::AcquireAndRelease { .. } => "acquire_and_release",
            LockEvent::Blocked { .. } => "blocked",
            LockEvent::Granted { .. } => "granted",
        }
    }

    pub fn transaction(&self) -> TransactionId {
        match self {
            LockEvent::Acquire { transaction, .. }
            | LockEvent::Release { transaction, .. }
            | LockEvent::Promote { transaction, .. }
            | LockEvent::AcquireAndRelease { transaction, .. }
            | LockEvent::Blocked { transaction, .. }
            | LockEvent::Granted { transaction, .. } => *transaction,
        }
    }

    /// True for events reporting a mutating call on the lock manager.
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            LockEvent::Acquire { .. }
                | LockEvent::Release { .. }
                | LockEvent::Promote { .. }
                | LockEvent::AcquireAndRelease { .. }
        )
    }

    /// JSON form, e.g. `{"kind":"release","transaction":1,"name":["database"]}`.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Receives every [`LockEvent`] of a lock manager.
pub trait LockObserver: Send + Sync {
    fn observe(&self, event: &LockEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_tagged_by_kind() {
        let event = LockEvent::Release {
            transaction: 1,
            name: ResourceName::new("database"),
        };
        assert_eq!(
            event.to_json(),
            r#"{"kind":"release","transaction":1,"name":["database"]}"#
        );
        let back: LockEvent = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn calls_and_notifications() {
        let name = ResourceName::new("database");
        let call = LockEvent::AcquireAndRelease {
            transaction: 2,
            name: name.clone(),
            lock_type: LockType::X,
            released: vec![name.clone()],
        };
        let granted = LockEvent::Granted {
            transaction: 3,
            name,
            lock_type: LockType::S,
        };
        assert!(call.is_call());
        assert!(!granted.is_call());
        assert_eq!(call.kind(), "acquire_and_release");
        assert_eq!(granted.transaction(), 3);
    }
}
