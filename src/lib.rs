pub mod context;
pub mod lock;
pub mod lock_util;
pub mod observer;
pub mod transaction;

pub use context::LockContext;
pub use lock::{
    Lock, LockError, LockManager, LockManagerConfig, LockRequest, LockTableSnapshot, LockType,
    ResourceName, ResourceSnapshot,
};
pub use lock_util::{ensure_ancestors, ensure_sufficient_lock_held, release_all_locks};
#[cfg(feature = "emitter")]
pub use observer::EmitterObserver;
pub use observer::{LockEvent, LockObserver, LogObserver, LogObserverError, RecordingObserver};
pub use transaction::{RecordingTransaction, ThreadTransaction, Transaction, TransactionId, TransactionRef};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
