//! Shared helpers for the integration suites.

#![allow(dead_code)]

use multigrain::{
    LockManager, LockManagerConfig, RecordingObserver, RecordingTransaction, ResourceName,
    Transaction, TransactionId, TransactionRef,
};
use std::sync::Arc;

/// A recording transaction plus the trait-object handle the manager wants.
pub struct TestTxn {
    pub recording: Arc<RecordingTransaction>,
    pub handle: TransactionRef,
}

impl TestTxn {
    pub fn new(id: TransactionId) -> Self {
        let recording = Arc::new(RecordingTransaction::new(id));
        let handle: TransactionRef = recording.clone();
        TestTxn { recording, handle }
    }

    pub fn id(&self) -> TransactionId {
        self.recording.id()
    }

    pub fn is_blocked(&self) -> bool {
        self.recording.is_blocked()
    }
}

pub fn name(path: &str) -> ResourceName {
    path.parse().unwrap()
}

pub fn manager() -> Arc<LockManager> {
    Arc::new(LockManager::new())
}

/// A manager whose every event is recorded.
pub fn observed_manager() -> (Arc<LockManager>, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let manager = Arc::new(
        LockManager::new()
            .with_config(LockManagerConfig::default())
            .with_observer(observer.clone()),
    );
    (manager, observer)
}

/// Locks held by `transaction` rendered as `MODE(path)`, in acquisition order.
pub fn held(manager: &LockManager, transaction: TransactionId) -> Vec<String> {
    manager
        .transaction_locks(transaction)
        .unwrap()
        .iter()
        .map(|lock| format!("{}({})", lock.lock_type, lock.name))
        .collect()
}
