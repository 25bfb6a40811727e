use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{Transaction, TransactionId};

/// Transaction handle that records suspension calls instead of suspending.
///
/// Useful for single-threaded harnesses and simulations: a request that
/// would block returns right away with [`RecordingTransaction::is_blocked`]
/// set, and a later grant from the wait queue clears it.
#[derive(Debug)]
pub struct RecordingTransaction {
    id: TransactionId,
    blocked: AtomicBool,
    block_calls: AtomicUsize,
    unblock_calls: AtomicUsize,
}

impl RecordingTransaction {
    pub fn new(id: TransactionId) -> Self {
        RecordingTransaction {
            id,
            blocked: AtomicBool::new(false),
            block_calls: AtomicUsize::new(0),
            unblock_calls: AtomicUsize::new(0),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Number of times `block` was called.
    pub fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    /// Number of times `unblock` was called.
    pub fn unblock_calls(&self) -> usize {
        self.unblock_calls.load(Ordering::SeqCst)
    }
}

impl Transaction for RecordingTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn prepare_block(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    fn block(&self) {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn unblock(&self) {
        self.unblock_calls.fetch_add(1, Ordering::SeqCst);
        self.blocked.store(false, Ordering::SeqCst);
    }
}
