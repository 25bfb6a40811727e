//! Transaction handles consumed by the lock manager.
//!
//! The lock manager never creates transactions. It only needs a stable
//! identity and the three suspension primitives used by the two-phase
//! suspend: `prepare_block` is called while the manager's critical section
//! is still held, `block` after it has been left, and `unblock` by whichever
//! thread grants the queued request. An `unblock` that arrives between
//! `prepare_block` and `block` must not be lost.

mod in_memory;
mod recording;

use std::sync::Arc;

pub use in_memory::ThreadTransaction;
pub use recording::RecordingTransaction;

/// Stable numeric identity of a transaction.
pub type TransactionId = u64;

/// Shared handle to a transaction, as stored in wait queues.
pub type TransactionRef = Arc<dyn Transaction>;

/// A transaction as seen by the lock manager.
pub trait Transaction: Send + Sync {
    fn id(&self) -> TransactionId;

    /// Mark the transaction as about to wait. Does not suspend.
    fn prepare_block(&self);

    /// Suspend the calling thread until `unblock` is (or already was) called
    /// after the matching `prepare_block`.
    fn block(&self);

    /// Wake a transaction suspended in `block`.
    fn unblock(&self);
}
