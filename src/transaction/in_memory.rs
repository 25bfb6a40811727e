use std::sync::{Condvar, Mutex, PoisonError};

use super::{Transaction, TransactionId};

/// Thread-backed transaction handle using `Mutex<bool>` + `Condvar`.
///
/// `prepare_block` raises the blocked flag, `block` waits until it is
/// lowered, and `unblock` lowers it and wakes the waiter. Because the flag is
/// raised before the lock manager releases its critical section, an
/// `unblock` delivered before `block` simply makes `block` return at once.
pub struct ThreadTransaction {
    id: TransactionId,
    blocked: Mutex<bool>,
    wake: Condvar,
}

impl ThreadTransaction {
    pub fn new(id: TransactionId) -> Self {
        ThreadTransaction {
            id,
            blocked: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Whether the transaction is between `prepare_block` and `unblock`.
    pub fn is_blocked(&self) -> bool {
        *self.blocked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transaction for ThreadTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    fn prepare_block(&self) {
        let mut blocked = self.blocked.lock().unwrap_or_else(PoisonError::into_inner);
        *blocked = true;
    }

    fn block(&self) {
        let mut blocked = self.blocked.lock().unwrap_or_else(PoisonError::into_inner);
        while *blocked {
            blocked = self
                .wake
                .wait(blocked)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn unblock(&self) {
        let mut blocked = self.blocked.lock().unwrap_or_else(PoisonError::into_inner);
        if *blocked {
            *blocked = false;
            self.wake.notify_all();
        }
    }
}

impl std::fmt::Debug for ThreadTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadTransaction")
            .field("id", &self.id)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn new_transaction_is_not_blocked() {
        let txn = ThreadTransaction::new(1);
        assert_eq!(txn.id(), 1);
        assert!(!txn.is_blocked());
        // block without prepare returns immediately
        txn.block();
    }

    #[test]
    fn unblock_before_block_is_not_lost() {
        let txn = ThreadTransaction::new(1);
        txn.prepare_block();
        assert!(txn.is_blocked());
        txn.unblock();
        txn.block();
        assert!(!txn.is_blocked());
    }

    #[test]
    fn block_waits_for_unblock_from_another_thread() {
        let txn = Arc::new(ThreadTransaction::new(2));
        txn.prepare_block();

        let waker = Arc::clone(&txn);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            waker.unblock();
        });

        txn.block();
        assert!(!txn.is_blocked());
        handle.join().unwrap();
    }

    #[test]
    fn unblock_without_prepare_is_a_no_op() {
        let txn = ThreadTransaction::new(3);
        txn.unblock();
        assert!(!txn.is_blocked());
    }
}
