use std::fmt;

use serde::{Deserialize, Serialize};

use super::{LockType, ResourceName};
use crate::transaction::{TransactionId, TransactionRef};

/// A granted lock: `lock_type` on `name`, owned by `transaction`.
///
/// Two locks refer to the same slot when they share `(name, transaction)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lock {
    pub name: ResourceName,
    pub lock_type: LockType,
    pub transaction: TransactionId,
}

impl Lock {
    pub fn new(name: ResourceName, lock_type: LockType, transaction: TransactionId) -> Self {
        Lock {
            name,
            lock_type,
            transaction,
        }
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}: {}({})", self.transaction, self.lock_type, self.name)
    }
}

/// A request that could not be granted when it was made.
///
/// `released` holds the locks to drop atomically at grant time (used by
/// acquire-and-release); it is empty for plain acquires and promotions.
#[derive(Clone)]
pub struct LockRequest {
    pub transaction: TransactionRef,
    pub lock: Lock,
    pub released: Vec<Lock>,
}

impl LockRequest {
    pub fn new(transaction: TransactionRef, lock: Lock) -> Self {
        LockRequest {
            transaction,
            lock,
            released: Vec::new(),
        }
    }

    pub fn with_released(transaction: TransactionRef, lock: Lock, released: Vec<Lock>) -> Self {
        LockRequest {
            transaction,
            lock,
            released,
        }
    }
}

impl fmt::Debug for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRequest")
            .field("transaction", &self.transaction.id())
            .field("lock", &self.lock)
            .field("released", &self.released)
            .finish()
    }
}

impl fmt::Display for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.released.is_empty() {
            return write!(f, "Request for {}", self.lock);
        }
        let released: Vec<String> = self.released.iter().map(Lock::to_string).collect();
        write!(
            f,
            "Request for {} (releasing {})",
            self.lock,
            released.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::RecordingTransaction;
    use std::sync::Arc;

    #[test]
    fn lock_display() {
        let lock = Lock::new("database/T1".parse().unwrap(), LockType::SIX, 3);
        assert_eq!(lock.to_string(), "T3: SIX(database/T1)");
    }

    #[test]
    fn request_display_lists_released_locks() {
        let db: ResourceName = "database".parse().unwrap();
        let txn: TransactionRef = Arc::new(RecordingTransaction::new(1));
        let request = LockRequest::with_released(
            txn,
            Lock::new(db.clone(), LockType::X, 1),
            vec![Lock::new(db.child("T1"), LockType::S, 1)],
        );
        assert_eq!(
            request.to_string(),
            "Request for T1: X(database) (releasing T1: S(database/T1))"
        );
        assert!(format!("{:?}", request).contains("transaction: 1"));
    }
}
