use std::fmt;

use super::{LockType, ResourceName};
use crate::transaction::TransactionId;

/// Error type for lock operations.
///
/// Every variant is reported before any lock state is touched, so a failed
/// call leaves the lock table exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The transaction already holds a lock on the resource and the call was
    /// an acquire rather than a promotion.
    DuplicateLock {
        transaction: TransactionId,
        name: ResourceName,
        held: LockType,
    },
    /// The transaction holds no lock on a resource it tried to release or
    /// promote.
    NoLockHeld {
        transaction: TransactionId,
        name: ResourceName,
    },
    /// The request would break the multigranularity hierarchy or is not a
    /// valid substitution.
    InvalidLock(String),
    /// Locking is not allowed through this context (readonly, or child locks
    /// disabled at the parent).
    Unsupported(String),
    /// A resource path could not be parsed.
    InvalidResourceName(String),
    /// A configuration document could not be parsed.
    InvalidConfig(String),
    /// An internal lock primitive was poisoned (a thread panicked while holding it).
    Poisoned(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::DuplicateLock {
                transaction,
                name,
                held,
            } => write!(
                f,
                "transaction {} already holds {} on {}",
                transaction, held, name
            ),
            LockError::NoLockHeld { transaction, name } => {
                write!(f, "transaction {} holds no lock on {}", transaction, name)
            }
            LockError::InvalidLock(msg) => write!(f, "invalid lock request: {}", msg),
            LockError::Unsupported(msg) => write!(f, "unsupported lock operation: {}", msg),
            LockError::InvalidResourceName(msg) => write!(f, "invalid resource name: {}", msg),
            LockError::InvalidConfig(msg) => write!(f, "invalid lock manager config: {}", msg),
            LockError::Poisoned(msg) => write!(f, "lock poisoned: {}", msg),
        }
    }
}

impl std::error::Error for LockError {}
