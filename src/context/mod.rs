//! Hierarchical lock contexts.
//!
//! A [`LockContext`] is a handle to one node of the granularity hierarchy
//! (database, table, page, ...). It enforces the multigranularity protocol on
//! top of the [`LockManager`]: a mode may only be held at a node while the
//! parent holds a mode that admits it, and a lock may only be released once
//! nothing beneath it is still locked.
//!
//! Nodes live in an arena owned by the manager and are created lazily on
//! first lookup, so looking up the same name twice yields handles to the same
//! node.

mod tree;

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::lock::{LockError, LockManager, LockType, ResourceName};
use crate::transaction::{TransactionId, TransactionRef};

pub(crate) use tree::{ContextId, ContextTree};

#[derive(Clone)]
pub struct LockContext {
    manager: Arc<LockManager>,
    id: ContextId,
    name: ResourceName,
    readonly: bool,
    parent: Option<Arc<LockContext>>,
}

impl LockContext {
    pub(crate) fn root(manager: &Arc<LockManager>, segment: &str) -> Result<Self, LockError> {
        ResourceName::check_segment(segment)?;
        let disabled = manager.config().disables_children_of(segment);
        let mut tree = manager.tree_mut()?;
        let id = tree.root(segment, disabled);
        Ok(Self::attach(manager, &tree, id))
    }

    /// Resolve the context of `name`, creating missing nodes along the way.
    pub fn from_resource_name(
        manager: &Arc<LockManager>,
        name: &ResourceName,
    ) -> Result<Self, LockError> {
        {
            let tree = manager.tree()?;
            if let Some(id) = tree.find(name) {
                return Ok(Self::attach(manager, &tree, id));
            }
        }

        for segment in name.segments() {
            ResourceName::check_segment(segment)?;
        }
        let mut segments = name.segments().iter();
        let root = match segments.next() {
            Some(root) => root,
            None => return Err(LockError::InvalidResourceName(name.to_string())),
        };
        let disabled = manager.config().disables_children_of(root);
        let mut tree = manager.tree_mut()?;
        let mut id = tree.root(root, disabled);
        for segment in segments {
            id = tree.child(id, segment);
        }
        Ok(Self::attach(manager, &tree, id))
    }

    /// Resolve a `/`-separated path such as `"database/T1/17"`.
    pub fn from_path(manager: &Arc<LockManager>, path: &str) -> Result<Self, LockError> {
        let name: ResourceName = path.parse()?;
        Self::from_resource_name(manager, &name)
    }

    fn attach(manager: &Arc<LockManager>, tree: &ContextTree, id: ContextId) -> Self {
        let node = tree.node(id);
        LockContext {
            manager: Arc::clone(manager),
            id,
            name: node.name.clone(),
            readonly: node.readonly,
            parent: node
                .parent
                .map(|parent| Arc::new(Self::attach(manager, tree, parent))),
        }
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn manager(&self) -> &Arc<LockManager> {
        &self.manager
    }

    pub fn parent_context(&self) -> Option<&LockContext> {
        self.parent.as_deref()
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn child_locks_disabled(&self) -> Result<bool, LockError> {
        Ok(self.manager.tree()?.node(self.id).child_locks_disabled)
    }

    /// Make every child created from now on readonly. Existing children keep
    /// their flag but can no longer be locked through.
    pub fn disable_child_locks(&self) -> Result<(), LockError> {
        self.manager.tree_mut()?.disable_child_locks(self.id);
        Ok(())
    }

    /// The child context `segment`, created on first use. A segment that is
    /// empty or contains `/` is rejected.
    pub fn child_context(&self, segment: impl ToString) -> Result<LockContext, LockError> {
        let segment = segment.to_string();
        ResourceName::check_segment(&segment)?;
        let mut tree = self.manager.tree_mut()?;
        let id = tree.child(self.id, &segment);
        let node = tree.node(id);
        Ok(LockContext {
            manager: Arc::clone(&self.manager),
            id,
            name: node.name.clone(),
            readonly: node.readonly,
            parent: Some(Arc::new(self.clone())),
        })
    }

    /// Acquire an explicit `lock_type` here.
    ///
    /// Only an explicit lock at this node counts as a duplicate. A node that
    /// merely inherits a mode may still take a lock of its own when the parent
    /// admits it, e.g. `X` beneath a `SIX` parent.
    pub fn acquire(&self, transaction: &TransactionRef, lock_type: LockType) -> Result<(), LockError> {
        self.check_writable()?;
        let id = transaction.id();
        let held = self.explicit_lock_type(id)?;
        if held != LockType::NL {
            return Err(LockError::DuplicateLock {
                transaction: id,
                name: self.name.clone(),
                held,
            });
        }
        if lock_type == LockType::NL {
            return Err(LockError::InvalidLock(format!(
                "cannot acquire NL on {}",
                self.name
            )));
        }
        self.check_parent_admits(id, lock_type)?;
        self.manager.acquire(transaction, &self.name, lock_type)
    }

    /// Release the explicit lock here. Everything beneath must have been
    /// released first.
    pub fn release(&self, transaction: &TransactionRef) -> Result<(), LockError> {
        self.check_writable()?;
        let id = transaction.id();
        if self.explicit_lock_type(id)? == LockType::NL {
            return Err(LockError::NoLockHeld {
                transaction: id,
                name: self.name.clone(),
            });
        }
        let below = self.num_descendant_locks(id)?;
        if below > 0 {
            return Err(LockError::InvalidLock(format!(
                "transaction {} still holds {} lock(s) beneath {}",
                id, below, self.name
            )));
        }
        self.manager.release(transaction, &self.name)
    }

    /// Promote the explicit lock here to `lock_type`.
    ///
    /// Promoting to `SIX` also releases every `S` and `IS` lock the
    /// transaction holds beneath this node, in the same atomic step.
    pub fn promote(&self, transaction: &TransactionRef, lock_type: LockType) -> Result<(), LockError> {
        self.check_writable()?;
        let id = transaction.id();
        let held = self.explicit_lock_type(id)?;
        if held == LockType::NL {
            return Err(LockError::NoLockHeld {
                transaction: id,
                name: self.name.clone(),
            });
        }
        if held == lock_type {
            return Err(LockError::DuplicateLock {
                transaction: id,
                name: self.name.clone(),
                held,
            });
        }
        if !LockType::substitutable(lock_type, held) {
            return Err(LockError::InvalidLock(format!(
                "{} on {} cannot be promoted to {}",
                held, self.name, lock_type
            )));
        }
        self.check_parent_admits(id, lock_type)?;

        if lock_type != LockType::SIX {
            return self.manager.promote(transaction, &self.name, lock_type);
        }
        if self.has_six_ancestor(id)? {
            return Err(LockError::InvalidLock(format!(
                "an ancestor of {} already holds SIX",
                self.name
            )));
        }
        let mut released = self.sis_descendants(id)?;
        released.push(self.name.clone());
        debug!(
            "promoting {} to SIX for transaction {}, releasing {} lock(s) below",
            self.name,
            id,
            released.len() - 1
        );
        self.manager
            .acquire_and_release(transaction, &self.name, LockType::SIX, &released)
    }

    /// Replace the lock here and every lock beneath it with one `S` or `X`
    /// lock at this node.
    ///
    /// Does nothing when this node already holds `S` or `X`, or only inherits
    /// its mode from an ancestor, so calling it twice issues one request.
    pub fn escalate(&self, transaction: &TransactionRef) -> Result<(), LockError> {
        self.check_writable()?;
        let id = transaction.id();
        if self.effective_lock_type(id)? == LockType::NL {
            return Err(LockError::NoLockHeld {
                transaction: id,
                name: self.name.clone(),
            });
        }
        let held = self.explicit_lock_type(id)?;
        if !held.is_intent() {
            return Ok(());
        }

        let descendants: Vec<_> = self
            .manager
            .transaction_locks(id)?
            .into_iter()
            .filter(|lock| lock.name.is_descendant_of(&self.name))
            .collect();
        let exclusive = matches!(held, LockType::IX | LockType::SIX)
            || descendants
                .iter()
                .any(|lock| matches!(lock.lock_type, LockType::X | LockType::IX | LockType::SIX));
        let target = if exclusive { LockType::X } else { LockType::S };

        let mut released = Vec::with_capacity(descendants.len() + 1);
        released.push(self.name.clone());
        released.extend(descendants.into_iter().map(|lock| lock.name));
        debug!(
            "escalating {} from {} to {} for transaction {}",
            self.name, held, target, id
        );
        self.manager
            .acquire_and_release(transaction, &self.name, target, &released)
    }

    /// The mode held at exactly this node, or `NL`.
    pub fn explicit_lock_type(&self, transaction: TransactionId) -> Result<LockType, LockError> {
        self.manager.lock_type(transaction, &self.name)
    }

    /// The strongest mode the transaction is guaranteed here, whether held
    /// explicitly or implied by an ancestor.
    ///
    /// An explicit lock wins. Otherwise a parent's effective `S` or `X` is
    /// inherited, and a parent holding `SIX` yields `S` (SIX reads the whole
    /// subtree) rather than `NL`. A parent `IX` yields `S` only beneath a
    /// `SIX` ancestor. Anything else yields `NL`.
    pub fn effective_lock_type(&self, transaction: TransactionId) -> Result<LockType, LockError> {
        let explicit = self.explicit_lock_type(transaction)?;
        if explicit != LockType::NL {
            return Ok(explicit);
        }
        let parent = match &self.parent {
            Some(parent) => parent,
            None => return Ok(LockType::NL),
        };
        Ok(match parent.effective_lock_type(transaction)? {
            inherited @ (LockType::S | LockType::X) => inherited,
            LockType::SIX => LockType::S,
            LockType::IX if self.has_six_ancestor(transaction)? => LockType::S,
            _ => LockType::NL,
        })
    }

    /// Whether the transaction holds `SIX` on a strict ancestor of this node.
    pub fn has_six_ancestor(&self, transaction: TransactionId) -> Result<bool, LockError> {
        Ok(self
            .manager
            .transaction_locks(transaction)?
            .iter()
            .any(|lock| lock.lock_type == LockType::SIX && self.name.is_descendant_of(&lock.name)))
    }

    /// Names of the `S` and `IS` locks the transaction holds strictly beneath
    /// this node, in acquisition order.
    pub fn sis_descendants(&self, transaction: TransactionId) -> Result<Vec<ResourceName>, LockError> {
        Ok(self
            .manager
            .transaction_locks(transaction)?
            .into_iter()
            .filter(|lock| matches!(lock.lock_type, LockType::S | LockType::IS))
            .filter(|lock| lock.name.is_descendant_of(&self.name))
            .map(|lock| lock.name)
            .collect())
    }

    /// Number of locks the transaction holds strictly beneath this node.
    pub fn num_descendant_locks(&self, transaction: TransactionId) -> Result<usize, LockError> {
        self.manager.descendant_lock_count(&self.name, transaction)
    }

    fn check_writable(&self) -> Result<(), LockError> {
        if self.readonly {
            return Err(LockError::Unsupported(format!("{} is readonly", self.name)));
        }
        if let Some(parent) = &self.parent {
            if parent.child_locks_disabled()? {
                return Err(LockError::Unsupported(format!(
                    "child locks are disabled beneath {}",
                    parent.name
                )));
            }
        }
        Ok(())
    }

    fn check_parent_admits(&self, transaction: TransactionId, lock_type: LockType) -> Result<(), LockError> {
        let parent = match &self.parent {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let parent_type = parent.effective_lock_type(transaction)?;
        if LockType::can_be_parent(parent_type, lock_type) {
            return Ok(());
        }
        Err(LockError::InvalidLock(format!(
            "{} on {} does not admit {} on {}",
            parent_type, parent.name, lock_type, self.name
        )))
    }
}

impl fmt::Debug for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockContext")
            .field("name", &self.name)
            .field("readonly", &self.readonly)
            .finish()
    }
}

impl fmt::Display for LockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockContext({})", self.name)
    }
}
