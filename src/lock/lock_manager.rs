use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::resource_entry::LockTable;
use super::snapshot::{LockTableSnapshot, ResourceSnapshot};
use super::{Lock, LockError, LockManagerConfig, LockRequest, LockType, ResourceName};
use crate::context::{ContextTree, LockContext};
use crate::observer::{LockEvent, LockObserver};
use crate::transaction::{TransactionId, TransactionRef};

/// Bookkeeping for which transactions hold which locks on which resources,
/// plus the per-resource wait queues.
///
/// The manager knows nothing about granularity: it treats every
/// [`ResourceName`] as an independent resource. The hierarchy rules live in
/// [`LockContext`], which callers should generally go through instead.
///
/// All table mutations happen inside one manager-wide critical section. A
/// request that cannot be granted is queued and the caller suspended with the
/// two-phase protocol: `prepare_block` inside the section, `block` after it.
/// Whoever later drains the queue grants the request and calls `unblock`.
///
/// Queues are drained front to back and draining stops at the first request
/// that cannot be granted, so with `S(A) X(A) S(A)` queued only the first
/// request is granted when `A` frees up.
pub struct LockManager {
    config: LockManagerConfig,
    table: Mutex<LockTable>,
    contexts: RwLock<ContextTree>,
    observers: Vec<Arc<dyn LockObserver>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            config: LockManagerConfig::default(),
            table: Mutex::new(LockTable::default()),
            contexts: RwLock::new(ContextTree::default()),
            observers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: LockManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an observer for every [`LockEvent`].
    pub fn with_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.config
    }

    /// Acquire `lock_type` on `name` for `transaction`.
    ///
    /// Granted at once when nobody is queued on `name` and the mode is
    /// compatible with every granted lock; otherwise the request goes to the
    /// back of the queue and the caller blocks until it is granted.
    pub fn acquire(
        &self,
        transaction: &TransactionRef,
        name: &ResourceName,
        lock_type: LockType,
    ) -> Result<(), LockError> {
        let id = transaction.id();
        let blocked = {
            let mut table = self.table()?;
            let held = table.lock_type(id, name);
            if held != LockType::NL {
                return Err(LockError::DuplicateLock {
                    transaction: id,
                    name: name.clone(),
                    held,
                });
            }
            if lock_type == LockType::NL {
                return Err(LockError::InvalidLock(format!(
                    "cannot acquire NL on {}",
                    name
                )));
            }

            self.notify(&LockEvent::Acquire {
                transaction: id,
                name: name.clone(),
                lock_type,
            });
            let lock = Lock::new(name.clone(), lock_type, id);
            let grantable = {
                let entry = table.entry(name);
                entry.queue.is_empty() && entry.is_compatible(lock_type, id)
            };
            if grantable {
                debug!("granted {}", lock);
                table.grant(lock);
                false
            } else {
                self.park(
                    &mut table,
                    LockRequest::new(Arc::clone(transaction), lock),
                    false,
                );
                true
            }
        };
        if blocked {
            transaction.block();
        }
        Ok(())
    }

    /// Release `transaction`'s lock on `name` and process the queue of `name`.
    pub fn release(&self, transaction: &TransactionRef, name: &ResourceName) -> Result<(), LockError> {
        let id = transaction.id();
        let granted = {
            let mut table = self.table()?;
            if table.lock_type(id, name) == LockType::NL {
                return Err(LockError::NoLockHeld {
                    transaction: id,
                    name: name.clone(),
                });
            }

            self.notify(&LockEvent::Release {
                transaction: id,
                name: name.clone(),
            });
            if let Some(lock) = table.remove(id, name) {
                debug!("released {}", lock);
            }
            let granted = table.drain(name);
            self.notify_granted(&granted);
            granted
        };
        wake(granted);
        Ok(())
    }

    /// Promote `transaction`'s lock on `name` to `lock_type`.
    ///
    /// The promoted lock keeps its place in acquisition order. If another
    /// transaction's lock conflicts, the request goes to the front of the
    /// queue and the caller blocks.
    pub fn promote(
        &self,
        transaction: &TransactionRef,
        name: &ResourceName,
        lock_type: LockType,
    ) -> Result<(), LockError> {
        let id = transaction.id();
        let blocked = {
            let mut table = self.table()?;
            let held = table.lock_type(id, name);
            if held == LockType::NL {
                return Err(LockError::NoLockHeld {
                    transaction: id,
                    name: name.clone(),
                });
            }
            if held == lock_type {
                return Err(LockError::DuplicateLock {
                    transaction: id,
                    name: name.clone(),
                    held,
                });
            }
            if !LockType::substitutable(lock_type, held) {
                return Err(LockError::InvalidLock(format!(
                    "{} on {} cannot be promoted to {}",
                    held, name, lock_type
                )));
            }

            self.notify(&LockEvent::Promote {
                transaction: id,
                name: name.clone(),
                lock_type,
            });
            let lock = Lock::new(name.clone(), lock_type, id);
            if table.entry(name).is_compatible(lock_type, id) {
                debug!("promoted {} -> {}", held, lock);
                table.grant(lock);
                false
            } else {
                self.park(
                    &mut table,
                    LockRequest::new(Arc::clone(transaction), lock),
                    true,
                );
                true
            }
        };
        if blocked {
            transaction.block();
        }
        Ok(())
    }

    /// Acquire `lock_type` on `name` and release every lock in
    /// `release_names` as one atomic step.
    ///
    /// `release_names` may contain `name` itself, in which case the new lock
    /// replaces the old one in place and keeps its acquisition position. The
    /// releases only happen once the new lock is granted; a conflicting
    /// request goes to the front of the queue and the caller blocks.
    pub fn acquire_and_release(
        &self,
        transaction: &TransactionRef,
        name: &ResourceName,
        lock_type: LockType,
        release_names: &[ResourceName],
    ) -> Result<(), LockError> {
        let id = transaction.id();
        let (blocked, granted) = {
            let mut table = self.table()?;
            let mut names: Vec<&ResourceName> = Vec::with_capacity(release_names.len());
            for release_name in release_names {
                if !names.contains(&release_name) {
                    names.push(release_name);
                }
            }

            let held = table.lock_type(id, name);
            if held != LockType::NL && !names.contains(&name) {
                return Err(LockError::DuplicateLock {
                    transaction: id,
                    name: name.clone(),
                    held,
                });
            }
            let mut released = Vec::with_capacity(names.len());
            for release_name in &names {
                match table.lock_of(id, release_name) {
                    Some(lock) => released.push(lock.clone()),
                    None => {
                        return Err(LockError::NoLockHeld {
                            transaction: id,
                            name: (*release_name).clone(),
                        })
                    }
                }
            }
            if lock_type == LockType::NL {
                return Err(LockError::InvalidLock(format!(
                    "cannot acquire NL on {}",
                    name
                )));
            }

            self.notify(&LockEvent::AcquireAndRelease {
                transaction: id,
                name: name.clone(),
                lock_type,
                released: names.iter().map(|n| (*n).clone()).collect(),
            });
            let request = LockRequest::with_released(
                Arc::clone(transaction),
                Lock::new(name.clone(), lock_type, id),
                released,
            );
            if table.entry(name).is_compatible(lock_type, id) {
                debug!("granted {}", request);
                let granted = table.admit(&request);
                self.notify_granted(&granted);
                (false, granted)
            } else {
                self.park(&mut table, request, true);
                (true, Vec::new())
            }
        };
        wake(granted);
        if blocked {
            transaction.block();
        }
        Ok(())
    }

    /// The mode `transaction` holds on `name`, or `NL`.
    pub fn lock_type(&self, transaction: TransactionId, name: &ResourceName) -> Result<LockType, LockError> {
        Ok(self.table()?.lock_type(transaction, name))
    }

    /// Locks held by `transaction`, in acquisition order.
    pub fn transaction_locks(&self, transaction: TransactionId) -> Result<Vec<Lock>, LockError> {
        Ok(self.table()?.transaction_locks(transaction).to_vec())
    }

    /// Locks granted on `name`, in acquisition order.
    pub fn resource_locks(&self, name: &ResourceName) -> Result<Vec<Lock>, LockError> {
        Ok(self
            .table()?
            .get(name)
            .map(|entry| entry.locks().to_vec())
            .unwrap_or_default())
    }

    /// Locks requested by the requests queued on `name`, front first.
    pub fn waiting(&self, name: &ResourceName) -> Result<Vec<Lock>, LockError> {
        Ok(self
            .table()?
            .get(name)
            .map(|entry| entry.waiting().map(|request| request.lock.clone()).collect())
            .unwrap_or_default())
    }

    /// Number of locks `transaction` holds strictly beneath `name`.
    pub fn descendant_lock_count(
        &self,
        name: &ResourceName,
        transaction: TransactionId,
    ) -> Result<usize, LockError> {
        Ok(self.table()?.descendant_count(name, transaction))
    }

    pub fn snapshot(&self) -> Result<LockTableSnapshot, LockError> {
        let table = self.table()?;
        let mut resources: Vec<ResourceSnapshot> = table
            .resources()
            .filter(|(_, entry)| !entry.locks().is_empty() || entry.waiting().next().is_some())
            .map(|(name, entry)| ResourceSnapshot {
                name: name.clone(),
                granted: entry.locks().to_vec(),
                waiting: entry.waiting().map(|request| request.lock.clone()).collect(),
            })
            .collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        let transactions = table
            .transactions()
            .map(|(id, locks)| (*id, locks.clone()))
            .collect();
        Ok(LockTableSnapshot {
            resources,
            transactions,
        })
    }

    /// The top-level context called `name`, created on first use.
    pub fn context(self: &Arc<Self>, name: impl ToString) -> Result<LockContext, LockError> {
        LockContext::root(self, &name.to_string())
    }

    /// The context of the configured database root.
    pub fn database_context(self: &Arc<Self>) -> Result<LockContext, LockError> {
        let name = self.config.database_name.clone();
        self.context(name)
    }

    pub(crate) fn tree(&self) -> Result<RwLockReadGuard<'_, ContextTree>, LockError> {
        self.contexts
            .read()
            .map_err(|_| LockError::Poisoned("lock context tree".into()))
    }

    pub(crate) fn tree_mut(&self) -> Result<RwLockWriteGuard<'_, ContextTree>, LockError> {
        self.contexts
            .write()
            .map_err(|_| LockError::Poisoned("lock context tree".into()))
    }

    fn table(&self) -> Result<MutexGuard<'_, LockTable>, LockError> {
        self.table
            .lock()
            .map_err(|_| LockError::Poisoned("lock table".into()))
    }

    /// Queue `request` and mark its transaction as about to wait. The caller
    /// must call `block` once the table guard is dropped.
    fn park(&self, table: &mut LockTable, request: LockRequest, front: bool) {
        debug!(
            "queueing {} at the {} of {}",
            request,
            if front { "front" } else { "back" },
            request.lock.name
        );
        self.notify(&LockEvent::Blocked {
            transaction: request.lock.transaction,
            name: request.lock.name.clone(),
            lock_type: request.lock.lock_type,
        });
        request.transaction.prepare_block();
        table.enqueue(request, front);
    }

    fn notify(&self, event: &LockEvent) {
        for observer in &self.observers {
            observer.observe(event);
        }
    }

    fn notify_granted(&self, granted: &[LockRequest]) {
        for request in granted {
            debug!("woke transaction {} with {}", request.lock.transaction, request.lock);
            self.notify(&LockEvent::Granted {
                transaction: request.lock.transaction,
                name: request.lock.name.clone(),
                lock_type: request.lock.lock_type,
            });
        }
    }
}

fn wake(granted: Vec<LockRequest>) {
    for request in granted {
        request.transaction.unblock();
    }
}
