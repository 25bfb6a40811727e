use std::collections::{HashMap, VecDeque};

use log::trace;

use super::{Lock, LockRequest, LockType, ResourceName};
use crate::transaction::TransactionId;

/// Granted locks (oldest first) and the wait queue of one resource.
#[derive(Debug, Default)]
pub struct ResourceEntry {
    pub(crate) locks: Vec<Lock>,
    pub(crate) queue: VecDeque<LockRequest>,
}

impl ResourceEntry {
    /// Whether `lock_type` can coexist with every granted lock, ignoring
    /// locks owned by `except`.
    pub fn is_compatible(&self, lock_type: LockType, except: TransactionId) -> bool {
        self.locks
            .iter()
            .filter(|lock| lock.transaction != except)
            .all(|lock| LockType::compatible(lock_type, lock.lock_type))
    }

    pub fn lock_type_of(&self, transaction: TransactionId) -> LockType {
        self.locks
            .iter()
            .find(|lock| lock.transaction == transaction)
            .map_or(LockType::NL, |lock| lock.lock_type)
    }

    pub fn locks(&self) -> &[Lock] {
        &self.locks
    }

    pub fn waiting(&self) -> impl Iterator<Item = &LockRequest> {
        self.queue.iter()
    }

    fn head_is_grantable(&self) -> bool {
        self.queue
            .front()
            .map_or(false, |request| {
                self.is_compatible(request.lock.lock_type, request.lock.transaction)
            })
    }
}

/// All bookkeeping guarded by the manager's critical section.
///
/// `transactions` mirrors the granted lists of `resources` per owner, in
/// acquisition order. `descendant_locks[name][txn]` counts the granted locks
/// `txn` owns strictly beneath `name`; it is updated whenever a lock is added
/// or removed so it can never drift from the granted lists.
#[derive(Debug, Default)]
pub(crate) struct LockTable {
    resources: HashMap<ResourceName, ResourceEntry>,
    transactions: HashMap<TransactionId, Vec<Lock>>,
    descendant_locks: HashMap<ResourceName, HashMap<TransactionId, usize>>,
}

impl LockTable {
    pub fn entry(&mut self, name: &ResourceName) -> &mut ResourceEntry {
        self.resources.entry(name.clone()).or_default()
    }

    pub fn get(&self, name: &ResourceName) -> Option<&ResourceEntry> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&ResourceName, &ResourceEntry)> {
        self.resources.iter()
    }

    pub fn lock_type(&self, transaction: TransactionId, name: &ResourceName) -> LockType {
        self.resources
            .get(name)
            .map_or(LockType::NL, |entry| entry.lock_type_of(transaction))
    }

    pub fn lock_of(&self, transaction: TransactionId, name: &ResourceName) -> Option<&Lock> {
        self.transactions
            .get(&transaction)
            .and_then(|locks| locks.iter().find(|lock| &lock.name == name))
    }

    pub fn transaction_locks(&self, transaction: TransactionId) -> &[Lock] {
        self.transactions
            .get(&transaction)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transactions(&self) -> impl Iterator<Item = (&TransactionId, &Vec<Lock>)> {
        self.transactions.iter()
    }

    pub fn descendant_count(&self, name: &ResourceName, transaction: TransactionId) -> usize {
        self.descendant_locks
            .get(name)
            .and_then(|counts| counts.get(&transaction))
            .copied()
            .unwrap_or(0)
    }

    /// Grant `lock`. A lock the owner already holds on the same resource is
    /// replaced where it stands in both ordered lists.
    pub fn grant(&mut self, lock: Lock) {
        let transaction = lock.transaction;
        let entry = self.resources.entry(lock.name.clone()).or_default();

        if let Some(slot) = entry
            .locks
            .iter_mut()
            .find(|held| held.transaction == transaction)
        {
            *slot = lock.clone();
            if let Some(slot) = self
                .transactions
                .get_mut(&transaction)
                .and_then(|locks| locks.iter_mut().find(|held| held.name == lock.name))
            {
                *slot = lock;
            }
            return;
        }

        entry.locks.push(lock.clone());
        for ancestor in lock.name.ancestors() {
            *self
                .descendant_locks
                .entry(ancestor)
                .or_default()
                .entry(transaction)
                .or_insert(0) += 1;
        }
        self.transactions.entry(transaction).or_default().push(lock);
    }

    /// Remove `transaction`'s lock on `name`, returning it if one was held.
    /// Does not touch the wait queue.
    pub fn remove(&mut self, transaction: TransactionId, name: &ResourceName) -> Option<Lock> {
        let entry = self.resources.get_mut(name)?;
        let index = entry
            .locks
            .iter()
            .position(|lock| lock.transaction == transaction)?;
        let lock = entry.locks.remove(index);

        if let Some(locks) = self.transactions.get_mut(&transaction) {
            locks.retain(|held| &held.name != name);
            if locks.is_empty() {
                self.transactions.remove(&transaction);
            }
        }

        for ancestor in name.ancestors() {
            if let Some(counts) = self.descendant_locks.get_mut(&ancestor) {
                if let Some(count) = counts.get_mut(&transaction) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        counts.remove(&transaction);
                    }
                }
            }
        }
        Some(lock)
    }

    pub fn enqueue(&mut self, request: LockRequest, front: bool) {
        let queue = &mut self.entry(&request.lock.name).queue;
        if front {
            queue.push_front(request);
        } else {
            queue.push_back(request);
        }
    }

    /// Perform a request's releases and grant its lock, then drain the queue
    /// of every resource that lost a lock. Returns the queued requests that
    /// were granted along the way, in grant order.
    pub fn admit(&mut self, request: &LockRequest) -> Vec<LockRequest> {
        let mut dirty = VecDeque::new();
        self.apply(request, &mut dirty);
        self.drain_all(dirty)
    }

    /// Grant queued requests on `name` front to back, stopping at the first
    /// one that is not compatible. Releases performed by granted requests
    /// cascade to the queues of the released resources.
    pub fn drain(&mut self, name: &ResourceName) -> Vec<LockRequest> {
        self.drain_all(VecDeque::from([name.clone()]))
    }

    fn drain_all(&mut self, mut dirty: VecDeque<ResourceName>) -> Vec<LockRequest> {
        let mut granted = Vec::new();
        while let Some(name) = dirty.pop_front() {
            loop {
                let entry = match self.resources.get_mut(&name) {
                    Some(entry) => entry,
                    None => break,
                };
                if !entry.head_is_grantable() {
                    break;
                }
                let request = match entry.queue.pop_front() {
                    Some(request) => request,
                    None => break,
                };
                trace!("granting queued {}", request);
                self.apply(&request, &mut dirty);
                granted.push(request);
            }
        }
        granted
    }

    fn apply(&mut self, request: &LockRequest, dirty: &mut VecDeque<ResourceName>) {
        for released in &request.released {
            // replaced in place by grant(), but a weaker mode may admit waiters
            if released.name == request.lock.name {
                dirty.push_back(released.name.clone());
                continue;
            }
            if self.remove(released.transaction, &released.name).is_some() {
                dirty.push_back(released.name.clone());
            }
        }
        self.grant(request.lock.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{RecordingTransaction, TransactionRef};
    use std::sync::Arc;

    fn name(path: &str) -> ResourceName {
        path.parse().unwrap()
    }

    fn request(id: TransactionId, path: &str, lock_type: LockType) -> LockRequest {
        let txn: TransactionRef = Arc::new(RecordingTransaction::new(id));
        LockRequest::new(txn, Lock::new(name(path), lock_type, id))
    }

    #[test]
    fn grant_appends_and_counts_ancestors() {
        let mut table = LockTable::default();
        table.grant(Lock::new(name("db"), LockType::IX, 1));
        table.grant(Lock::new(name("db/t1"), LockType::IX, 1));
        table.grant(Lock::new(name("db/t1/p3"), LockType::X, 1));

        assert_eq!(table.descendant_count(&name("db"), 1), 2);
        assert_eq!(table.descendant_count(&name("db/t1"), 1), 1);
        assert_eq!(table.descendant_count(&name("db/t1/p3"), 1), 0);
        assert_eq!(table.transaction_locks(1).len(), 3);

        table.remove(1, &name("db/t1/p3"));
        assert_eq!(table.descendant_count(&name("db"), 1), 1);
        assert_eq!(table.descendant_count(&name("db/t1"), 1), 0);
    }

    #[test]
    fn grant_replaces_in_place() {
        let mut table = LockTable::default();
        table.grant(Lock::new(name("a"), LockType::S, 1));
        table.grant(Lock::new(name("b"), LockType::X, 1));
        table.grant(Lock::new(name("a"), LockType::X, 1));

        assert_eq!(
            table.transaction_locks(1),
            &[
                Lock::new(name("a"), LockType::X, 1),
                Lock::new(name("b"), LockType::X, 1)
            ]
        );
        assert_eq!(table.get(&name("a")).unwrap().locks().len(), 1);
    }

    #[test]
    fn drain_stops_at_first_incompatible_request() {
        let mut table = LockTable::default();
        table.enqueue(request(2, "a", LockType::S), false);
        table.enqueue(request(3, "a", LockType::X), false);
        table.enqueue(request(4, "a", LockType::S), false);

        let granted = table.drain(&name("a"));
        let ids: Vec<_> = granted.iter().map(|r| r.lock.transaction).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(table.get(&name("a")).unwrap().waiting().count(), 2);
    }

    #[test]
    fn admit_with_in_place_downgrade_drains_own_queue() {
        let mut table = LockTable::default();
        table.grant(Lock::new(name("a"), LockType::X, 1));
        table.enqueue(request(2, "a", LockType::S), false);

        let downgrade = request(1, "a", LockType::S);
        let downgrade = LockRequest::with_released(
            downgrade.transaction,
            downgrade.lock,
            vec![Lock::new(name("a"), LockType::X, 1)],
        );
        let granted = table.admit(&downgrade);

        let ids: Vec<_> = granted.iter().map(|r| r.lock.transaction).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(table.lock_type(1, &name("a")), LockType::S);
        assert_eq!(table.lock_type(2, &name("a")), LockType::S);
    }

    #[test]
    fn remove_missing_lock_is_none() {
        let mut table = LockTable::default();
        assert!(table.remove(1, &name("a")).is_none());
        table.grant(Lock::new(name("a"), LockType::S, 2));
        assert!(table.remove(1, &name("a")).is_none());
    }
}
