//! Declarative lock planning on top of [`LockContext`].
//!
//! Callers state the weakest mode they need at a node (`S` to read, `X` to
//! write) and [`ensure_sufficient_lock_held`] issues the fewest acquire,
//! promote and escalate calls needed to get there, taking intention locks on
//! the ancestors first.

use std::cmp::Reverse;

use log::debug;

use crate::context::LockContext;
use crate::lock::{LockError, LockManager, LockType};
use crate::transaction::TransactionRef;

/// Make sure `transaction` holds at least `want` at `context`, where `want`
/// is one of `NL`, `S` or `X`.
pub fn ensure_sufficient_lock_held(
    context: &LockContext,
    transaction: &TransactionRef,
    want: LockType,
) -> Result<(), LockError> {
    if !matches!(want, LockType::NL | LockType::S | LockType::X) {
        return Err(LockError::InvalidLock(format!(
            "can only ensure NL, S or X, not {}",
            want
        )));
    }
    let id = transaction.id();
    let effective = context.effective_lock_type(id)?;
    let explicit = context.explicit_lock_type(id)?;
    if LockType::substitutable(effective, want) {
        return Ok(());
    }
    // an explicit IX beneath a SIX still reads everything through the SIX
    if want == LockType::S && context.has_six_ancestor(id)? {
        return Ok(());
    }

    debug!(
        "ensuring {} on {} for transaction {} (explicit {}, effective {})",
        want,
        context.name(),
        id,
        explicit,
        effective
    );

    if effective == LockType::IX && want == LockType::S {
        ensure_ancestors(context.parent_context(), transaction, LockType::IX)?;
        return context.promote(transaction, LockType::SIX);
    }

    if explicit.is_intent() {
        ensure_ancestors(context.parent_context(), transaction, want.parent_lock())?;
        context.escalate(transaction)?;
        if !LockType::substitutable(context.explicit_lock_type(id)?, want) {
            context.promote(transaction, want)?;
        }
        return Ok(());
    }

    if effective == LockType::NL {
        ensure_ancestors(context.parent_context(), transaction, want.parent_lock())?;
        return context.acquire(transaction, want);
    }

    if explicit == LockType::S {
        ensure_ancestors(context.parent_context(), transaction, LockType::IX)?;
        return context.promote(transaction, LockType::X);
    }

    // Only an inherited S is left. Take X here if the parent already admits
    // it, otherwise the S has to be raised where it is held.
    let parent = match context.parent_context() {
        Some(parent) => parent,
        None => {
            return Err(LockError::InvalidLock(format!(
                "{} inherits {} without a parent",
                context.name(),
                effective
            )))
        }
    };
    if LockType::can_be_parent(parent.effective_lock_type(id)?, want) {
        return context.acquire(transaction, want);
    }
    ensure_sufficient_lock_held(parent, transaction, want)
}

/// Make sure `context` and every ancestor of it hold at least the intention
/// mode `want`, acquiring or promoting from the top down.
///
/// Walking stops at the first node whose explicit lock already substitutes
/// `want`. An explicit `S` that has to admit `IX` below it becomes `SIX`.
pub fn ensure_ancestors(
    context: Option<&LockContext>,
    transaction: &TransactionRef,
    want: LockType,
) -> Result<(), LockError> {
    let context = match context {
        Some(context) => context,
        None => return Ok(()),
    };
    if want == LockType::NL {
        return Ok(());
    }
    let explicit = context.explicit_lock_type(transaction.id())?;
    if LockType::substitutable(explicit, want) {
        return Ok(());
    }

    ensure_ancestors(context.parent_context(), transaction, want)?;
    match explicit {
        LockType::NL => context.acquire(transaction, want),
        LockType::S if want == LockType::IX => context.promote(transaction, LockType::SIX),
        _ => context.promote(transaction, want),
    }
}

/// Release every lock `transaction` holds, deepest first, as done on commit
/// or abort.
pub fn release_all_locks(manager: &LockManager, transaction: &TransactionRef) -> Result<(), LockError> {
    let mut locks = manager.transaction_locks(transaction.id())?;
    locks.sort_by_key(|lock| Reverse(lock.name.depth()));
    debug!(
        "releasing {} lock(s) of transaction {}",
        locks.len(),
        transaction.id()
    );
    for lock in locks {
        manager.release(transaction, &lock.name)?;
    }
    Ok(())
}
