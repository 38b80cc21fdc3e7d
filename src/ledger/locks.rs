//! Per-account lock table.
//!
//! The source of correctness for the whole crate: one exclusive critical
//! section per account, scoped as narrowly as possible. Two operations on
//! the same account are fully serialized; operations on different accounts
//! never contend. Acquisition is bounded, so a stuck holder surfaces as a
//! retryable [`LedgerError::ConcurrencyTimeout`] instead of a hang.

use super::{
    errors::{LedgerError, LedgerResult},
    models::AccountId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Proof of exclusive access to one account.
///
/// Held by the ledger and the game engines across a whole atomic unit
/// (read balance, validate, write balance + entry, mutate game state).
/// Dropping the guard releases the account.
#[derive(Debug)]
pub struct AccountGuard {
    account: AccountId,
    _guard: OwnedMutexGuard<()>,
}

impl AccountGuard {
    #[must_use]
    pub fn account(&self) -> &AccountId {
        &self.account
    }
}

/// Sharded lock table keyed by account id.
///
/// Each account gets its own `tokio::sync::Mutex`; the outer `std` mutex
/// only guards the map itself and is never held across an await. Entries
/// for accounts with no holder or waiter are evicted on the next
/// acquire, so the table stays proportional to in-flight accounts.
pub struct LockTable {
    locks: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
    acquire_timeout: Duration,
}

impl LockTable {
    #[must_use]
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            acquire_timeout,
        }
    }

    /// Acquire the account's exclusive section, waiting at most the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// * `LedgerError::ConcurrencyTimeout` - the wait expired; no effect
    pub async fn acquire(&self, account: &AccountId) -> LedgerResult<AccountGuard> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // An unheld lock has no clone outside the map; evict it so
            // the table only tracks accounts with in-flight operations.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(account.clone()).or_default().clone()
        };

        match tokio::time::timeout(self.acquire_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(AccountGuard {
                account: account.clone(),
                _guard: guard,
            }),
            Err(_) => {
                log::warn!("lock acquisition timed out for account {account}");
                Err(LedgerError::ConcurrencyTimeout(account.to_string()))
            }
        }
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new(DEFAULT_ACQUIRE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_account_serializes() {
        let table = Arc::new(LockTable::new(Duration::from_millis(50)));
        let account: AccountId = "alice".into();

        let guard = table.acquire(&account).await.expect("first acquire");
        let err = table.acquire(&account).await.expect_err("must time out");
        assert!(matches!(err, LedgerError::ConcurrencyTimeout(_)));

        drop(guard);
        table.acquire(&account).await.expect("acquire after release");
    }

    #[tokio::test]
    async fn different_accounts_do_not_contend() {
        let table = LockTable::new(Duration::from_millis(50));

        let _alice = table.acquire(&"alice".into()).await.expect("alice");
        let _bob = table.acquire(&"bob".into()).await.expect("bob");
    }

    #[tokio::test]
    async fn released_accounts_are_evicted_from_the_table() {
        let table = LockTable::default();

        for i in 0..100 {
            let account = AccountId::from(format!("player-{i}"));
            let guard = table.acquire(&account).await.expect("acquire");
            drop(guard);
        }

        // Only held locks survive; everything released above is gone.
        let held = table.acquire(&"alice".into()).await.expect("alice");
        let tracked = table.locks.lock().unwrap().len();
        assert_eq!(tracked, 1);
        drop(held);
    }
}
