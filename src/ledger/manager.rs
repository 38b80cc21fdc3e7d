//! Ledger manager: the single choke point for balance mutations.

use super::{
    errors::{LedgerError, LedgerResult},
    locks::{AccountGuard, LockTable},
    models::{AccountId, Adjustment, EntryKind, GameKind, HistoryQuery, LedgerEntry, RoundId},
    store::LedgerStore,
};
use std::sync::Arc;
use std::time::Duration;

/// Owns account balances and the append-only entry log.
///
/// Every mutation acquires the account's exclusive critical section, so
/// two calls for the same account never interleave their
/// read-modify-write, while unrelated accounts proceed in parallel. Game
/// engines that also touch round state take the guard themselves via
/// [`Ledger::lock_account`] and mutate through
/// [`Ledger::adjust_locked`], keeping the debit, the state transition,
/// and the payout inside one critical section.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: Arc<LockTable>,
}

impl Ledger {
    /// Create a ledger over a storage backend with the default lock wait.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: Arc::new(LockTable::default()),
        }
    }

    /// Create a ledger with a specific lock acquisition timeout.
    #[must_use]
    pub fn with_lock_timeout(store: Arc<dyn LedgerStore>, timeout: Duration) -> Self {
        Self {
            store,
            locks: Arc::new(LockTable::new(timeout)),
        }
    }

    /// Create an account with an opening balance.
    ///
    /// Called by the external signup flow. A non-zero opening balance is
    /// recorded as a deposit entry so the conservation invariant holds
    /// from the first entry on.
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountExists` - the account already exists
    pub async fn create_account(
        &self,
        account: &AccountId,
        opening_balance: i64,
    ) -> LedgerResult<()> {
        self.store.create_account(account, 0).await?;
        if opening_balance > 0 {
            self.adjust(
                account,
                Adjustment::new(
                    opening_balance,
                    EntryKind::Deposit,
                    GameKind::None,
                    RoundId::new(),
                )
                .describe("Opening balance"),
            )
            .await?;
        }
        log::info!("account {account} created with opening balance {opening_balance}");
        Ok(())
    }

    /// Acquire the account's exclusive critical section.
    ///
    /// # Errors
    ///
    /// * `LedgerError::ConcurrencyTimeout` - bounded wait expired; retryable
    pub async fn lock_account(&self, account: &AccountId) -> LedgerResult<AccountGuard> {
        self.locks.acquire(account).await
    }

    /// Atomically apply one adjustment, taking the account lock itself.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - debit would go below zero
    /// * `LedgerError::ConcurrencyTimeout` - could not lock the account
    pub async fn adjust(
        &self,
        account: &AccountId,
        adjustment: Adjustment,
    ) -> LedgerResult<LedgerEntry> {
        let guard = self.lock_account(account).await?;
        self.adjust_locked(&guard, adjustment).await
    }

    /// Apply one adjustment inside an already-held critical section.
    ///
    /// The guard proves exclusive access; passing a guard for a different
    /// account is a programming error and is rejected.
    pub async fn adjust_locked(
        &self,
        guard: &AccountGuard,
        adjustment: Adjustment,
    ) -> LedgerResult<LedgerEntry> {
        let account = guard.account();
        let entry = self.store.adjust(account, adjustment).await?;
        log::debug!(
            "account {account}: {} {} ({} -> {}), round {}",
            entry.kind,
            entry.amount,
            entry.balance_before,
            entry.balance_after,
            entry.round,
        );
        Ok(entry)
    }

    /// Current balance, read without side effects.
    pub async fn balance(&self, account: &AccountId) -> LedgerResult<i64> {
        self.store.balance(account).await
    }

    /// Entry history, newest first. Read-only; consumed by external
    /// statistics/audit subsystems, never by the engines.
    pub async fn history(
        &self,
        account: &AccountId,
        query: &HistoryQuery,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        self.store.history(account, query).await
    }

    /// Credit coins from an external source.
    pub async fn deposit(&self, account: &AccountId, amount: i64) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.adjust(
            account,
            Adjustment::new(amount, EntryKind::Deposit, GameKind::None, RoundId::new()),
        )
        .await
    }

    /// Debit coins to an external sink.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - amount exceeds the balance
    pub async fn withdraw(&self, account: &AccountId, amount: i64) -> LedgerResult<LedgerEntry> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.adjust(
            account,
            Adjustment::new(
                -amount,
                EntryKind::Withdrawal,
                GameKind::None,
                RoundId::new(),
            ),
        )
        .await
    }

    /// Credit a promotional bonus.
    pub async fn grant_bonus(
        &self,
        account: &AccountId,
        amount: i64,
        description: impl Into<String>,
    ) -> LedgerResult<LedgerEntry> {
        self.adjust(
            account,
            Adjustment::new(amount, EntryKind::Bonus, GameKind::None, RoundId::new())
                .describe(description),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::MemoryLedgerStore;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[tokio::test]
    async fn opening_balance_is_a_deposit_entry() {
        let ledger = ledger();
        let account = "alice".into();
        ledger.create_account(&account, 500).await.unwrap();

        assert_eq!(ledger.balance(&account).await.unwrap(), 500);
        let history = ledger
            .history(&account, &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, EntryKind::Deposit);
        assert_eq!(history[0].amount, 500);
        assert_eq!(history[0].balance_before, 0);
    }

    #[tokio::test]
    async fn duplicate_account_is_rejected() {
        let ledger = ledger();
        let account = "alice".into();
        ledger.create_account(&account, 0).await.unwrap();
        let err = ledger.create_account(&account, 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountExists(_)));
    }

    #[tokio::test]
    async fn withdraw_beyond_balance_fails_cleanly() {
        let ledger = ledger();
        let account = "alice".into();
        ledger.create_account(&account, 100).await.unwrap();

        let err = ledger.withdraw(&account, 150).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(&account).await.unwrap(), 100);

        ledger.withdraw(&account, 60).await.unwrap();
        assert_eq!(ledger.balance(&account).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn bonus_and_deposit_record_their_kinds() {
        let ledger = ledger();
        let account = "alice".into();
        ledger.create_account(&account, 0).await.unwrap();

        ledger.deposit(&account, 30).await.unwrap();
        ledger.grant_bonus(&account, 5, "welcome").await.unwrap();

        let bonuses = ledger
            .history(&account, &HistoryQuery::default().kind(EntryKind::Bonus))
            .await
            .unwrap();
        assert_eq!(bonuses.len(), 1);
        assert_eq!(bonuses[0].amount, 5);
        assert_eq!(ledger.balance(&account).await.unwrap(), 35);
    }

    #[tokio::test]
    async fn adjust_serializes_through_the_account_lock() {
        let ledger = Ledger::with_lock_timeout(
            Arc::new(MemoryLedgerStore::new()),
            Duration::from_millis(50),
        );
        let account: AccountId = "alice".into();
        ledger.create_account(&account, 10).await.unwrap();

        let guard = ledger.lock_account(&account).await.unwrap();
        let err = ledger
            .adjust(
                &account,
                Adjustment::wager(-1, GameKind::Wheel, RoundId::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrencyTimeout(_)));

        // The held guard can still mutate.
        ledger
            .adjust_locked(&guard, Adjustment::wager(-1, GameKind::Wheel, RoundId::new()))
            .await
            .unwrap();
        drop(guard);
        assert_eq!(ledger.balance(&account).await.unwrap(), 9);
    }
}
