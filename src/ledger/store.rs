//! Ledger storage trait and in-memory implementation.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{AccountId, Adjustment, HistoryQuery, LedgerEntry},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Storage backend for balances and the append-only entry log.
///
/// `adjust` is the atomic unit: read balance, validate, write the new
/// balance and append the entry, all or nothing. Implementations must
/// detect insufficient funds before writing anything. Callers provide
/// same-process serialization through the ledger's lock table; a backend
/// shared by several writer processes must additionally serialize through
/// its own transactions (see [`crate::db::PgLedgerStore`]).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create an account with the given opening balance.
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountExists` - the account already exists
    async fn create_account(&self, account: &AccountId, opening_balance: i64)
    -> LedgerResult<()>;

    /// Current balance, read without side effects.
    async fn balance(&self, account: &AccountId) -> LedgerResult<i64>;

    /// Apply one adjustment atomically and return the appended entry.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - debit would go below zero
    /// * `LedgerError::BalanceOverflow` - credit would overflow
    /// * `LedgerError::AccountNotFound` - unknown account
    async fn adjust(&self, account: &AccountId, adjustment: Adjustment)
    -> LedgerResult<LedgerEntry>;

    /// Entries for an account, newest first, filtered and paginated.
    async fn history(
        &self,
        account: &AccountId,
        query: &HistoryQuery,
    ) -> LedgerResult<Vec<LedgerEntry>>;
}

#[derive(Debug, Default)]
struct AccountSlot {
    balance: i64,
    entries: Vec<LedgerEntry>,
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryLedgerStore {
    accounts: RwLock<HashMap<AccountId, AccountSlot>>,
    next_id: RwLock<i64>,
}

impl MemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_account(
        &self,
        account: &AccountId,
        opening_balance: i64,
    ) -> LedgerResult<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        if accounts.contains_key(account) {
            return Err(LedgerError::AccountExists(account.to_string()));
        }
        accounts.insert(
            account.clone(),
            AccountSlot {
                balance: opening_balance,
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    async fn balance(&self, account: &AccountId) -> LedgerResult<i64> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(account)
            .map(|slot| slot.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn adjust(
        &self,
        account: &AccountId,
        adjustment: Adjustment,
    ) -> LedgerResult<LedgerEntry> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        let slot = accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;

        let balance_before = slot.balance;
        let balance_after = balance_before
            .checked_add(adjustment.amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        if adjustment.amount < 0 && balance_after < 0 {
            return Err(LedgerError::InsufficientFunds {
                available: balance_before,
                required: -adjustment.amount,
            });
        }

        let id = {
            let mut next_id = self.next_id.write().unwrap_or_else(|e| e.into_inner());
            *next_id += 1;
            *next_id
        };

        let entry = LedgerEntry {
            id,
            account: account.clone(),
            kind: adjustment.kind,
            amount: adjustment.amount,
            balance_before,
            balance_after,
            game: adjustment.game,
            description: adjustment.description,
            metadata: adjustment.metadata,
            round: adjustment.round,
            created_at: Utc::now(),
        };

        slot.balance = balance_after;
        slot.entries.push(entry.clone());
        Ok(entry)
    }

    async fn history(
        &self,
        account: &AccountId,
        query: &HistoryQuery,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        let slot = accounts
            .get(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;

        // Entries are appended in sequence order; walk backwards for
        // newest-first.
        Ok(slot
            .entries
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{EntryKind, GameKind, RoundId};

    fn wager(amount: i64) -> Adjustment {
        Adjustment::wager(amount, GameKind::Wheel, RoundId::new())
    }

    #[tokio::test]
    async fn adjust_maintains_entry_arithmetic() {
        let store = MemoryLedgerStore::new();
        let account = "alice".into();
        store.create_account(&account, 100).await.unwrap();

        let entry = store.adjust(&account, wager(-30)).await.unwrap();
        assert_eq!(entry.balance_before, 100);
        assert_eq!(entry.balance_after, 70);
        assert_eq!(entry.balance_after, entry.balance_before + entry.amount);
        assert_eq!(store.balance(&account).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn insufficient_funds_writes_nothing() {
        let store = MemoryLedgerStore::new();
        let account = "alice".into();
        store.create_account(&account, 10).await.unwrap();

        let err = store.adjust(&account, wager(-11)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                available: 10,
                required: 11
            }
        ));
        assert_eq!(store.balance(&account).await.unwrap(), 10);
        let history = store
            .history(&account, &HistoryQuery::default())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn sequence_ids_increase_and_balances_chain() {
        let store = MemoryLedgerStore::new();
        let account = "alice".into();
        store.create_account(&account, 100).await.unwrap();

        for _ in 0..5 {
            store.adjust(&account, wager(-10)).await.unwrap();
        }

        let history = store
            .history(&account, &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 5);
        // Newest first: ids strictly decreasing, balances chain.
        for pair in history.windows(2) {
            assert!(pair[0].id > pair[1].id);
            assert_eq!(pair[0].balance_before, pair[1].balance_after);
        }
    }

    #[tokio::test]
    async fn history_filters_and_paginates() {
        let store = MemoryLedgerStore::new();
        let account = "alice".into();
        store.create_account(&account, 1000).await.unwrap();

        let round = RoundId::new();
        for _ in 0..3 {
            store
                .adjust(&account, Adjustment::wager(-10, GameKind::Reel, round))
                .await
                .unwrap();
            store
                .adjust(&account, Adjustment::payout(5, GameKind::Reel, round))
                .await
                .unwrap();
        }

        let payouts = store
            .history(&account, &HistoryQuery::default().kind(EntryKind::Payout))
            .await
            .unwrap();
        assert_eq!(payouts.len(), 3);
        assert!(payouts.iter().all(|e| e.kind == EntryKind::Payout));

        // Restartable pagination: two pages cover everything once.
        let page1 = store
            .history(&account, &HistoryQuery::latest(4))
            .await
            .unwrap();
        assert_eq!(page1.len(), 4);
        let oldest = page1.last().unwrap().id;
        let page2 = store
            .history(&account, &HistoryQuery::latest(4).before(oldest))
            .await
            .unwrap();
        assert_eq!(page2.len(), 2);
        assert!(page2.iter().all(|e| e.id < oldest));
    }

    #[tokio::test]
    async fn unknown_account_is_reported() {
        let store = MemoryLedgerStore::new();
        let err = store.balance(&"ghost".into()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(_)));
    }
}
