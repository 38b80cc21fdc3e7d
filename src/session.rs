//! Game session store: the single persisted in-progress blackjack round
//! per account.
//!
//! Exactly one (or zero) round exists per account at a time. The wheel and
//! reel games are single-shot and need no persisted session. Exclusivity
//! is provided by the engines: every read/write here happens while holding
//! the account's [`crate::ledger::AccountGuard`], the same critical
//! section used for the account's ledger mutations.

use crate::games::blackjack::BlackjackRound;
use crate::ledger::{AccountId, LedgerResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Keyed store for the per-account blackjack round.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The account's in-progress round, if any.
    async fn get(&self, account: &AccountId) -> LedgerResult<Option<BlackjackRound>>;

    /// Create or replace the account's round.
    async fn put(&self, account: &AccountId, round: &BlackjackRound) -> LedgerResult<()>;

    /// Remove the account's round (round settled).
    async fn clear(&self, account: &AccountId) -> LedgerResult<()>;

    /// Accounts whose round has not been touched since `cutoff`.
    ///
    /// Feeds the idle sweep; abandoned rounds are force-stood and settled.
    async fn idle_since(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<AccountId>>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemorySessionStore {
    rounds: RwLock<HashMap<AccountId, BlackjackRound>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, account: &AccountId) -> LedgerResult<Option<BlackjackRound>> {
        let rounds = self.rounds.read().unwrap_or_else(|e| e.into_inner());
        Ok(rounds.get(account).cloned())
    }

    async fn put(&self, account: &AccountId, round: &BlackjackRound) -> LedgerResult<()> {
        let mut rounds = self.rounds.write().unwrap_or_else(|e| e.into_inner());
        rounds.insert(account.clone(), round.clone());
        Ok(())
    }

    async fn clear(&self, account: &AccountId) -> LedgerResult<()> {
        let mut rounds = self.rounds.write().unwrap_or_else(|e| e.into_inner());
        rounds.remove(account);
        Ok(())
    }

    async fn idle_since(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<AccountId>> {
        let rounds = self.rounds.read().unwrap_or_else(|e| e.into_inner());
        Ok(rounds
            .iter()
            .filter(|(_, round)| round.updated_at <= cutoff)
            .map(|(account, _)| account.clone())
            .collect())
    }
}
