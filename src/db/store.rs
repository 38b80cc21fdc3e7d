//! Postgres-backed ledger and session stores.
//!
//! Each adjust runs as one transaction that locks the account row with
//! `FOR UPDATE`, so the read-check-write-append unit holds even with
//! several writer processes sharing the store.

use crate::games::blackjack::BlackjackRound;
use crate::ledger::{
    AccountId, Adjustment, EntryKind, GameKind, HistoryQuery, LedgerEntry, LedgerError,
    LedgerResult, LedgerStore, RoundId,
};
use crate::session::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use std::sync::Arc;

/// Ledger store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &PgRow) -> LedgerResult<LedgerEntry> {
    let kind_repr: String = row.get("kind");
    let kind = EntryKind::parse(&kind_repr)
        .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown entry kind {kind_repr}")))?;
    let game_repr: String = row.get("game");
    let game = GameKind::parse(&game_repr)
        .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown game kind {game_repr}")))?;
    let metadata_repr: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_repr)
        .map_err(|err| LedgerError::CorruptRecord(format!("bad entry metadata: {err}")))?;

    Ok(LedgerEntry {
        id: row.get("id"),
        account: AccountId::from(row.get::<String, _>("account_id")),
        kind,
        amount: row.get("amount"),
        balance_before: row.get("balance_before"),
        balance_after: row.get("balance_after"),
        game,
        description: row.get("description"),
        metadata,
        round: RoundId::from(row.get::<uuid::Uuid, _>("round_id")),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_account(
        &self,
        account: &AccountId,
        opening_balance: i64,
    ) -> LedgerResult<()> {
        let result = sqlx::query(
            "INSERT INTO accounts (account_id, balance)
             VALUES ($1, $2)
             ON CONFLICT (account_id) DO NOTHING",
        )
        .bind(account.as_str())
        .bind(opening_balance)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountExists(account.to_string()));
        }
        Ok(())
    }

    async fn balance(&self, account: &AccountId) -> LedgerResult<i64> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE account_id = $1")
            .bind(account.as_str())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;
        Ok(row.get("balance"))
    }

    async fn adjust(
        &self,
        account: &AccountId,
        adjustment: Adjustment,
    ) -> LedgerResult<LedgerEntry> {
        let mut tx = self.pool.begin().await?;

        // Row lock for the whole atomic unit; dropping the transaction on
        // any early return rolls everything back.
        let row = sqlx::query("SELECT balance FROM accounts WHERE account_id = $1 FOR UPDATE")
            .bind(account.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;

        let balance_before: i64 = row.get("balance");
        let balance_after = balance_before
            .checked_add(adjustment.amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        if adjustment.amount < 0 && balance_after < 0 {
            return Err(LedgerError::InsufficientFunds {
                available: balance_before,
                required: -adjustment.amount,
            });
        }

        sqlx::query(
            "UPDATE accounts SET balance = $1, updated_at = NOW() WHERE account_id = $2",
        )
        .bind(balance_after)
        .bind(account.as_str())
        .execute(&mut *tx)
        .await?;

        let metadata_repr = adjustment.metadata.to_string();
        let inserted = sqlx::query(
            "INSERT INTO ledger_entries
                 (account_id, kind, amount, balance_before, balance_after,
                  game, description, metadata, round_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8::jsonb, $9)
             RETURNING id, created_at",
        )
        .bind(account.as_str())
        .bind(adjustment.kind.to_string())
        .bind(adjustment.amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(adjustment.game.to_string())
        .bind(&adjustment.description)
        .bind(&metadata_repr)
        .bind(adjustment.round.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(LedgerEntry {
            id: inserted.get("id"),
            account: account.clone(),
            kind: adjustment.kind,
            amount: adjustment.amount,
            balance_before,
            balance_after,
            game: adjustment.game,
            description: adjustment.description,
            metadata: adjustment.metadata,
            round: adjustment.round,
            created_at: inserted.get::<DateTime<Utc>, _>("created_at"),
        })
    }

    async fn history(
        &self,
        account: &AccountId,
        query: &HistoryQuery,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        // Existence check keeps behavior aligned with the in-memory store.
        self.balance(account).await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, account_id, kind, amount, balance_before, balance_after,
                    game, description, metadata::text AS metadata, round_id, created_at
             FROM ledger_entries
             WHERE account_id = ",
        );
        builder.push_bind(account.as_str());
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ");
            builder.push_bind(kind.to_string());
        }
        if let Some(game) = query.game {
            builder.push(" AND game = ");
            builder.push_bind(game.to_string());
        }
        if let Some(since) = query.since {
            builder.push(" AND created_at >= ");
            builder.push_bind(since);
        }
        if let Some(until) = query.until {
            builder.push(" AND created_at <= ");
            builder.push_bind(until);
        }
        if let Some(before) = query.before {
            builder.push(" AND id < ");
            builder.push_bind(before);
        }
        builder.push(" ORDER BY id DESC LIMIT ");
        builder.push_bind(query.effective_limit() as i64);

        let rows = builder.build().fetch_all(self.pool.as_ref()).await?;
        rows.iter().map(entry_from_row).collect()
    }
}

/// Session store over a PostgreSQL pool; one JSON state row per account.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Arc<PgPool>,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, account: &AccountId) -> LedgerResult<Option<BlackjackRound>> {
        let row = sqlx::query(
            "SELECT state::text AS state FROM blackjack_sessions WHERE account_id = $1",
        )
        .bind(account.as_str())
        .fetch_optional(self.pool.as_ref())
        .await?;

        match row {
            Some(row) => {
                let state_repr: String = row.get("state");
                let round = serde_json::from_str(&state_repr).map_err(|err| {
                    LedgerError::CorruptRecord(format!("bad blackjack state: {err}"))
                })?;
                Ok(Some(round))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, account: &AccountId, round: &BlackjackRound) -> LedgerResult<()> {
        let state_repr = serde_json::to_string(round)
            .map_err(|err| LedgerError::CorruptRecord(format!("bad blackjack state: {err}")))?;
        sqlx::query(
            "INSERT INTO blackjack_sessions (account_id, state, updated_at)
             VALUES ($1, $2::jsonb, $3)
             ON CONFLICT (account_id)
             DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at",
        )
        .bind(account.as_str())
        .bind(&state_repr)
        .bind(round.updated_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    async fn clear(&self, account: &AccountId) -> LedgerResult<()> {
        sqlx::query("DELETE FROM blackjack_sessions WHERE account_id = $1")
            .bind(account.as_str())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn idle_since(&self, cutoff: DateTime<Utc>) -> LedgerResult<Vec<AccountId>> {
        let rows =
            sqlx::query("SELECT account_id FROM blackjack_sessions WHERE updated_at <= $1")
                .bind(cutoff)
                .fetch_all(self.pool.as_ref())
                .await?;
        Ok(rows
            .iter()
            .map(|row| AccountId::from(row.get::<String, _>("account_id")))
            .collect())
    }
}
