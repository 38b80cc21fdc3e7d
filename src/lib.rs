//! # Casino Core
//!
//! The wallet/ledger core of a multi-game coin wagering platform.
//!
//! Users hold a single coin balance and play one of three games (blackjack,
//! roulette, slots). Every balance mutation funnels through the [`Ledger`],
//! which pairs the new balance with an immutable [`ledger::LedgerEntry`] in
//! one atomic unit, serialized per account. The game engines sit on top of
//! the ledger and compute how much a round wins or loses.
//!
//! ## Architecture
//!
//! - [`ledger`]: balance store, append-only entry log, per-account locking
//! - [`games`]: blackjack, roulette, and slots engines
//! - [`session`]: the single persisted in-progress blackjack round per account
//! - [`db`]: PostgreSQL-backed stores for multi-process deployments
//!
//! Authentication, HTTP routing, and presentation are external collaborators;
//! they hand the engines an already-authenticated account id and consume the
//! read-only transaction history.
//!
//! ## Example
//!
//! ```
//! use casino_core::{AccountId, Ledger};
//! use casino_core::ledger::MemoryLedgerStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::new(Arc::new(MemoryLedgerStore::new()));
//! let account = AccountId::from("alice");
//! ledger.create_account(&account, 1000).await?;
//! assert_eq!(ledger.balance(&account).await?, 1000);
//! # Ok(())
//! # }
//! ```

/// Balance store, append-only entry log, and per-account locking.
pub mod ledger;
pub use ledger::{
    AccountId, Adjustment, EntryKind, GameKind, HistoryQuery, Ledger, LedgerEntry, LedgerError,
    LedgerResult, RoundId,
};

/// Game engines built on top of the ledger.
pub mod games;
pub use games::{
    BlackjackEngine, GameError, GameResult, RouletteEngine, SlotsEngine,
    rng::{RandomSource, SequenceSource, ThreadRandom},
};

/// Persisted in-progress blackjack round, one per account.
pub mod session;
pub use session::{MemorySessionStore, SessionStore};

/// PostgreSQL-backed stores and connection pooling.
pub mod db;

/// Environment-driven configuration.
pub mod config;
pub use config::CasinoConfig;
