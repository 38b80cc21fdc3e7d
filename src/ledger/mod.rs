//! Ledger module: the single choke point for balance mutations.
//!
//! This module implements:
//! - Per-account balances with an append-only entry log
//! - Atomic adjust (debit/credit + entry) with insufficient-funds checks
//! - A sharded per-account lock table so same-account operations serialize
//!   while unrelated accounts never contend
//! - Round correlation ids linking every entry of one game round
//!
//! ## Example
//!
//! ```
//! use casino_core::ledger::{Adjustment, GameKind, Ledger, MemoryLedgerStore, RoundId};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::new(Arc::new(MemoryLedgerStore::new()));
//! let account = "alice".into();
//! ledger.create_account(&account, 500).await?;
//!
//! let entry = ledger
//!     .adjust(&account, Adjustment::wager(-100, GameKind::Wheel, RoundId::new()))
//!     .await?;
//! assert_eq!(entry.balance_after, 400);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod locks;
pub mod manager;
pub mod models;
pub mod store;

pub use errors::{LedgerError, LedgerResult};
pub use locks::{AccountGuard, LockTable};
pub use manager::Ledger;
pub use models::{
    AccountId, Adjustment, EntryKind, GameKind, HistoryQuery, LedgerEntry, RoundId,
};
pub use store::{LedgerStore, MemoryLedgerStore};
