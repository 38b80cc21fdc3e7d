//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque account key assigned by the (external) auth layer.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct AccountId(String);

impl AccountId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation id shared by every entry belonging to one game round.
///
/// Assigned when the round starts and attached to the wager entry and any
/// payout/refund entries it produces, so a round can be reconstructed from
/// the log without inferring linkage from timestamps.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct RoundId(Uuid);

impl RoundId {
    /// Generate a fresh round id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RoundId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry kind
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Wager,
    Payout,
    Refund,
    Deposit,
    Withdrawal,
    Bonus,
    Adjustment,
}

impl EntryKind {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "wager" => Some(Self::Wager),
            "payout" => Some(Self::Payout),
            "refund" => Some(Self::Refund),
            "deposit" => Some(Self::Deposit),
            "withdrawal" => Some(Self::Withdrawal),
            "bonus" => Some(Self::Bonus),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Wager => "wager",
            Self::Payout => "payout",
            Self::Refund => "refund",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Bonus => "bonus",
            Self::Adjustment => "adjustment",
        };
        write!(f, "{repr}")
    }
}

/// Game that produced an entry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Card,
    Wheel,
    Reel,
    None,
}

impl GameKind {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "card" => Some(Self::Card),
            "wheel" => Some(Self::Wheel),
            "reel" => Some(Self::Reel),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Card => "card",
            Self::Wheel => "wheel",
            Self::Reel => "reel",
            Self::None => "none",
        };
        write!(f, "{repr}")
    }
}

/// One immutable record of a balance mutation.
///
/// Invariant: `balance_after == balance_before + amount`, and for any
/// account the current balance equals the opening balance plus the sum of
/// all entry amounts. Entries are never mutated or deleted.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LedgerEntry {
    /// Sequence id, monotonically increasing per account.
    pub id: i64,
    pub account: AccountId,
    pub kind: EntryKind,
    /// Signed amount: negative for debits, positive for credits.
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub game: GameKind,
    pub description: Option<String>,
    /// Free-form structured detail (dealt cards, winning number, symbols).
    pub metadata: serde_json::Value,
    pub round: RoundId,
    pub created_at: DateTime<Utc>,
}

/// Parameters for one balance mutation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Adjustment {
    pub amount: i64,
    pub kind: EntryKind,
    pub game: GameKind,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub round: RoundId,
}

impl Adjustment {
    #[must_use]
    pub fn new(amount: i64, kind: EntryKind, game: GameKind, round: RoundId) -> Self {
        Self {
            amount,
            kind,
            game,
            description: None,
            metadata: serde_json::Value::Null,
            round,
        }
    }

    /// Shorthand for a wager debit. `amount` must already be negative.
    #[must_use]
    pub fn wager(amount: i64, game: GameKind, round: RoundId) -> Self {
        Self::new(amount, EntryKind::Wager, game, round)
    }

    /// Shorthand for a payout credit.
    #[must_use]
    pub fn payout(amount: i64, game: GameKind, round: RoundId) -> Self {
        Self::new(amount, EntryKind::Payout, game, round)
    }

    /// Shorthand for a refund credit (returned stake, net effect zero).
    #[must_use]
    pub fn refund(amount: i64, game: GameKind, round: RoundId) -> Self {
        Self::new(amount, EntryKind::Refund, game, round)
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filters and pagination for history reads.
///
/// History is returned newest first. `before` restarts the scan from a
/// previous page's oldest sequence id, so consumers can walk the full log
/// in bounded chunks.
#[derive(Clone, Debug, Default)]
pub struct HistoryQuery {
    pub kind: Option<EntryKind>,
    pub game: Option<GameKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    /// Only entries with sequence id strictly below this.
    pub before: Option<i64>,
    pub limit: usize,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: usize = 50;

    #[must_use]
    pub fn latest(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn game(mut self, game: GameKind) -> Self {
        self.game = Some(game);
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn before(mut self, before: i64) -> Self {
        self.before = Some(before);
        self
    }

    pub(crate) fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            Self::DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    /// Whether an entry passes the kind/game/time filters.
    pub(crate) fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(kind) = self.kind
            && entry.kind != kind
        {
            return false;
        }
        if let Some(game) = self.game
            && entry.game != game
        {
            return false;
        }
        if let Some(since) = self.since
            && entry.created_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && entry.created_at > until
        {
            return false;
        }
        if let Some(before) = self.before
            && entry.id >= before
        {
            return false;
        }
        true
    }
}
