//! Game error types.

use crate::ledger::LedgerError;
use thiserror::Error;

/// Game errors
#[derive(Debug, Error)]
pub enum GameError {
    /// Action invalid for the current round state
    #[error("Illegal action: {0}")]
    IllegalAction(String),

    /// Malformed bet
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    /// No active round for the account
    #[error("No active round")]
    GameNotFound,

    /// Ledger error (insufficient funds, lock timeout, storage)
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl GameError {
    pub(crate) fn illegal(reason: impl Into<String>) -> Self {
        Self::IllegalAction(reason.into())
    }

    pub(crate) fn invalid_bet(reason: impl Into<String>) -> Self {
        Self::InvalidBet(reason.into())
    }

    /// Client-safe error message that doesn't leak internals.
    pub fn client_message(&self) -> String {
        match self {
            GameError::Ledger(err) => err.client_message(),
            _ => self.to_string(),
        }
    }

    /// Whether the caller may safely retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::Ledger(err) if err.is_retryable())
    }
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;
