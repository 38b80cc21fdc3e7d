//! Ledger error types.

use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Debit would take the balance below zero; nothing was written
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Credit would overflow the balance
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Exclusive access to the account could not be acquired within the
    /// bounded wait. No partial effect was produced; callers may retry.
    #[error("Timed out waiting for exclusive access to account {0}")]
    ConcurrencyTimeout(String),

    /// Persisted state could not be decoded
    #[error("Corrupt ledger record: {0}")]
    CorruptRecord(String),
}

impl LedgerError {
    /// Client-safe error message that doesn't leak internals.
    ///
    /// Database and decode errors are sanitized, and account ids are
    /// redacted from not-found messages.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::CorruptRecord(_) => {
                "Internal server error".to_string()
            }
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::ConcurrencyTimeout(_) => {
                "Account is busy, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether the caller may safely retry the operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyTimeout(_))
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
