//! Environment-driven configuration.

use std::env;
use std::time::Duration;

/// Tunables for the wagering core.
#[derive(Clone, Debug)]
pub struct CasinoConfig {
    /// Coins credited to a freshly created account.
    pub opening_balance: i64,

    /// Bounded wait for an account's exclusive critical section.
    pub lock_timeout: Duration,

    /// Cost of one slots spin.
    pub slots_cost: i64,

    /// Blackjack rounds idle longer than this are force-stood and
    /// settled by the sweep.
    pub idle_round_after: chrono::Duration,
}

impl CasinoConfig {
    /// Configuration from environment variables, with defaults:
    ///
    /// - `CASINO_OPENING_BALANCE` (default: 1000)
    /// - `CASINO_LOCK_TIMEOUT_MS` (default: 5000)
    /// - `CASINO_SLOTS_COST` (default: 1)
    /// - `CASINO_IDLE_ROUND_SECS` (default: 900)
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            opening_balance: env_or("CASINO_OPENING_BALANCE", 1000),
            lock_timeout: Duration::from_millis(env_or("CASINO_LOCK_TIMEOUT_MS", 5000)),
            slots_cost: env_or("CASINO_SLOTS_COST", 1),
            idle_round_after: chrono::Duration::seconds(env_or("CASINO_IDLE_ROUND_SECS", 900)),
        }
    }
}

impl Default for CasinoConfig {
    fn default() -> Self {
        Self {
            opening_balance: 1000,
            lock_timeout: Duration::from_secs(5),
            slots_cost: 1,
            idle_round_after: chrono::Duration::minutes(15),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
