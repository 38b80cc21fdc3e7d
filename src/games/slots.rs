//! Slots engine: stateless single-spin reel matching.
//!
//! Three reels, each an eight-stop strip with its own skewed symbol
//! distribution. Payout evaluation is position-sensitive left to right: a
//! line pays only when matching symbols occupy a contiguous prefix of the
//! row, so positions {0,1,2} pay the 3-of-a-kind rate, {0,1} the
//! 2-of-a-kind rate, and {0,2} with a different middle symbol pays
//! nothing. That ordering rule is part of the payout table players learn,
//! not an accident, and is preserved exactly.

use crate::games::{
    errors::GameResult,
    rng::{RandomSource, ThreadRandom},
};
use crate::ledger::{AccountId, Adjustment, GameKind, Ledger, RoundId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default cost of one spin.
pub const DEFAULT_SPIN_COST: i64 = 1;

/// Stops per reel strip.
pub const REEL_STOPS: usize = 8;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Symbol {
    Cherry,
    Lemon,
    Banana,
    Apple,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Cherry => "CHERRY",
            Self::Lemon => "LEMON",
            Self::Banana => "BANANA",
            Self::Apple => "APPLE",
        };
        write!(f, "{repr}")
    }
}

/// Reel strips. Symbol weights differ per reel and per symbol; the odds
/// are intentionally skewed, not uniform.
const REELS: [[Symbol; REEL_STOPS]; 3] = [
    [
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Lemon,
        Symbol::Banana,
        Symbol::Banana,
        Symbol::Lemon,
        Symbol::Apple,
        Symbol::Lemon,
    ],
    [
        Symbol::Lemon,
        Symbol::Lemon,
        Symbol::Banana,
        Symbol::Apple,
        Symbol::Cherry,
        Symbol::Lemon,
        Symbol::Lemon,
        Symbol::Apple,
    ],
    [
        Symbol::Lemon,
        Symbol::Lemon,
        Symbol::Banana,
        Symbol::Lemon,
        Symbol::Cherry,
        Symbol::Apple,
        Symbol::Lemon,
        Symbol::Apple,
    ],
];

/// Payout rates per unit of spin cost, checked in order: a three-symbol
/// row first, then its two-symbol prefix.
fn payout_rate(row: [Symbol; 3]) -> i64 {
    use Symbol::{Apple, Banana, Cherry, Lemon};
    match row {
        [Cherry, Cherry, Cherry] => 50,
        [Cherry, Cherry, _] => 40,
        [Apple, Apple, Apple] => 20,
        [Apple, Apple, _] => 10,
        [Banana, Banana, Banana] => 15,
        [Banana, Banana, _] => 5,
        [Lemon, Lemon, Lemon] => 3,
        _ => 0,
    }
}

/// Result payload of one spin.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReelResult {
    pub round: RoundId,
    pub symbols: [Symbol; 3],
    /// Stop index per reel, for fairness audits and the reel animation.
    pub stops: [usize; 3],
    pub cost: i64,
    pub payout: i64,
    pub balance: i64,
}

/// Stateless slots engine over the ledger.
pub struct SlotsEngine {
    ledger: Ledger,
    rng: Arc<dyn RandomSource>,
    cost: i64,
}

impl SlotsEngine {
    #[must_use]
    pub fn new(ledger: Ledger) -> Self {
        Self::with_rng(ledger, Arc::new(ThreadRandom), DEFAULT_SPIN_COST)
    }

    /// Engine with an injected random source and spin cost.
    #[must_use]
    pub fn with_rng(ledger: Ledger, rng: Arc<dyn RandomSource>, cost: i64) -> Self {
        Self { ledger, rng, cost }
    }

    /// Spin cost in coins.
    #[must_use]
    pub fn cost(&self) -> i64 {
        self.cost
    }

    /// Debit the spin cost, stop each reel independently, and credit any
    /// payout under the same round correlation id.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - balance is below the spin cost
    pub async fn spin(&self, account: &AccountId) -> GameResult<ReelResult> {
        let guard = self.ledger.lock_account(account).await?;
        let round = RoundId::new();
        self.ledger
            .adjust_locked(
                &guard,
                Adjustment::wager(-self.cost, GameKind::Reel, round).describe("Slots spin"),
            )
            .await?;

        let stops = [
            self.rng.draw(REEL_STOPS),
            self.rng.draw(REEL_STOPS),
            self.rng.draw(REEL_STOPS),
        ];
        let symbols = [
            REELS[0][stops[0]],
            REELS[1][stops[1]],
            REELS[2][stops[2]],
        ];
        let payout = payout_rate(symbols) * self.cost;

        if payout > 0 {
            let metadata = serde_json::json!({
                "symbols": symbols.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "stops": stops,
                "payout": payout,
            });
            self.ledger
                .adjust_locked(
                    &guard,
                    Adjustment::payout(payout, GameKind::Reel, round)
                        .describe(format!(
                            "Slots win: {} {} {}",
                            symbols[0], symbols[1], symbols[2]
                        ))
                        .with_metadata(metadata),
                )
                .await?;
        }

        let balance = self.ledger.balance(account).await?;
        log::info!(
            "account {account}: slots round {round} [{} {} {}], paid {payout}, balance {balance}",
            symbols[0],
            symbols[1],
            symbols[2],
        );

        Ok(ReelResult {
            round,
            symbols,
            stops,
            cost: self.cost,
            payout,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Symbol::{Apple, Banana, Cherry, Lemon};

    #[test]
    fn three_of_a_kind_rates() {
        assert_eq!(payout_rate([Cherry, Cherry, Cherry]), 50);
        assert_eq!(payout_rate([Apple, Apple, Apple]), 20);
        assert_eq!(payout_rate([Banana, Banana, Banana]), 15);
        assert_eq!(payout_rate([Lemon, Lemon, Lemon]), 3);
    }

    #[test]
    fn two_of_a_kind_pays_only_on_the_left_prefix() {
        assert_eq!(payout_rate([Cherry, Cherry, Lemon]), 40);
        assert_eq!(payout_rate([Apple, Apple, Cherry]), 10);
        assert_eq!(payout_rate([Banana, Banana, Lemon]), 5);
        // Two lemons without the third pay nothing.
        assert_eq!(payout_rate([Lemon, Lemon, Cherry]), 0);
    }

    #[test]
    fn non_contiguous_matches_pay_nothing() {
        assert_eq!(payout_rate([Cherry, Lemon, Cherry]), 0);
        assert_eq!(payout_rate([Apple, Banana, Apple]), 0);
        assert_eq!(payout_rate([Lemon, Cherry, Cherry]), 0);
    }

    #[test]
    fn reel_weights_are_skewed() {
        for reel in REELS {
            let cherries = reel.iter().filter(|s| **s == Cherry).count();
            let lemons = reel.iter().filter(|s| **s == Lemon).count();
            assert_eq!(cherries, 1);
            assert_eq!(lemons, 4);
        }
    }

    #[test]
    fn known_stops_map_to_known_symbols() {
        assert_eq!(REELS[0][0], Cherry);
        assert_eq!(REELS[1][4], Cherry);
        assert_eq!(REELS[2][4], Cherry);
        assert_eq!(REELS[0][6], Apple);
    }
}
