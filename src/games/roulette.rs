//! Roulette engine: stateless multi-bet wheel settlement.
//!
//! A spin validates the bet list, debits the total stake as one wager
//! entry, draws one winning number uniformly from the wheel, and credits
//! the aggregate payout (amount × odds per winning bet) as one payout
//! entry, all under one round correlation id inside the account's
//! exclusive critical section.

use crate::games::{
    errors::{GameError, GameResult},
    rng::{RandomSource, ThreadRandom},
};
use crate::ledger::{AccountId, Adjustment, GameKind, Ledger, RoundId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Highest number on the wheel; pockets run 0..=36.
pub const WHEEL_MAX: u8 = 36;

/// One wheel bet: a stake, a payout multiplier, and the covered numbers.
///
/// Ephemeral; bets are not persisted beyond the round.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Bet {
    pub amount: i64,
    /// Payout multiplier ("odds"): a winning bet pays `amount × odds`.
    pub odds: u32,
    pub numbers: Vec<u8>,
}

impl Bet {
    /// Single-number (straight) bet at the conventional 35:1.
    #[must_use]
    pub fn straight(amount: i64, number: u8) -> Self {
        Self {
            amount,
            odds: 35,
            numbers: vec![number],
        }
    }

    fn validate(&self) -> GameResult<()> {
        if self.amount <= 0 {
            return Err(GameError::invalid_bet(format!(
                "bet amount must be positive, got {}",
                self.amount
            )));
        }
        if self.numbers.is_empty() {
            return Err(GameError::invalid_bet("bet covers no numbers"));
        }
        if let Some(number) = self.numbers.iter().find(|n| **n > WHEEL_MAX) {
            return Err(GameError::invalid_bet(format!(
                "number {number} is outside the wheel (0-{WHEEL_MAX})"
            )));
        }
        Ok(())
    }

    fn covers(&self, number: u8) -> bool {
        self.numbers.contains(&number)
    }
}

/// Per-bet outcome of a spin.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BetOutcome {
    pub bet: Bet,
    pub won: bool,
    pub payout: i64,
}

/// Result payload of one spin.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpinResult {
    pub round: RoundId,
    pub winning_number: u8,
    pub total_bet: i64,
    pub total_payout: i64,
    pub bets: Vec<BetOutcome>,
    pub balance: i64,
}

/// Stateless roulette engine over the ledger.
pub struct RouletteEngine {
    ledger: Ledger,
    rng: Arc<dyn RandomSource>,
}

impl RouletteEngine {
    #[must_use]
    pub fn new(ledger: Ledger) -> Self {
        Self::with_rng(ledger, Arc::new(ThreadRandom))
    }

    /// Engine with an injected random source for deterministic draws.
    #[must_use]
    pub fn with_rng(ledger: Ledger, rng: Arc<dyn RandomSource>) -> Self {
        Self { ledger, rng }
    }

    /// Validate the bet list, debit the total stake, spin, and settle.
    ///
    /// Validation happens before any write; a malformed bet leaves the
    /// balance untouched. The stake-versus-balance check is enforced by
    /// the ledger debit itself and surfaces as `InsufficientFunds`.
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidBet` - non-positive amount, empty or
    ///   out-of-range numbers, an empty bet list, or a stake/payout
    ///   total that overflows
    /// * `LedgerError::InsufficientFunds` - total stake exceeds the balance
    pub async fn spin(&self, account: &AccountId, bets: Vec<Bet>) -> GameResult<SpinResult> {
        if bets.is_empty() {
            return Err(GameError::invalid_bet("at least one bet is required"));
        }
        let mut total_bet: i64 = 0;
        let mut max_payout: i64 = 0;
        for bet in &bets {
            bet.validate()?;
            total_bet = total_bet
                .checked_add(bet.amount)
                .ok_or_else(|| GameError::invalid_bet("total stake overflows"))?;
            // Bound the worst case (every bet wins) up front so the
            // settlement arithmetic below stays in range.
            let potential = bet
                .amount
                .checked_mul(i64::from(bet.odds))
                .ok_or_else(|| GameError::invalid_bet("bet payout overflows"))?;
            max_payout = max_payout
                .checked_add(potential)
                .ok_or_else(|| GameError::invalid_bet("total payout overflows"))?;
        }

        let guard = self.ledger.lock_account(account).await?;
        let round = RoundId::new();
        self.ledger
            .adjust_locked(
                &guard,
                Adjustment::wager(-total_bet, GameKind::Wheel, round)
                    .describe("Roulette spin"),
            )
            .await?;

        let winning_number = self.rng.draw(usize::from(WHEEL_MAX) + 1) as u8;

        let outcomes: Vec<BetOutcome> = bets
            .into_iter()
            .map(|bet| {
                let won = bet.covers(winning_number);
                let payout = if won {
                    bet.amount * i64::from(bet.odds)
                } else {
                    0
                };
                BetOutcome { bet, won, payout }
            })
            .collect();
        let total_payout: i64 = outcomes.iter().map(|outcome| outcome.payout).sum();

        if total_payout > 0 {
            let metadata = serde_json::json!({
                "winning_number": winning_number,
                "bets": outcomes
                    .iter()
                    .map(|outcome| serde_json::json!({
                        "amount": outcome.bet.amount,
                        "odds": outcome.bet.odds,
                        "numbers": outcome.bet.numbers,
                        "won": outcome.won,
                        "payout": outcome.payout,
                    }))
                    .collect::<Vec<_>>(),
            });
            self.ledger
                .adjust_locked(
                    &guard,
                    Adjustment::payout(total_payout, GameKind::Wheel, round)
                        .describe(format!("Roulette win on {winning_number}"))
                        .with_metadata(metadata),
                )
                .await?;
        }

        let balance = self.ledger.balance(account).await?;
        log::info!(
            "account {account}: roulette round {round} landed {winning_number}, \
             bet {total_bet}, paid {total_payout}, balance {balance}"
        );

        Ok(SpinResult {
            round,
            winning_number,
            total_bet,
            total_payout,
            bets: outcomes,
            balance,
        })
    }
}
