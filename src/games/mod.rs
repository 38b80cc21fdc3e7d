//! Game engines built on top of the ledger.
//!
//! Each engine debits a wager and credits any payout against the account's
//! single coin balance, inside that account's exclusive critical section.
//! All entries of one round share a [`crate::ledger::RoundId`].
//!
//! - [`blackjack`]: stateful two-hand comparison game (deal, hit, stand,
//!   double down, split, dealer play, settlement)
//! - [`roulette`]: stateless multi-bet wheel settlement
//! - [`slots`]: stateless single-spin reel matching with weighted reels

pub mod blackjack;
pub mod errors;
pub mod rng;
pub mod roulette;
pub mod slots;

pub use blackjack::{BlackjackEngine, BlackjackView, Card, Hand, HandOutcome, Rank, Shoe, Suit};
pub use errors::{GameError, GameResult};
pub use roulette::{Bet, BetOutcome, RouletteEngine, SpinResult};
pub use slots::{ReelResult, SlotsEngine, Symbol};
