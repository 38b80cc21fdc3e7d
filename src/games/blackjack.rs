//! Blackjack engine: the stateful two-hand comparison game.
//!
//! One round per account, persisted through a [`SessionStore`] and played
//! through `start_round`, `hit`, `stand`, `double_down`, and `split`.
//! Every ledger mutation and every session read/write of an action happens
//! inside the account's exclusive critical section, so a second action for
//! the same account waits until the first one's atomic unit completes.
//!
//! Settlement per hand against the final dealer hand: a bust always loses;
//! a non-losing hand gets its stake back as a refund entry; winnings come
//! as a payout entry at 1:1, or 3:2 for a natural (a dealt two-card 21).
//! All entries of a round share its correlation id.

use crate::games::{
    errors::{GameError, GameResult},
    rng::{RandomSource, ThreadRandom},
};
use crate::ledger::{AccountGuard, AccountId, Adjustment, GameKind, Ledger, RoundId};
use crate::session::SessionStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Number of 52-card decks in a freshly shuffled shoe.
pub const SHOE_DECKS: usize = 6;

/// Dealer draws while below this total and stands at or above it.
pub const DEALER_STANDS_AT: u8 = 17;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    /// Blackjack value with aces counted high; [`hand_value`] demotes
    /// aces to 1 as needed.
    #[must_use]
    pub fn value(&self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten | Self::Jack | Self::Queen | Self::King => 10,
            Self::Ace => 11,
        }
    }

    const ALL: [Rank; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// The working set of cards available to deal from during a round.
///
/// Cards are dealt from the back, so the last element is the next card.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Shoe {
    cards: Vec<Card>,
}

impl Shoe {
    /// A freshly shuffled multi-deck shoe, Fisher-Yates over the injected
    /// random source.
    #[must_use]
    pub fn shuffled(decks: usize, rng: &dyn RandomSource) -> Self {
        let mut cards = Vec::with_capacity(decks * 52);
        for _ in 0..decks {
            for rank in Rank::ALL {
                for suit in [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart] {
                    cards.push(Card::new(rank, suit));
                }
            }
        }
        for i in (1..cards.len()).rev() {
            cards.swap(i, rng.draw(i + 1));
        }
        Self { cards }
    }

    /// A shoe with a fixed card order; the *last* card is dealt first.
    /// Deterministic entry point for tests and round replay.
    #[must_use]
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

/// Hand total with aces counted 11, demoted to 1 one at a time while the
/// total busts.
#[must_use]
pub fn hand_value(cards: &[Card]) -> u8 {
    let mut value: u8 = cards.iter().map(|card| card.rank.value()).sum();
    let mut aces = cards.iter().filter(|card| card.rank == Rank::Ace).count();
    while value > 21 && aces > 0 {
        value -= 10;
        aces -= 1;
    }
    value
}

/// One player hand and the stake riding on it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Hand {
    pub cards: Vec<Card>,
    pub stake: i64,
}

impl Hand {
    #[must_use]
    pub fn value(&self) -> u8 {
        hand_value(&self.cards)
    }

    #[must_use]
    pub fn is_bust(&self) -> bool {
        self.value() > 21
    }
}

/// Round phase. `Settled` only appears in views; settled rounds are
/// cleared from the session store.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    PlayerTurn,
    DealerTurn,
    Settled,
}

/// Outcome of one hand at settlement.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandOutcome {
    /// Dealt two-card 21 beating a non-21 dealer hand; pays 3:2.
    Natural,
    /// Pays 1:1.
    Win,
    /// Stake returned, net effect zero.
    Push,
    /// The wager entry already recorded the loss.
    Lose,
}

impl fmt::Display for HandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Natural => "natural",
            Self::Win => "win",
            Self::Push => "push",
            Self::Lose => "lose",
        };
        write!(f, "{repr}")
    }
}

/// The persisted state of one in-progress round.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlackjackRound {
    pub round: RoundId,
    pub initial_wager: i64,
    pub dealer: Vec<Card>,
    pub hands: Vec<Hand>,
    pub active_hand: usize,
    pub split: bool,
    pub doubled: bool,
    pub phase: RoundPhase,
    pub shoe: Shoe,
    pub updated_at: DateTime<Utc>,
}

impl BlackjackRound {
    /// Deal a fresh round: two cards each, player first, from the shoe.
    fn deal(round: RoundId, wager: i64, mut shoe: Shoe) -> GameResult<Self> {
        let mut player = Vec::with_capacity(4);
        let mut dealer = Vec::with_capacity(4);
        player.push(deal_from(&mut shoe)?);
        dealer.push(deal_from(&mut shoe)?);
        player.push(deal_from(&mut shoe)?);
        dealer.push(deal_from(&mut shoe)?);
        Ok(Self {
            round,
            initial_wager: wager,
            dealer,
            hands: vec![Hand {
                cards: player,
                stake: wager,
            }],
            active_hand: 0,
            split: false,
            doubled: false,
            phase: RoundPhase::PlayerTurn,
            shoe,
            updated_at: Utc::now(),
        })
    }

    /// A natural only exists on the original two-card hand.
    fn player_natural(&self) -> bool {
        !self.split && self.hands[0].cards.len() == 2 && self.hands[0].value() == 21
    }

    fn all_hands_bust(&self) -> bool {
        self.hands.iter().all(Hand::is_bust)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn deal_from(shoe: &mut Shoe) -> GameResult<Card> {
    shoe.deal()
        .ok_or_else(|| GameError::illegal("shoe exhausted"))
}

/// Public view of a hand.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HandView {
    pub cards: Vec<Card>,
    pub value: u8,
    pub stake: i64,
    pub outcome: Option<HandOutcome>,
}

/// Result payload returned to the caller after every action.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlackjackView {
    pub round: RoundId,
    pub phase: RoundPhase,
    /// Only the up card while the player still acts; the full hand once
    /// the dealer has played.
    pub dealer: Vec<Card>,
    pub dealer_value: Option<u8>,
    pub hands: Vec<HandView>,
    pub active_hand: usize,
    pub balance: i64,
}

/// Stateful blackjack engine over the ledger and session store.
pub struct BlackjackEngine {
    ledger: Ledger,
    sessions: Arc<dyn SessionStore>,
    rng: Arc<dyn RandomSource>,
}

impl BlackjackEngine {
    #[must_use]
    pub fn new(ledger: Ledger, sessions: Arc<dyn SessionStore>) -> Self {
        Self::with_rng(ledger, sessions, Arc::new(ThreadRandom))
    }

    /// Engine with an injected random source for deterministic shuffles.
    #[must_use]
    pub fn with_rng(
        ledger: Ledger,
        sessions: Arc<dyn SessionStore>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            ledger,
            sessions,
            rng,
        }
    }

    /// Start a round with a freshly shuffled shoe.
    ///
    /// Debits the wager, deals two cards each, and settles immediately on
    /// a dealt natural. Fails without any state change if a round is
    /// already in progress or the wager exceeds the balance.
    ///
    /// # Errors
    ///
    /// * `GameError::IllegalAction` - a round is already in progress
    /// * `GameError::InvalidBet` - non-positive wager
    /// * `LedgerError::InsufficientFunds` - wager exceeds the balance
    pub async fn start_round(&self, account: &AccountId, wager: i64) -> GameResult<BlackjackView> {
        let shoe = Shoe::shuffled(SHOE_DECKS, self.rng.as_ref());
        self.start_round_with_shoe(account, wager, shoe).await
    }

    /// Start a round dealing from a caller-supplied shoe.
    ///
    /// Deterministic entry point (injectable card order) used by tests
    /// and round replay; dealing order is player, dealer, player, dealer
    /// from the back of the shoe.
    pub async fn start_round_with_shoe(
        &self,
        account: &AccountId,
        wager: i64,
        shoe: Shoe,
    ) -> GameResult<BlackjackView> {
        if wager <= 0 {
            return Err(GameError::invalid_bet("wager must be positive"));
        }

        let guard = self.ledger.lock_account(account).await?;
        if self.sessions.get(account).await?.is_some() {
            return Err(GameError::illegal("a round is already in progress"));
        }

        let round_id = RoundId::new();
        self.ledger
            .adjust_locked(
                &guard,
                Adjustment::wager(-wager, GameKind::Card, round_id)
                    .describe("Blackjack wager"),
            )
            .await?;

        let round = BlackjackRound::deal(round_id, wager, shoe)?;
        log::info!(
            "account {account}: blackjack round {round_id} started, wager {wager}"
        );

        if round.player_natural() {
            // Settle right away; the dealer does not draw against a
            // dealt natural.
            return self.settle(&guard, round).await;
        }

        self.sessions.put(account, &round).await?;
        self.view_in_progress(&guard, &round).await
    }

    /// Draw one card into the active hand.
    ///
    /// Busting the last unplayed hand settles the round; reaching exactly
    /// 21 auto-stands.
    pub async fn hit(&self, account: &AccountId) -> GameResult<BlackjackView> {
        let guard = self.ledger.lock_account(account).await?;
        let mut round = self.require_round(&guard).await?;

        let card = deal_from(&mut round.shoe)?;
        round.hands[round.active_hand].cards.push(card);

        if round.hands[round.active_hand].value() >= 21 {
            self.advance(&guard, round).await
        } else {
            round.touch();
            self.sessions.put(account, &round).await?;
            self.view_in_progress(&guard, &round).await
        }
    }

    /// Stand on the active hand.
    ///
    /// Advances to a still-unplayed split hand, otherwise runs dealer play
    /// to completion and settles.
    pub async fn stand(&self, account: &AccountId) -> GameResult<BlackjackView> {
        let guard = self.ledger.lock_account(account).await?;
        let round = self.require_round(&guard).await?;
        self.advance(&guard, round).await
    }

    /// Double the wager, draw exactly one card, and stand.
    ///
    /// Only valid as the first action on the original two-card hand; the
    /// additional wager entry shares the round's correlation id.
    ///
    /// # Errors
    ///
    /// * `GameError::IllegalAction` - hand was already hit, split, or doubled
    /// * `LedgerError::InsufficientFunds` - balance cannot cover the
    ///   additional wager; the round is left untouched
    pub async fn double_down(&self, account: &AccountId) -> GameResult<BlackjackView> {
        let guard = self.ledger.lock_account(account).await?;
        let mut round = self.require_round(&guard).await?;

        if round.split {
            return Err(GameError::illegal("cannot double down after a split"));
        }
        if round.doubled || round.hands[0].cards.len() != 2 {
            return Err(GameError::illegal(
                "double down is only valid as the first action",
            ));
        }

        let stake = round.hands[0].stake;
        self.ledger
            .adjust_locked(
                &guard,
                Adjustment::wager(-stake, GameKind::Card, round.round)
                    .describe("Blackjack double down"),
            )
            .await?;

        round.doubled = true;
        round.hands[0].stake += stake;
        let card = deal_from(&mut round.shoe)?;
        round.hands[0].cards.push(card);

        // One card, then a forced stand either way.
        self.advance(&guard, round).await
    }

    /// Split a two-card pair of equal rank into two hands.
    ///
    /// Each hand receives one new card and carries the original stake; the
    /// additional wager entry shares the round's correlation id. The first
    /// hand is played to completion before the second.
    ///
    /// # Errors
    ///
    /// * `GameError::IllegalAction` - not a first action, unequal ranks,
    ///   or already split
    /// * `LedgerError::InsufficientFunds` - balance cannot cover the
    ///   additional wager; the round is left untouched
    pub async fn split(&self, account: &AccountId) -> GameResult<BlackjackView> {
        let guard = self.ledger.lock_account(account).await?;
        let mut round = self.require_round(&guard).await?;

        if round.split {
            return Err(GameError::illegal("hand was already split"));
        }
        if round.hands[0].cards.len() != 2 {
            return Err(GameError::illegal("split is only valid as the first action"));
        }
        if round.hands[0].cards[0].rank != round.hands[0].cards[1].rank {
            return Err(GameError::illegal("split requires two cards of equal rank"));
        }

        let stake = round.hands[0].stake;
        self.ledger
            .adjust_locked(
                &guard,
                Adjustment::wager(-stake, GameKind::Card, round.round)
                    .describe("Blackjack split wager"),
            )
            .await?;

        // One original card per hand, then one new card each, first hand
        // first.
        let moved = round.hands[0]
            .cards
            .pop()
            .ok_or_else(|| GameError::illegal("corrupt hand"))?;
        let first_extra = deal_from(&mut round.shoe)?;
        let second_extra = deal_from(&mut round.shoe)?;
        round.hands[0].cards.push(first_extra);
        round.hands.push(Hand {
            cards: vec![moved, second_extra],
            stake,
        });
        round.split = true;
        round.active_hand = 0;
        round.touch();

        self.sessions.put(account, &round).await?;
        self.view_in_progress(&guard, &round).await
    }

    /// Force-stand and settle rounds idle past `idle_after`.
    ///
    /// Abandoned rounds would otherwise leak forever; hosts run this from
    /// a periodic task. Returns the number of rounds swept.
    pub async fn sweep_abandoned(&self, idle_after: Duration) -> GameResult<usize> {
        let cutoff = Utc::now() - idle_after;
        let mut swept = 0;
        for account in self.sessions.idle_since(cutoff).await? {
            let guard = match self.ledger.lock_account(&account).await {
                Ok(guard) => guard,
                Err(err) => {
                    // Busy account; the round is not idle after all.
                    log::debug!("idle sweep skipping {account}: {err}");
                    continue;
                }
            };
            let Some(round) = self.sessions.get(&account).await? else {
                continue;
            };
            if round.updated_at > cutoff {
                continue;
            }
            log::info!(
                "account {account}: force-standing abandoned round {}",
                round.round
            );
            self.conclude(&guard, round).await?;
            swept += 1;
        }
        Ok(swept)
    }

    async fn require_round(&self, guard: &AccountGuard) -> GameResult<BlackjackRound> {
        self.sessions
            .get(guard.account())
            .await?
            .ok_or(GameError::GameNotFound)
    }

    /// Move to the next unplayed hand, or finish the round.
    async fn advance(
        &self,
        guard: &AccountGuard,
        mut round: BlackjackRound,
    ) -> GameResult<BlackjackView> {
        if round.active_hand + 1 < round.hands.len() {
            round.active_hand += 1;
            round.touch();
            self.sessions.put(guard.account(), &round).await?;
            self.view_in_progress(guard, &round).await
        } else {
            self.conclude(guard, round).await
        }
    }

    /// Dealer play plus settlement; clears the session.
    async fn conclude(
        &self,
        guard: &AccountGuard,
        mut round: BlackjackRound,
    ) -> GameResult<BlackjackView> {
        if !round.all_hands_bust() {
            round.phase = RoundPhase::DealerTurn;
            while hand_value(&round.dealer) < DEALER_STANDS_AT {
                let card = deal_from(&mut round.shoe)?;
                round.dealer.push(card);
            }
        }
        let view = self.settle(guard, round).await?;
        self.sessions.clear(guard.account()).await?;
        Ok(view)
    }

    /// Compare each hand against the final dealer hand and write the
    /// refund/payout entries.
    async fn settle(
        &self,
        guard: &AccountGuard,
        mut round: BlackjackRound,
    ) -> GameResult<BlackjackView> {
        round.phase = RoundPhase::Settled;
        let dealer_value = hand_value(&round.dealer);
        let natural = round.player_natural();

        let mut outcomes = Vec::with_capacity(round.hands.len());
        for (index, hand) in round.hands.iter().enumerate() {
            let value = hand.value();
            let outcome = if value > 21 {
                HandOutcome::Lose
            } else if dealer_value > 21 || value > dealer_value {
                if natural {
                    HandOutcome::Natural
                } else {
                    HandOutcome::Win
                }
            } else if value == dealer_value {
                HandOutcome::Push
            } else {
                HandOutcome::Lose
            };

            let winnings = match outcome {
                // 3:2, rounded down on odd stakes.
                HandOutcome::Natural => {
                    hand.stake
                        .checked_mul(3)
                        .ok_or(crate::ledger::LedgerError::BalanceOverflow)?
                        / 2
                }
                HandOutcome::Win => hand.stake,
                HandOutcome::Push | HandOutcome::Lose => 0,
            };

            let metadata = serde_json::json!({
                "hand": cards_repr(&hand.cards),
                "hand_value": value,
                "dealer": cards_repr(&round.dealer),
                "dealer_value": dealer_value,
                "outcome": outcome.to_string(),
                "stake": hand.stake,
                "hand_index": index,
            });

            if outcome != HandOutcome::Lose {
                self.ledger
                    .adjust_locked(
                        guard,
                        Adjustment::refund(hand.stake, GameKind::Card, round.round)
                            .describe("Blackjack stake returned")
                            .with_metadata(metadata.clone()),
                    )
                    .await?;
            }
            if winnings > 0 {
                self.ledger
                    .adjust_locked(
                        guard,
                        Adjustment::payout(winnings, GameKind::Card, round.round)
                            .describe(format!("Blackjack {outcome}"))
                            .with_metadata(metadata),
                    )
                    .await?;
            }
            outcomes.push(outcome);
        }

        let account = guard.account();
        let balance = self.ledger.balance(account).await?;
        log::info!(
            "account {account}: blackjack round {} settled ({}), balance {balance}",
            round.round,
            outcomes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        );

        Ok(BlackjackView {
            round: round.round,
            phase: RoundPhase::Settled,
            dealer: round.dealer.clone(),
            dealer_value: Some(dealer_value),
            hands: round
                .hands
                .iter()
                .zip(&outcomes)
                .map(|(hand, outcome)| HandView {
                    cards: hand.cards.clone(),
                    value: hand.value(),
                    stake: hand.stake,
                    outcome: Some(*outcome),
                })
                .collect(),
            active_hand: round.active_hand,
            balance,
        })
    }

    /// View of a round the player is still acting on; the dealer's hole
    /// card stays hidden.
    async fn view_in_progress(
        &self,
        guard: &AccountGuard,
        round: &BlackjackRound,
    ) -> GameResult<BlackjackView> {
        let balance = self.ledger.balance(guard.account()).await?;
        Ok(BlackjackView {
            round: round.round,
            phase: round.phase,
            dealer: round.dealer.first().copied().into_iter().collect(),
            dealer_value: None,
            hands: round
                .hands
                .iter()
                .map(|hand| HandView {
                    cards: hand.cards.clone(),
                    value: hand.value(),
                    stake: hand.stake,
                    outcome: None,
                })
                .collect(),
            active_hand: round.active_hand,
            balance,
        })
    }
}

fn cards_repr(cards: &[Card]) -> Vec<String> {
    cards.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(rank: Rank) -> Card {
        Card::new(rank, Suit::Spade)
    }

    #[test]
    fn hand_value_demotes_aces_one_at_a_time() {
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::King)]), 21);
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Ace)]), 12);
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::Ace), card(Rank::Nine)]),
            21
        );
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::King), card(Rank::Five)]),
            16
        );
        assert_eq!(
            hand_value(&[
                card(Rank::Ace),
                card(Rank::Ace),
                card(Rank::Ace),
                card(Rank::King),
                card(Rank::Nine)
            ]),
            22
        );
    }

    #[test]
    fn face_cards_count_ten() {
        assert_eq!(
            hand_value(&[card(Rank::Jack), card(Rank::Queen), card(Rank::King)]),
            30
        );
    }

    #[test]
    fn shuffled_shoe_has_the_full_count() {
        let shoe = Shoe::shuffled(SHOE_DECKS, &ThreadRandom);
        assert_eq!(shoe.remaining(), SHOE_DECKS * 52);
    }

    #[test]
    fn rigged_shoe_deals_from_the_back() {
        let mut shoe = Shoe::from_cards(vec![card(Rank::Two), card(Rank::Ace)]);
        assert_eq!(shoe.deal().unwrap().rank, Rank::Ace);
        assert_eq!(shoe.deal().unwrap().rank, Rank::Two);
        assert!(shoe.deal().is_none());
    }
}
