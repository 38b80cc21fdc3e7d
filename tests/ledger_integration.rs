//! Ledger integration tests: conservation, serialization, and history.

use casino_core::{
    Adjustment, EntryKind, GameKind, HistoryQuery, Ledger, LedgerError, RoundId,
};
use casino_core::ledger::MemoryLedgerStore;
use std::sync::Arc;

fn ledger() -> Ledger {
    Ledger::new(Arc::new(MemoryLedgerStore::new()))
}

#[tokio::test]
async fn balance_equals_opening_plus_entry_sum() {
    let ledger = ledger();
    let account = "alice".into();
    ledger.create_account(&account, 1000).await.unwrap();

    ledger.deposit(&account, 250).await.unwrap();
    ledger.withdraw(&account, 100).await.unwrap();
    let round = RoundId::new();
    ledger
        .adjust(&account, Adjustment::wager(-40, GameKind::Wheel, round))
        .await
        .unwrap();
    ledger
        .adjust(&account, Adjustment::payout(80, GameKind::Wheel, round))
        .await
        .unwrap();
    ledger
        .adjust(
            &account,
            Adjustment::wager(-60, GameKind::Reel, RoundId::new()),
        )
        .await
        .unwrap();

    let history = ledger
        .history(&account, &HistoryQuery::latest(100))
        .await
        .unwrap();
    // Opening balance is itself a deposit entry, so the sum of all
    // amounts reproduces the balance from zero.
    let sum: i64 = history.iter().map(|entry| entry.amount).sum();
    assert_eq!(ledger.balance(&account).await.unwrap(), sum);
    assert_eq!(sum, 1000 + 250 - 100 - 40 + 80 - 60);

    for entry in &history {
        assert_eq!(entry.balance_after, entry.balance_before + entry.amount);
    }
    // Newest first; each entry picks up exactly where the next-older
    // one left off.
    for pair in history.windows(2) {
        assert_eq!(pair[0].balance_before, pair[1].balance_after);
    }
}

#[tokio::test]
async fn failed_debit_leaves_no_trace() {
    let ledger = ledger();
    let account = "alice".into();
    ledger.create_account(&account, 50).await.unwrap();

    let err = ledger
        .adjust(
            &account,
            Adjustment::wager(-51, GameKind::Card, RoundId::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            available: 50,
            required: 51
        }
    ));

    assert_eq!(ledger.balance(&account).await.unwrap(), 50);
    let wagers = ledger
        .history(&account, &HistoryQuery::default().kind(EntryKind::Wager))
        .await
        .unwrap();
    assert!(wagers.is_empty());
}

/// Twenty concurrent unit wagers against a balance of ten: exactly ten
/// succeed, the rest fail with insufficient funds, and the balance never
/// goes negative.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_wagers_never_overdraw() {
    let ledger = ledger();
    let account: casino_core::AccountId = "alice".into();
    ledger.create_account(&account, 10).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let ledger = ledger.clone();
        let account = account.clone();
        tasks.push(tokio::spawn(async move {
            ledger
                .adjust(
                    &account,
                    Adjustment::wager(-1, GameKind::Wheel, RoundId::new()),
                )
                .await
        }));
    }

    let mut won = 0;
    let mut lost = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(entry) => {
                assert!(entry.balance_after >= 0);
                won += 1;
            }
            Err(LedgerError::InsufficientFunds { .. }) => lost += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(won, 10);
    assert_eq!(lost, 10);
    assert_eq!(ledger.balance(&account).await.unwrap(), 0);
}

#[tokio::test]
async fn history_filters_by_game_and_paginates() {
    let ledger = ledger();
    let account = "alice".into();
    ledger.create_account(&account, 1000).await.unwrap();

    for _ in 0..4 {
        ledger
            .adjust(
                &account,
                Adjustment::wager(-5, GameKind::Reel, RoundId::new()),
            )
            .await
            .unwrap();
        ledger
            .adjust(
                &account,
                Adjustment::wager(-5, GameKind::Wheel, RoundId::new()),
            )
            .await
            .unwrap();
    }

    let reel = ledger
        .history(&account, &HistoryQuery::default().game(GameKind::Reel))
        .await
        .unwrap();
    assert_eq!(reel.len(), 4);
    assert!(reel.iter().all(|entry| entry.game == GameKind::Reel));

    // Page through everything (8 wagers + the opening deposit) in threes.
    let mut seen = Vec::new();
    let mut query = HistoryQuery::latest(3);
    loop {
        let page = ledger.history(&account, &query).await.unwrap();
        let Some(oldest) = page.last() else { break };
        query = HistoryQuery::latest(3).before(oldest.id);
        seen.extend(page);
    }
    assert_eq!(seen.len(), 9);
    for pair in seen.windows(2) {
        assert!(pair[0].id > pair[1].id);
    }
}

#[tokio::test]
async fn lock_timeout_is_reported_as_retryable() {
    let ledger = Ledger::with_lock_timeout(
        Arc::new(MemoryLedgerStore::new()),
        std::time::Duration::from_millis(20),
    );
    let account: casino_core::AccountId = "alice".into();
    ledger.create_account(&account, 10).await.unwrap();

    let guard = ledger.lock_account(&account).await.unwrap();
    let err = ledger
        .adjust(
            &account,
            Adjustment::wager(-1, GameKind::Card, RoundId::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConcurrencyTimeout(_)));
    assert!(err.is_retryable());
    drop(guard);

    // The account works again once the holder releases it.
    ledger
        .adjust(
            &account,
            Adjustment::wager(-1, GameKind::Card, RoundId::new()),
        )
        .await
        .unwrap();
}
