mod common;

use atm_ledger::application::engine::TransactionEngine;
use atm_ledger::domain::account::{Account, AccountType};
use atm_ledger::domain::clock::Clock;
use atm_ledger::domain::transaction::TransactionType;
use atm_ledger::error::AtmError;
use common::{
    DroppingTransactionStore, StallingTransactionStore, UnreachableTransactionStore,
    VanishingAccountStore, balance, clock, engine_over, seeded_store,
};
use rust_decimal_macros::dec;
use std::error::Error as _;
use std::time::Duration;

#[tokio::test]
async fn test_overdraw_checking_is_rejected_and_balance_unchanged() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(1, "Alice", dec!(100), AccountType::Checking)],
    )
    .await;
    let engine = engine_over(&store, clock);

    let err = engine.withdrawal(1, dec!(150)).await.unwrap_err();

    assert!(matches!(err, AtmError::ValidationFailed(_)));
    assert_eq!(balance(&store, 1).await, dec!(100));
}

#[tokio::test]
async fn test_withdrawal_at_cap_records_one_transaction() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(1, "Alice", dec!(500), AccountType::Checking)],
    )
    .await;
    let engine = engine_over(&store, clock.clone());

    let account = engine.withdrawal(1, dec!(200)).await.unwrap();

    assert_eq!(account.amount, dec!(300));
    assert_eq!(balance(&store, 1).await, dec!(300));
    let history = store.history(1).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].transaction_type, TransactionType::Withdrawal);
    assert_eq!(history[0].amount, dec!(200));
    assert_eq!(history[0].ts, clock.now());
}

#[tokio::test]
async fn test_credit_withdrawal_beyond_available_credit() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(2, "Bob", dec!(-50), AccountType::Credit).with_credit_limit(dec!(200))],
    )
    .await;
    let engine = engine_over(&store, clock);

    let err = engine.withdrawal(2, dec!(200)).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Transaction exceeds current available credit of 150."
    );
    assert_eq!(balance(&store, 2).await, dec!(-50));

    let account = engine.withdrawal(2, dec!(150)).await.unwrap();
    assert_eq!(account.amount, dec!(-200));
}

#[tokio::test]
async fn test_credit_deposit_above_zero_is_rejected() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(3, "Carol", dec!(-300), AccountType::Credit).with_credit_limit(dec!(5000))],
    )
    .await;
    let engine = engine_over(&store, clock);

    let err = engine.deposit(3, dec!(400)).await.unwrap_err();

    assert!(err.is_rejection());
    assert!(err.to_string().ends_with("exceeds that limit by 100."));
    assert_eq!(balance(&store, 3).await, dec!(-300));
}

#[tokio::test]
async fn test_fifth_withdrawal_of_the_day_is_rejected() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(4, "Dan", dec!(1000), AccountType::Checking)],
    )
    .await;
    let engine = engine_over(&store, clock);

    for _ in 0..4 {
        engine.withdrawal(4, dec!(10)).await.unwrap();
    }
    let err = engine.withdrawal(4, dec!(10)).await.unwrap_err();

    assert_eq!(err.to_string(), "This account only allows 4 withdrawals a day.");
    assert_eq!(balance(&store, 4).await, dec!(960));
    assert_eq!(store.history(4).await.len(), 4);
}

#[tokio::test]
async fn test_failed_history_insert_rolls_back_balance() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(5, "Eve", dec!(500), AccountType::Savings)],
    )
    .await;
    let engine = TransactionEngine::new(
        Box::new(store.clone()),
        Box::new(DroppingTransactionStore(store.clone())),
        Box::new(store.clone()),
        clock,
    );

    let err = engine.withdrawal(5, dec!(100)).await.unwrap_err();

    assert!(matches!(
        err,
        AtmError::PersistenceError { account_number: 5, .. }
    ));
    assert!(!err.is_rejection());
    assert_eq!(balance(&store, 5).await, dec!(500));
}

#[tokio::test]
async fn test_store_failure_keeps_payload_out_of_message() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(6, "Frank", dec!(500), AccountType::Checking)],
    )
    .await;
    let engine = TransactionEngine::new(
        Box::new(store.clone()),
        Box::new(UnreachableTransactionStore),
        Box::new(store.clone()),
        clock,
    );

    let err = engine.withdrawal(6, dec!(50)).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Persistence failure for account 6 (attempted 50)"
    );
    assert!(
        err.source()
            .unwrap()
            .to_string()
            .contains("connection refused")
    );
    assert_eq!(balance(&store, 6).await, dec!(500));
}

#[tokio::test]
async fn test_zero_row_balance_update_is_a_conflict() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(7, "Grace", dec!(500), AccountType::Checking)],
    )
    .await;
    let engine = TransactionEngine::new(
        Box::new(VanishingAccountStore(store.clone())),
        Box::new(store.clone()),
        Box::new(store.clone()),
        clock,
    );

    assert!(matches!(
        engine.withdrawal(7, dec!(50)).await,
        Err(AtmError::PersistenceConflict { account_number: 7, .. })
    ));
    assert!(matches!(
        engine.deposit(7, dec!(50)).await,
        Err(AtmError::PersistenceConflict { account_number: 7, .. })
    ));
    assert!(store.history(7).await.is_empty());
}

#[tokio::test]
async fn test_unit_is_released_after_failure() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(8, "Heidi", dec!(100), AccountType::Checking)],
    )
    .await;
    let engine = engine_over(&store, clock);

    assert!(engine.withdrawal(8, dec!(7)).await.is_err());
    assert!(engine.withdrawal(99, dec!(5)).await.is_err());
    // A leaked unit would hold the store lock and hang here.
    assert_eq!(engine.deposit(8, dec!(25)).await.unwrap().amount, dec!(125));
}

#[tokio::test]
async fn test_cancelled_withdrawal_releases_its_unit() {
    let clock = clock();
    let store = seeded_store(
        clock.clone(),
        vec![Account::new(9, "Ivan", dec!(300), AccountType::Checking)],
    )
    .await;
    let engine = TransactionEngine::new(
        Box::new(store.clone()),
        Box::new(StallingTransactionStore(store.clone())),
        Box::new(store.clone()),
        clock,
    );

    let stalled = tokio::time::timeout(Duration::from_millis(50), engine.withdrawal(9, dec!(100))).await;
    assert!(stalled.is_err());

    let account = tokio::time::timeout(Duration::from_secs(2), engine.deposit(9, dec!(20)))
        .await
        .expect("unit of the cancelled withdrawal is still held")
        .unwrap();
    assert_eq!(account.amount, dec!(320));
    assert_eq!(balance(&store, 9).await, dec!(320));
    assert!(store.history(9).await.is_empty());
}
