#![allow(dead_code)]

use async_trait::async_trait;
use atm_ledger::application::engine::TransactionEngine;
use atm_ledger::domain::account::{Account, AccountNumber};
use atm_ledger::domain::clock::{DayRange, FixedClock};
use atm_ledger::domain::ports::{AccountStore, TransactionStore, Unit};
use atm_ledger::domain::transaction::{TransactionRecord, TransactionType};
use atm_ledger::error::StorageError;
use atm_ledger::infrastructure::in_memory::InMemoryStore;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap(),
    ))
}

pub async fn seeded_store(clock: Arc<FixedClock>, accounts: Vec<Account>) -> InMemoryStore {
    let store = InMemoryStore::with_clock(clock);
    for account in accounts {
        store.insert_account(account).await;
    }
    store
}

pub fn engine_over(store: &InMemoryStore, clock: Arc<FixedClock>) -> TransactionEngine {
    TransactionEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        clock,
    )
}

pub async fn balance(store: &InMemoryStore, account_number: AccountNumber) -> Decimal {
    store.account(account_number).await.unwrap().amount
}

/// Delegates to an in-memory store but reports every insert as affecting no rows.
pub struct DroppingTransactionStore(pub InMemoryStore);

#[async_trait]
impl TransactionStore for DroppingTransactionStore {
    async fn insert_transaction(
        &self,
        _unit: &Unit,
        _account_number: AccountNumber,
        _amount: Decimal,
        _transaction_type: TransactionType,
    ) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn query_transactions(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        transaction_type: TransactionType,
        day: DayRange,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        self.0
            .query_transactions(unit, account_number, transaction_type, day)
            .await
    }
}

/// A history store whose backend is down.
pub struct UnreachableTransactionStore;

#[async_trait]
impl TransactionStore for UnreachableTransactionStore {
    async fn insert_transaction(
        &self,
        _unit: &Unit,
        _account_number: AccountNumber,
        _amount: Decimal,
        _transaction_type: TransactionType,
    ) -> Result<u64, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }

    async fn query_transactions(
        &self,
        _unit: &Unit,
        _account_number: AccountNumber,
        _transaction_type: TransactionType,
        _day: DayRange,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        Err(StorageError::Backend("connection refused".to_string()))
    }
}

/// Serves reads from an in-memory store while every balance update misses,
/// as if the row had been deleted underneath the caller.
pub struct VanishingAccountStore(pub InMemoryStore);

#[async_trait]
impl AccountStore for VanishingAccountStore {
    async fn get_account(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
    ) -> Result<Option<Account>, StorageError> {
        self.0.get_account(unit, account_number).await
    }

    async fn update_balance(
        &self,
        _unit: &Unit,
        _account_number: AccountNumber,
        _new_amount: Decimal,
    ) -> Result<u64, StorageError> {
        Ok(0)
    }

    async fn all_accounts(&self, unit: &Unit) -> Result<Vec<Account>, StorageError> {
        self.0.all_accounts(unit).await
    }
}

/// Records normally, but every history lookup hangs, leaving the caller
/// parked inside its unit of work.
pub struct StallingTransactionStore(pub InMemoryStore);

#[async_trait]
impl TransactionStore for StallingTransactionStore {
    async fn insert_transaction(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<u64, StorageError> {
        self.0
            .insert_transaction(unit, account_number, amount, transaction_type)
            .await
    }

    async fn query_transactions(
        &self,
        _unit: &Unit,
        _account_number: AccountNumber,
        _transaction_type: TransactionType,
        _day: DayRange,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        std::future::pending().await
    }
}
