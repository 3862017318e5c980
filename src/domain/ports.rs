use super::account::{Account, AccountNumber};
use super::clock::DayRange;
use super::transaction::{TransactionRecord, TransactionType};
use crate::error::StorageError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

pub type UnitId = u64;

/// An open unit of work.
///
/// Holds the store's exclusive unit lock for as long as it lives. Every store
/// call made on behalf of the unit borrows it; `commit` and `rollback` consume
/// it. Dropping a unit without either releases the lock, and the store
/// discards whatever the unit staged.
#[derive(Debug)]
pub struct Unit {
    id: UnitId,
    _exclusive: OwnedMutexGuard<()>,
}

impl Unit {
    pub fn new(id: UnitId, exclusive: OwnedMutexGuard<()>) -> Self {
        Self {
            id,
            _exclusive: exclusive,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
    ) -> Result<Option<Account>, StorageError>;

    /// Overwrites the balance and returns the number of rows affected.
    async fn update_balance(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        new_amount: Decimal,
    ) -> Result<u64, StorageError>;

    async fn all_accounts(&self, unit: &Unit) -> Result<Vec<Account>, StorageError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Appends a history row stamped with the store's clock and returns the
    /// number of rows affected.
    async fn insert_transaction(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<u64, StorageError>;

    async fn query_transactions(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        transaction_type: TransactionType,
        day: DayRange,
    ) -> Result<Vec<TransactionRecord>, StorageError>;
}

/// All-or-nothing boundary around account and transaction writes.
///
/// Units are isolated from one another: `begin` waits until no other unit is
/// open, and store calls only see committed state plus their own unit's writes.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Unit, StorageError>;
    async fn commit(&self, unit: Unit) -> Result<(), StorageError>;
    async fn rollback(&self, unit: Unit) -> Result<(), StorageError>;
}

pub type AccountStoreBox = Box<dyn AccountStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;
