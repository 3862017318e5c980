use crate::domain::account::{Account, AccountNumber};
use crate::domain::clock::{ClockRef, DayRange};
use crate::domain::ports::{AccountStore, TransactionStore, Unit, UnitId, UnitOfWork};
use crate::domain::transaction::{TransactionId, TransactionRecord, TransactionType};
use crate::error::StorageError;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for storing account states.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing transaction history, keyed by account then id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for store bookkeeping such as the transaction id sequence.
pub const CF_META: &str = "meta";

const LAST_TRANSACTION_ID: &[u8] = b"last_transaction_id";

/// Writes made inside an open unit. Nothing reaches RocksDB until commit.
struct PendingUnit {
    id: UnitId,
    accounts: BTreeMap<AccountNumber, Account>,
    transactions: Vec<TransactionRecord>,
}

/// A persistent store implementation using RocksDB.
///
/// Accounts, history rows and the id sequence live in separate Column
/// Families. Writes made in a unit of work are staged, read back by the same
/// unit, and applied together with a single `WriteBatch` on commit. Only
/// fixture loading writes to the database directly.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    clock: ClockRef,
    unit_lock: Arc<Mutex<()>>,
    pending: Arc<Mutex<Option<PendingUnit>>>,
    unit_counter: Arc<AtomicU64>,
    last_transaction_id: Arc<AtomicU64>,
}

fn account_key(account_number: AccountNumber) -> [u8; 8] {
    account_number.to_be_bytes()
}

fn transaction_key(account_number: AccountNumber, id: TransactionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&account_number.to_be_bytes());
    key.extend_from_slice(&id.to_be_bytes());
    key
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and restores the
    /// transaction id sequence.
    pub fn open<P: AsRef<Path>>(path: P, clock: ClockRef) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let last_transaction_id = {
            let meta = cf(&db, CF_META)?;
            match db.get_cf(&meta, LAST_TRANSACTION_ID)? {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => 0,
            }
        };

        Ok(Self {
            db: Arc::new(db),
            clock,
            unit_lock: Arc::new(Mutex::new(())),
            pending: Arc::new(Mutex::new(None)),
            unit_counter: Arc::new(AtomicU64::new(1)),
            last_transaction_id: Arc::new(AtomicU64::new(last_transaction_id)),
        })
    }

    /// Loads an account fixture, replacing any account with the same number.
    pub fn insert_account(&self, account: &Account) -> Result<(), StorageError> {
        let accounts = cf(&self.db, CF_ACCOUNTS)?;
        self.db.put_cf(
            &accounts,
            account_key(account.account_number),
            serde_json::to_vec(account)?,
        )?;
        Ok(())
    }

    fn read_account(&self, account_number: AccountNumber) -> Result<Option<Account>, StorageError> {
        let accounts = cf(&self.db, CF_ACCOUNTS)?;
        match self.db.get_cf(&accounts, account_key(account_number))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_history(&self, account_number: AccountNumber) -> Result<Vec<TransactionRecord>, StorageError> {
        let transactions = cf(&self.db, CF_TRANSACTIONS)?;
        let prefix = account_key(account_number);
        let mut records = Vec::new();

        let iter = self.db.iterator_cf(
            transactions,
            IteratorMode::From(&prefix, Direction::Forward),
        );
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(serde_json::from_slice(&value)?);
        }

        Ok(records)
    }

    fn write_transaction(&self, batch: &mut WriteBatch, record: &TransactionRecord) -> Result<(), StorageError> {
        let transactions = cf(&self.db, CF_TRANSACTIONS)?;
        batch.put_cf(
            &transactions,
            transaction_key(record.account_number, record.id),
            serde_json::to_vec(record)?,
        );
        Ok(())
    }

    fn write_sequence(&self, batch: &mut WriteBatch) -> Result<(), StorageError> {
        let meta = cf(&self.db, CF_META)?;
        let last = self.last_transaction_id.load(Ordering::SeqCst);
        batch.put_cf(&meta, LAST_TRANSACTION_ID, serde_json::to_vec(&last)?);
        Ok(())
    }
}

fn staged_for<'a>(
    pending: &'a mut Option<PendingUnit>,
    unit: &Unit,
) -> Result<&'a mut PendingUnit, StorageError> {
    pending
        .as_mut()
        .filter(|staged| staged.id == unit.id())
        .ok_or(StorageError::NoActiveUnit(unit.id()))
}

fn cf<'a>(db: &'a DB, name: &str) -> Result<&'a rocksdb::ColumnFamily, StorageError> {
    db.cf_handle(name)
        .ok_or_else(|| StorageError::Backend(format!("{name} column family not found")))
}

#[async_trait]
impl AccountStore for RocksDbStore {
    async fn get_account(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
    ) -> Result<Option<Account>, StorageError> {
        let mut pending = self.pending.lock().await;
        let staged = staged_for(&mut pending, unit)?;
        match staged.accounts.get(&account_number) {
            Some(account) => Ok(Some(account.clone())),
            None => self.read_account(account_number),
        }
    }

    async fn update_balance(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        new_amount: Decimal,
    ) -> Result<u64, StorageError> {
        let mut pending = self.pending.lock().await;
        let staged = staged_for(&mut pending, unit)?;
        let current = match staged.accounts.get(&account_number) {
            Some(account) => Some(account.clone()),
            None => self.read_account(account_number)?,
        };
        let Some(mut account) = current else {
            return Ok(0);
        };
        account.amount = new_amount;
        staged.accounts.insert(account_number, account);
        Ok(1)
    }

    async fn all_accounts(&self, unit: &Unit) -> Result<Vec<Account>, StorageError> {
        let staged: Vec<Account> = {
            let mut pending = self.pending.lock().await;
            let staged = staged_for(&mut pending, unit)?;
            staged.accounts.values().cloned().collect()
        };

        let accounts = cf(&self.db, CF_ACCOUNTS)?;
        let mut merged = BTreeMap::new();
        for item in self.db.iterator_cf(accounts, IteratorMode::Start) {
            let (_key, value) = item?;
            let account: Account = serde_json::from_slice(&value)?;
            merged.insert(account.account_number, account);
        }
        merged.extend(staged.into_iter().map(|a| (a.account_number, a)));

        Ok(merged.into_values().collect())
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn insert_transaction(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<u64, StorageError> {
        let mut pending = self.pending.lock().await;
        let staged = staged_for(&mut pending, unit)?;
        staged.transactions.push(TransactionRecord {
            id: self.last_transaction_id.fetch_add(1, Ordering::SeqCst) + 1,
            account_number,
            transaction_type,
            amount,
            ts: self.clock.now(),
        });
        Ok(1)
    }

    async fn query_transactions(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        transaction_type: TransactionType,
        day: DayRange,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let mut pending = self.pending.lock().await;
        let staged = staged_for(&mut pending, unit)?;
        let mut records = self.read_history(account_number)?;
        records.extend(
            staged
                .transactions
                .iter()
                .filter(|record| record.account_number == account_number)
                .cloned(),
        );
        records.retain(|record| {
            record.transaction_type == transaction_type && day.contains(record.ts)
        });
        Ok(records)
    }
}

#[async_trait]
impl UnitOfWork for RocksDbStore {
    async fn begin(&self) -> Result<Unit, StorageError> {
        let exclusive = self.unit_lock.clone().lock_owned().await;
        let id = self.unit_counter.fetch_add(1, Ordering::SeqCst);

        let abandoned = self.pending.lock().await.replace(PendingUnit {
            id,
            accounts: BTreeMap::new(),
            transactions: Vec::new(),
        });
        if let Some(abandoned) = abandoned {
            tracing::debug!(unit = abandoned.id, "Discarded writes of abandoned RocksDB unit");
        }
        tracing::debug!(unit = id, "RocksDB unit of work started");
        Ok(Unit::new(id, exclusive))
    }

    async fn commit(&self, unit: Unit) -> Result<(), StorageError> {
        let mut pending = self.pending.lock().await;
        let staged = match pending.take() {
            Some(staged) if staged.id == unit.id() => staged,
            other => {
                *pending = other;
                return Err(StorageError::NoActiveUnit(unit.id()));
            }
        };

        let accounts = cf(&self.db, CF_ACCOUNTS)?;
        let mut batch = WriteBatch::default();
        for account in staged.accounts.values() {
            batch.put_cf(
                &accounts,
                account_key(account.account_number),
                serde_json::to_vec(account)?,
            );
        }
        for record in &staged.transactions {
            self.write_transaction(&mut batch, record)?;
        }
        self.write_sequence(&mut batch)?;
        self.db.write(batch)?;

        tracing::debug!(unit = unit.id(), "RocksDB unit of work committed");
        Ok(())
    }

    async fn rollback(&self, unit: Unit) -> Result<(), StorageError> {
        let mut pending = self.pending.lock().await;
        match pending.take() {
            Some(staged) if staged.id == unit.id() => {
                tracing::debug!(
                    unit = unit.id(),
                    discarded_rows = staged.accounts.len() + staged.transactions.len(),
                    "RocksDB unit of work rolled back"
                );
                Ok(())
            }
            other => {
                *pending = other;
                Err(StorageError::NoActiveUnit(unit.id()))
            }
        }
    }
}
