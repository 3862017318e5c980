use crate::domain::account::{Account, AccountNumber};
use crate::domain::clock::{ClockRef, DayRange, SystemClock};
use crate::domain::ports::{AccountStore, TransactionStore, Unit, UnitId, UnitOfWork};
use crate::domain::transaction::{TransactionId, TransactionRecord, TransactionType};
use crate::error::StorageError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct State {
    accounts: BTreeMap<AccountNumber, Account>,
    transactions: Vec<TransactionRecord>,
    last_transaction_id: TransactionId,
}

/// Writes made by the open unit. Nothing reaches `State` until commit.
struct Staged {
    unit: UnitId,
    balances: BTreeMap<AccountNumber, Decimal>,
    transactions: Vec<TransactionRecord>,
}

impl Staged {
    fn apply_to(&self, mut account: Account) -> Account {
        if let Some(amount) = self.balances.get(&account.account_number) {
            account.amount = *amount;
        }
        account
    }
}

fn staged_for<'a>(
    staged: &'a mut Option<Staged>,
    unit: &Unit,
) -> Result<&'a mut Staged, StorageError> {
    staged
        .as_mut()
        .filter(|staged| staged.unit == unit.id())
        .ok_or(StorageError::NoActiveUnit(unit.id()))
}

struct Inner {
    state: RwLock<State>,
    staged: Mutex<Option<Staged>>,
    clock: ClockRef,
    unit_lock: Arc<Mutex<()>>,
    unit_counter: AtomicU64,
}

/// A thread-safe in-memory store backing accounts, transaction history and
/// units of work at once.
///
/// Clones share the same data, so one instance can be boxed behind every port
/// the engine needs. Units are serialized by an exclusive lock. A unit's
/// writes are staged and only merged into the committed state on commit.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store that stamps history rows with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: ClockRef) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                staged: Mutex::new(None),
                clock,
                unit_lock: Arc::new(Mutex::new(())),
                unit_counter: AtomicU64::new(1),
            }),
        }
    }

    /// Loads an account fixture, replacing any account with the same number.
    pub async fn insert_account(&self, account: Account) {
        let mut state = self.inner.state.write().await;
        state.accounts.insert(account.account_number, account);
    }

    /// The committed state of an account.
    pub async fn account(&self, account_number: AccountNumber) -> Option<Account> {
        let state = self.inner.state.read().await;
        state.accounts.get(&account_number).cloned()
    }

    /// Every committed history row for `account_number`, oldest first.
    pub async fn history(&self, account_number: AccountNumber) -> Vec<TransactionRecord> {
        let state = self.inner.state.read().await;
        state
            .transactions
            .iter()
            .filter(|record| record.account_number == account_number)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
    ) -> Result<Option<Account>, StorageError> {
        let mut staged = self.inner.staged.lock().await;
        let staged = staged_for(&mut staged, unit)?;
        let state = self.inner.state.read().await;
        Ok(state
            .accounts
            .get(&account_number)
            .cloned()
            .map(|account| staged.apply_to(account)))
    }

    async fn update_balance(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        new_amount: Decimal,
    ) -> Result<u64, StorageError> {
        let mut staged = self.inner.staged.lock().await;
        let staged = staged_for(&mut staged, unit)?;
        if !self.inner.state.read().await.accounts.contains_key(&account_number) {
            return Ok(0);
        }
        staged.balances.insert(account_number, new_amount);
        Ok(1)
    }

    async fn all_accounts(&self, unit: &Unit) -> Result<Vec<Account>, StorageError> {
        let mut staged = self.inner.staged.lock().await;
        let staged = staged_for(&mut staged, unit)?;
        let state = self.inner.state.read().await;
        Ok(state
            .accounts
            .values()
            .cloned()
            .map(|account| staged.apply_to(account))
            .collect())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn insert_transaction(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<u64, StorageError> {
        let ts = self.inner.clock.now();
        let mut staged = self.inner.staged.lock().await;
        let staged = staged_for(&mut staged, unit)?;
        let last_committed = self.inner.state.read().await.last_transaction_id;
        let id = last_committed + staged.transactions.len() as TransactionId + 1;
        staged.transactions.push(TransactionRecord {
            id,
            account_number,
            transaction_type,
            amount,
            ts,
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
        let mut staged = self.inner.staged.lock().await;
        let staged = staged_for(&mut staged, unit)?;
        let state = self.inner.state.read().await;
        Ok(state
            .transactions
            .iter()
            .chain(staged.transactions.iter())
            .filter(|record| {
                record.account_number == account_number
                    && record.transaction_type == transaction_type
                    && day.contains(record.ts)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Unit, StorageError> {
        let exclusive = self.inner.unit_lock.clone().lock_owned().await;
        let id = self.inner.unit_counter.fetch_add(1, Ordering::SeqCst);

        let abandoned = self.inner.staged.lock().await.replace(Staged {
            unit: id,
            balances: BTreeMap::new(),
            transactions: Vec::new(),
        });
        if let Some(abandoned) = abandoned {
            tracing::debug!(unit = abandoned.unit, "Discarded writes of abandoned unit of work");
        }
        tracing::debug!(unit = id, "Unit of work started");
        Ok(Unit::new(id, exclusive))
    }

    async fn commit(&self, unit: Unit) -> Result<(), StorageError> {
        let mut slot = self.inner.staged.lock().await;
        let staged = match slot.take() {
            Some(staged) if staged.unit == unit.id() => staged,
            other => {
                *slot = other;
                return Err(StorageError::NoActiveUnit(unit.id()));
            }
        };

        let mut state = self.inner.state.write().await;
        for (account_number, amount) in staged.balances {
            if let Some(account) = state.accounts.get_mut(&account_number) {
                account.amount = amount;
            }
        }
        if let Some(last) = staged.transactions.last() {
            state.last_transaction_id = last.id;
        }
        state.transactions.extend(staged.transactions);

        tracing::debug!(unit = unit.id(), "Unit of work committed");
        Ok(())
    }

    async fn rollback(&self, unit: Unit) -> Result<(), StorageError> {
        let mut slot = self.inner.staged.lock().await;
        match slot.take() {
            Some(staged) if staged.unit == unit.id() => {
                tracing::debug!(
                    unit = unit.id(),
                    discarded_rows = staged.balances.len() + staged.transactions.len(),
                    "Unit of work rolled back"
                );
                Ok(())
            }
            other => {
                *slot = other;
                Err(StorageError::NoActiveUnit(unit.id()))
            }
        }
    }
}
