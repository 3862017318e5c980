use crate::domain::account::{Account, AccountNumber};
use crate::domain::clock::{ClockRef, DayRange};
use crate::domain::ports::{AccountStoreBox, TransactionStoreBox, Unit, UnitOfWorkBox};
use crate::domain::transaction::{TransactionRecord, TransactionType};
use crate::domain::validation::TransactionLimits;
use crate::error::{AtmError, Result, StorageError, StorageResultExt};
use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;

/// Applies withdrawals and deposits to accounts.
///
/// Each request runs inside one unit of work: the account is loaded,
/// validated and written back, and the history row recorded, or nothing is
/// written at all. Rejections surface as [`AtmError::ValidationFailed`].
pub struct TransactionEngine {
    account_store: AccountStoreBox,
    transaction_store: TransactionStoreBox,
    unit_of_work: UnitOfWorkBox,
    clock: ClockRef,
    limits: TransactionLimits,
    utc_offset: FixedOffset,
}

impl TransactionEngine {
    /// Creates a new `TransactionEngine` with the default limits and a UTC
    /// calendar day.
    ///
    /// # Arguments
    ///
    /// * `account_store` - The store for accounts.
    /// * `transaction_store` - The store for transaction history.
    /// * `unit_of_work` - The atomic boundary shared by both stores.
    /// * `clock` - The source of "now" used to find today's withdrawals.
    pub fn new(
        account_store: AccountStoreBox,
        transaction_store: TransactionStoreBox,
        unit_of_work: UnitOfWorkBox,
        clock: ClockRef,
    ) -> Self {
        Self {
            account_store,
            transaction_store,
            unit_of_work,
            clock,
            limits: TransactionLimits::default(),
            utc_offset: Utc.fix(),
        }
    }

    pub fn with_limits(mut self, limits: TransactionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the offset at which the calendar day rolls over.
    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Withdraws `amount` from the account and records the withdrawal.
    pub async fn withdrawal(&self, account_number: AccountNumber, amount: Decimal) -> Result<Account> {
        let unit = self.begin(account_number, amount).await?;
        let outcome = self.apply_withdrawal(&unit, account_number, amount).await;
        let account = self.finish(unit, account_number, amount, outcome).await?;
        tracing::info!(
            account_number,
            %amount,
            balance = %account.amount,
            "Withdrawal committed"
        );
        Ok(account)
    }

    /// Deposits `amount` into the account. Deposits are not written to the
    /// transaction history.
    pub async fn deposit(&self, account_number: AccountNumber, amount: Decimal) -> Result<Account> {
        let unit = self.begin(account_number, amount).await?;
        let outcome = self.apply_deposit(&unit, account_number, amount).await;
        let account = self.finish(unit, account_number, amount, outcome).await?;
        tracing::info!(
            account_number,
            %amount,
            balance = %account.amount,
            "Deposit committed"
        );
        Ok(account)
    }

    /// Inserts one history row for the account in its own unit of work.
    pub async fn record_transaction(
        &self,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<()> {
        let unit = self.begin(account_number, amount).await?;
        let outcome = self
            .insert_record(&unit, account_number, amount, transaction_type)
            .await;
        self.finish(unit, account_number, amount, outcome).await
    }

    /// History rows of `transaction_type` stamped within the current calendar day.
    pub async fn get_current_day_transactions(
        &self,
        account_number: AccountNumber,
        transaction_type: TransactionType,
    ) -> Result<Vec<TransactionRecord>> {
        let unit = self.begin(account_number, Decimal::ZERO).await?;
        let outcome = self
            .current_day_transactions(&unit, account_number, transaction_type)
            .await
            .for_request(account_number, Decimal::ZERO);
        self.finish(unit, account_number, Decimal::ZERO, outcome).await
    }

    /// Every account known to the account store.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let unit = self
            .unit_of_work
            .begin()
            .await
            .map_err(AtmError::AccountListing)?;
        let listed = self.account_store.all_accounts(&unit).await;
        self.unit_of_work
            .commit(unit)
            .await
            .map_err(AtmError::AccountListing)?;

        let mut accounts = listed.map_err(AtmError::AccountListing)?;
        accounts.sort_by_key(|account| account.account_number);
        Ok(accounts)
    }

    async fn apply_withdrawal(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
    ) -> Result<Account> {
        let mut account = self.load_account(unit, account_number, amount).await?;
        let todays_withdrawals = self
            .current_day_transactions(unit, account_number, TransactionType::Withdrawal)
            .await
            .for_request(account_number, amount)?;

        let validation = self
            .limits
            .validate_withdrawal(amount, &account, &todays_withdrawals);
        if !validation.valid {
            return Err(AtmError::ValidationFailed(validation.msg));
        }

        account.withdraw(amount);
        self.store_balance(unit, &account, amount).await?;
        self.insert_record(unit, account_number, amount, TransactionType::Withdrawal)
            .await?;
        Ok(account)
    }

    async fn apply_deposit(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
    ) -> Result<Account> {
        let mut account = self.load_account(unit, account_number, amount).await?;

        let validation = self.limits.validate_deposit(amount, &account);
        if !validation.valid {
            return Err(AtmError::ValidationFailed(validation.msg));
        }

        account.deposit(amount);
        self.store_balance(unit, &account, amount).await?;
        Ok(account)
    }

    async fn insert_record(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
        transaction_type: TransactionType,
    ) -> Result<()> {
        let inserted = self
            .transaction_store
            .insert_transaction(unit, account_number, amount, transaction_type)
            .await
            .for_request(account_number, amount)?;

        if inserted == 0 {
            return Err::<(), _>(StorageError::NoRowsAffected {
                operation: "transaction insert",
            })
            .for_request(account_number, amount);
        }
        Ok(())
    }

    async fn current_day_transactions(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        transaction_type: TransactionType,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let today = DayRange::containing(self.clock.now(), self.utc_offset);
        self.transaction_store
            .query_transactions(unit, account_number, transaction_type, today)
            .await
    }

    async fn load_account(
        &self,
        unit: &Unit,
        account_number: AccountNumber,
        amount: Decimal,
    ) -> Result<Account> {
        self.account_store
            .get_account(unit, account_number)
            .await
            .for_request(account_number, amount)?
            .ok_or(AtmError::AccountNotFound { account_number })
    }

    async fn store_balance(&self, unit: &Unit, account: &Account, amount: Decimal) -> Result<()> {
        let updated = self
            .account_store
            .update_balance(unit, account.account_number, account.amount)
            .await
            .for_request(account.account_number, amount)?;

        if updated == 0 {
            return Err(AtmError::PersistenceConflict {
                account_number: account.account_number,
                amount,
            });
        }
        Ok(())
    }

    async fn begin(&self, account_number: AccountNumber, amount: Decimal) -> Result<Unit> {
        self.unit_of_work
            .begin()
            .await
            .for_request(account_number, amount)
    }

    /// Commits `unit` when `outcome` succeeded and rolls it back otherwise.
    ///
    /// A failed rollback is logged and the original error is returned. If the
    /// caller is cancelled before getting here, dropping the unit releases it
    /// and the store discards its writes.
    async fn finish<T>(
        &self,
        unit: Unit,
        account_number: AccountNumber,
        amount: Decimal,
        outcome: Result<T>,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.unit_of_work
                    .commit(unit)
                    .await
                    .for_request(account_number, amount)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.unit_of_work.rollback(unit).await {
                    tracing::error!(
                        account_number,
                        %amount,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                tracing::debug!(account_number, %amount, error = %err, "Unit of work rolled back");
                Err(err)
            }
        }
    }
}
