//! Withdrawal and deposit rules.
//!
//! Every check here is a pure function of its inputs. Rules are evaluated in a
//! fixed order and the first failing rule decides the message.

use super::account::{Account, AccountType};
use super::transaction::TransactionRecord;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

pub const OK: &str = "ok";

/// Outcome of a rule check. `msg` is `"ok"` when `valid` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub msg: String,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            msg: OK.to_string(),
        }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self {
            valid: false,
            msg: msg.into(),
        }
    }
}

/// Caps applied to ATM requests.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransactionLimits {
    pub max_withdrawal: Decimal,
    pub withdrawal_increment: Decimal,
    pub daily_withdrawal_count: usize,
    pub max_deposit: Decimal,
}

impl Default for TransactionLimits {
    fn default() -> Self {
        Self {
            max_withdrawal: dec!(200),
            withdrawal_increment: dec!(5),
            daily_withdrawal_count: 4,
            max_deposit: dec!(1000),
        }
    }
}

impl TransactionLimits {
    /// Names the first limit that cannot be enforced, if any.
    pub fn invalid_limit(&self) -> Option<&'static str> {
        if self.max_withdrawal <= Decimal::ZERO {
            Some("max_withdrawal must be positive")
        } else if self.withdrawal_increment <= Decimal::ZERO {
            Some("withdrawal_increment must be positive")
        } else if self.max_deposit <= Decimal::ZERO {
            Some("max_deposit must be positive")
        } else {
            None
        }
    }

    /// Decides whether `amount` may be withdrawn from `account`, given the
    /// withdrawals already recorded for it today.
    pub fn validate_withdrawal(
        &self,
        amount: Decimal,
        account: &Account,
        todays_withdrawals: &[TransactionRecord],
    ) -> Validation {
        if amount > self.max_withdrawal {
            return Validation::rejected(format!(
                "Withdrawals are limited to ${} per transaction.",
                self.max_withdrawal
            ));
        }

        let on_increment = amount
            .checked_rem(self.withdrawal_increment)
            .is_some_and(|remainder| remainder.is_zero());
        if amount < Decimal::ONE || !on_increment {
            return Validation::rejected(format!(
                "This ATM can only accept withdrawals in ${} increments.",
                self.withdrawal_increment
            ));
        }

        if todays_withdrawals.len() >= self.daily_withdrawal_count {
            return Validation::rejected(format!(
                "This account only allows {} withdrawals a day.",
                self.daily_withdrawal_count
            ));
        }

        match account.r#type {
            AccountType::Checking | AccountType::Savings if amount > account.amount => {
                Validation::rejected(format!(
                    "Transaction exceeds available account balance of {}.",
                    account.amount
                ))
            }
            AccountType::Credit => {
                let available = account.available_credit();
                if amount > account.amount && amount > available {
                    Validation::rejected(format!(
                        "Transaction exceeds current available credit of {available}."
                    ))
                } else {
                    Validation::ok()
                }
            }
            _ => Validation::ok(),
        }
    }

    /// Decides whether `amount` may be deposited into `account`.
    pub fn validate_deposit(&self, amount: Decimal, account: &Account) -> Validation {
        if amount > self.max_deposit {
            return Validation::rejected(format!(
                "Account deposits are capped at ${} per transaction.",
                self.max_deposit
            ));
        }

        let resulting = amount + account.amount;
        if account.is_credit() && resulting > Decimal::ZERO {
            return Validation::rejected(format!(
                "ATM will only accept deposits at or below current negative balance of credit account. Current deposit exceeds that limit by {resulting}."
            ));
        }

        Validation::ok()
    }
}

/// [`TransactionLimits::validate_withdrawal`] with the default limits.
pub fn validate_withdrawal(
    amount: Decimal,
    account: &Account,
    todays_withdrawals: &[TransactionRecord],
) -> Validation {
    TransactionLimits::default().validate_withdrawal(amount, account, todays_withdrawals)
}

/// [`TransactionLimits::validate_deposit`] with the default limits.
pub fn validate_deposit(amount: Decimal, account: &Account) -> Validation {
    TransactionLimits::default().validate_deposit(amount, account)
}
