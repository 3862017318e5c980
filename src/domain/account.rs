use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type AccountNumber = u64;

/// Determines which balance rules apply to an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
        };
        f.write_str(name)
    }
}

/// A bank account as held by the account store.
///
/// `amount` is the signed balance. Only `Credit` accounts may hold a negative
/// balance, down to `-credit_limit`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub account_number: AccountNumber,
    pub name: String,
    pub amount: Decimal,
    pub r#type: AccountType,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
}

impl Account {
    pub fn new(
        account_number: AccountNumber,
        name: impl Into<String>,
        amount: Decimal,
        r#type: AccountType,
    ) -> Self {
        Self {
            account_number,
            name: name.into(),
            amount,
            r#type,
            credit_limit: None,
        }
    }

    pub fn with_credit_limit(mut self, credit_limit: Decimal) -> Self {
        self.credit_limit = Some(credit_limit);
        self
    }

    /// Balance plus credit line. An absent limit counts as zero.
    pub fn available_credit(&self) -> Decimal {
        self.amount + self.credit_limit.unwrap_or(Decimal::ZERO)
    }

    pub fn is_credit(&self) -> bool {
        self.r#type == AccountType::Credit
    }

    /// Removes funds from the balance. Callers validate first.
    pub fn withdraw(&mut self, amount: Decimal) {
        self.amount -= amount;
    }

    /// Adds funds to the balance. Callers validate first.
    pub fn deposit(&mut self, amount: Decimal) {
        self.amount += amount;
    }
}
