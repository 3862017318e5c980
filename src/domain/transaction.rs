use super::account::AccountNumber;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Withdrawal,
    Deposit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Withdrawal => f.write_str("withdrawal"),
            TransactionType::Deposit => f.write_str("deposit"),
        }
    }
}

/// One row of transaction history.
///
/// `id` and `ts` are assigned by the store at insert time. `amount` is always
/// the positive magnitude; the direction comes from `transaction_type`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_number: AccountNumber,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub ts: DateTime<Utc>,
}

/// A withdrawal or deposit requested by a caller, as read from the CLI input.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct TransactionRequest {
    pub r#type: TransactionType,
    pub account: AccountNumber,
    pub amount: Decimal,
}
