use crate::domain::account::AccountNumber;
use crate::domain::ports::UnitId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the transaction orchestrator and the CSV interfaces.
///
/// `ValidationFailed` is an expected outcome (a declined request); every other
/// variant is a fault. Persistence faults only describe the account and the
/// attempted amount in their message; the underlying store error stays
/// available through [`std::error::Error::source`] for logging.
#[derive(Error, Debug)]
pub enum AtmError {
    #[error("Account {account_number} not found")]
    AccountNotFound { account_number: AccountNumber },

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Balance update for account {account_number} affected no rows (attempted {amount})")]
    PersistenceConflict {
        account_number: AccountNumber,
        amount: Decimal,
    },

    #[error("Persistence failure for account {account_number} (attempted {amount})")]
    PersistenceError {
        account_number: AccountNumber,
        amount: Decimal,
        #[source]
        source: StorageError,
    },

    #[error("Storage failure while listing accounts")]
    AccountListing(#[source] StorageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AtmError {
    /// True when the request was declined by a business rule rather than
    /// failing for a system reason.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AtmError::ValidationFailed(_))
    }
}

/// Errors reported by store adapters through the domain ports.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no active unit of work with id {0}")]
    NoActiveUnit(UnitId),

    #[error("{operation} affected no rows")]
    NoRowsAffected { operation: &'static str },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::Backend(err.into_string())
    }
}

pub type Result<T, E = AtmError> = std::result::Result<T, E>;

/// Attaches the account and amount of the current operation to a store failure.
pub(crate) trait StorageResultExt<T> {
    fn for_request(self, account_number: AccountNumber, amount: Decimal) -> Result<T>;
}

impl<T> StorageResultExt<T> for std::result::Result<T, StorageError> {
    fn for_request(self, account_number: AccountNumber, amount: Decimal) -> Result<T> {
        self.map_err(|source| AtmError::PersistenceError {
            account_number,
            amount,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::error::Error as _;

    #[test]
    fn test_persistence_error_hides_store_payload() {
        let err = Err::<(), _>(StorageError::Backend("connection reset by peer".to_string()))
            .for_request(7, dec!(40))
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Persistence failure for account 7 (attempted 40)"
        );
        assert_eq!(
            err.source().unwrap().to_string(),
            "storage backend error: connection reset by peer"
        );
    }

    #[test]
    fn test_rejection_is_distinguishable() {
        assert!(AtmError::ValidationFailed("no".to_string()).is_rejection());
        assert!(!AtmError::AccountNotFound { account_number: 1 }.is_rejection());
        assert!(
            !AtmError::PersistenceConflict {
                account_number: 1,
                amount: dec!(5)
            }
            .is_rejection()
        );
    }
}
