use crate::domain::account::Account;
use crate::error::{AtmError, Result};
use std::io::Read;

/// Reads account fixtures with the headers
/// `account_number, name, amount, type, credit_limit`.
///
/// An empty `credit_limit` field means the account has none.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AtmError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_optional_credit_limit() {
        let data = "account_number, name, amount, type, credit_limit\n\
                    1, Alice, 500, checking,\n\
                    2, Bob, -50, credit, 200";
        let accounts: Vec<Account> = AccountReader::new(data.as_bytes())
            .accounts()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(
            accounts[0],
            Account::new(1, "Alice", dec!(500), AccountType::Checking)
        );
        assert_eq!(
            accounts[1],
            Account::new(2, "Bob", dec!(-50), AccountType::Credit).with_credit_limit(dec!(200))
        );
    }

    #[test]
    fn test_rejects_unknown_account_type() {
        let data = "account_number, name, amount, type, credit_limit\n1, Alice, 500, brokerage,";
        let result: Vec<Result<Account>> = AccountReader::new(data.as_bytes()).accounts().collect();
        assert!(result[0].is_err());
    }
}
