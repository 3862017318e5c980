use crate::domain::transaction::TransactionRequest;
use crate::error::{AtmError, Result};
use std::io::Read;

/// Reads withdrawal and deposit requests from a CSV source.
///
/// Expects the headers `type, account, amount`. Whitespace around fields is
/// trimmed and a bad row yields an `Err` without ending the stream.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    /// Creates a new `TransactionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<TransactionRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AtmError::from))
    }
}
