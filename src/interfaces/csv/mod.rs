pub mod account_reader;
pub mod account_writer;
pub mod transaction_reader;
