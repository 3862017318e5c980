//! Application layer orchestrating the domain rules against the stores.
//!
//! `TransactionEngine` is the entry point for withdrawals and deposits. It
//! owns the store ports and wraps every request in a unit of work.

pub mod engine;
