//! Presentation adapters. They call only the `TransactionEngine` operations.

pub mod csv;
