//! Domain model, business rules and the ports the rules depend on.

pub mod account;
pub mod clock;
pub mod ports;
pub mod transaction;
pub mod validation;
