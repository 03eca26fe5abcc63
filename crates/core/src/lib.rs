//! Core data types for the wallet analyzer bot.

pub mod address;
pub mod chain;
pub mod report;
pub mod transaction;

pub use address::*;
pub use chain::*;
pub use report::*;
pub use transaction::*;
