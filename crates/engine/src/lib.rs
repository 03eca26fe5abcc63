//! Wallet analysis engine.
//!
//! Turns explorer data into activity and profit/loss reports. The
//! computations in `activity` and `pnl` are pure; `analyzer` fetches data
//! per chain family and `batch` fans a request out over many wallets.

pub mod activity;
pub mod analyzer;
pub mod batch;
pub mod pnl;
pub mod tokens;

pub use activity::*;
pub use analyzer::*;
pub use batch::*;
pub use pnl::*;
