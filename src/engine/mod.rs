//! Core engine: pair synchronization, stop conditions, balance
//! reconciliation, pair variation and the session loop that ties them
//! together.

pub mod balance;
pub mod pair_sync;
pub mod session;
pub mod stop;
pub mod variation;
