//! `tally-store`: SQLite persistence for collector results.
//!
//! Finalize handlers write here: the options of every poll when it opens, the
//! vote tally when it closes, and the flags a member confirmed in a prefix
//! selection.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::ResultStore;
pub use types::{OptionCount, PollRecord, PollResult, SelectionRecord};
