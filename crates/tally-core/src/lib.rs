//! Shared building blocks for the tally bot: configuration, the top-level
//! error type and the id newtypes every other crate speaks in.

pub mod config;
pub mod error;
pub mod types;

pub use config::TallyConfig;
pub use error::{Result, TallyError};
pub use types::{ActorId, MessageId};
