//! Discord front end of the tally bot.
//!
//! The gateway handler turns reactions and button clicks into collector
//! events on the shared [`EventHub`](tally_collector::EventHub); the command
//! modules (`poll`, `prefix`, `history`) start collectors on the messages
//! they send.

pub mod adapter;
pub mod commands;
pub mod context;
pub mod embed;
pub mod error;
pub mod handler;
pub mod history;
pub mod mojang;
pub mod poll;
pub mod prefix;
pub mod report;

pub use adapter::DiscordAdapter;
pub use context::BotContext;
pub use error::DiscordError;
