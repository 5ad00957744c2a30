use tally_collector::CollectorError;
use tally_store::StoreError;

/// Errors produced by the Discord adapter and its commands.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("no bot token configured")]
    NoToken,

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("collector error: {0}")]
    Collector(#[from] CollectorError),

    #[error("{0}")]
    InvalidArgs(String),
}

impl From<reqwest::Error> for DiscordError {
    fn from(e: reqwest::Error) -> Self {
        DiscordError::Lookup(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiscordError>;
