use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Discord error: {0}")]
    Discord(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    /// Short error code string used in operator reports.
    pub fn code(&self) -> &'static str {
        match self {
            TallyError::Config(_) => "CONFIG_ERROR",
            TallyError::Database(_) => "DATABASE_ERROR",
            TallyError::Discord(_) => "DISCORD_ERROR",
            TallyError::Lookup(_) => "LOOKUP_ERROR",
            TallyError::Serialization(_) => "SERIALIZATION_ERROR",
            TallyError::Io(_) => "IO_ERROR",
            TallyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
