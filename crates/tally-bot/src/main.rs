use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tally_core::TallyConfig;
use tally_discord::{BotContext, DiscordAdapter, DiscordError};
use tally_store::ResultStore;
use tracing::{info, warn};

/// Discord bot for polls, prefix selection and paginated lookups.
#[derive(Debug, Parser)]
#[command(name = "tally-bot", version)]
struct Cli {
    /// Config file. Falls back to TALLY_CONFIG, then ~/.tally/tally.toml.
    #[arg(long, short)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tally_bot=info,tally_discord=info,tally_collector=info".into()
            }),
        )
        .init();

    // load config: --config > TALLY_CONFIG env > ~/.tally/tally.toml
    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("TALLY_CONFIG").ok());
    let config = TallyConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        TallyConfig::default()
    });

    if config.discord.bot_token.trim().is_empty() {
        return Err(DiscordError::NoToken.into());
    }

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=3000;")?;
    let store = ResultStore::new(db)?;
    info!("database migrations complete");

    let (failures_tx, failures_rx) = tokio::sync::mpsc::unbounded_channel();
    let app = Arc::new(BotContext::new(config, store, failures_tx)?);

    info!(
        prefix = %app.config.discord.command_prefix,
        slash_commands = app.config.discord.slash_commands,
        "starting Discord adapter"
    );
    DiscordAdapter::new(app).run(Some(failures_rx)).await;
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create database directory");
            }
        }
    }
}
