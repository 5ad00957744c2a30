use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tally_collector::HandlerFailure;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::context::BotContext;
use crate::handler::DiscordHandler;

/// Discord gateway adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process exits,
/// reconnecting whenever the gateway drops. Collectors live on the shared
/// [`BotContext`], so they survive a reconnect.
pub struct DiscordAdapter {
    app: Arc<BotContext>,
}

impl DiscordAdapter {
    pub fn new(app: Arc<BotContext>) -> Self {
        Self { app }
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns. If `failures_rx` is `Some`, the failure reporter is
    /// spawned once on the first client's REST handle.
    pub async fn run(self, failures_rx: Option<mpsc::UnboundedReceiver<HandlerFailure>>) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        let first_client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: initial connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        if let Some(rx) = failures_rx {
            let http = Arc::clone(&first_client.http);
            let channel = self.app.config.discord.error_channel_id;
            tokio::spawn(crate::report::run_failure_reporter(http, channel, rx));
        }

        let mut client = first_client;

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: reconnect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = DiscordHandler {
            app: Arc::clone(&self.app),
        };

        Client::builder(&self.app.config.discord.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
