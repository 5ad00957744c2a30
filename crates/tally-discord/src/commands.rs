//! Command routing: `+poll` and `+prefix` message commands, `/history` slash
//! command.
//!
//! Registration happens in `ready()` when `discord.slash_commands` is true.
//! Each command runs in its own task so the gateway handler never blocks on
//! Discord round trips.

use std::sync::Arc;

use serenity::builder::{CreateCommand, CreateCommandOption, CreateMessage};
use serenity::model::application::{CommandInteraction, CommandOptionType};
use serenity::model::channel::Message;
use serenity::model::id::GuildId;
use serenity::prelude::Context;
use tracing::{debug, info, warn};

use crate::context::BotContext;
use crate::embed;

/// Message commands the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCommand {
    Poll,
    Prefix,
}

impl MessageCommand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "poll" => Some(Self::Poll),
            "prefix" | "langprefix" | "languageprefix" => Some(Self::Prefix),
            _ => None,
        }
    }
}

/// Split `+name rest...` into the command name and its raw argument text.
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = &body[..name_end];
    if name.is_empty() {
        return None;
    }
    Some((name, body[name_end..].trim_start()))
}

pub async fn dispatch_message(app: &Arc<BotContext>, ctx: Context, msg: Message) {
    let prefix = app.config.discord.command_prefix.as_str();
    let Some((name, args)) = parse_command(&msg.content, prefix) else {
        return;
    };
    let Some(command) = MessageCommand::from_name(name) else {
        return;
    };
    let args = args.to_string();
    info!(command = ?command, author = %msg.author.id, "message command");

    let app = Arc::clone(app);
    tokio::spawn(async move {
        let result = match command {
            MessageCommand::Poll => crate::poll::run(&app, &ctx, &msg, &args).await,
            MessageCommand::Prefix => match msg.guild_id {
                Some(guild_id) => crate::prefix::run(&app, &ctx, &msg, guild_id).await,
                None => {
                    reply_error(&ctx, &msg, "Prefix", "This command can only be used in a server.")
                        .await;
                    Ok(())
                }
            },
        };
        if let Err(e) = result {
            warn!(command = ?command, error = %e, "message command failed");
        }
    });
}

async fn reply_error(ctx: &Context, msg: &Message, title: &str, text: &str) {
    let e = embed::status(embed::ERROR, title, text, &msg.author.tag());
    if let Err(e) = msg
        .channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(e))
        .await
    {
        warn!(channel_id = %msg.channel_id, error = %e, "could not send error reply");
    }
}

/// Register slash commands. Call from `ready()`.
pub async fn register_commands(ctx: &Context, guild_id: Option<GuildId>) {
    let commands = vec![CreateCommand::new("history")
        .description("Shows a Minecraft player's name history")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "username",
                "The IGN or UUID of the player",
            )
            .required(false),
        )];

    match guild_id {
        Some(gid) => match gid.set_commands(&ctx.http, commands).await {
            Ok(cmds) => info!(guild = %gid, count = cmds.len(), "registered guild slash commands"),
            Err(e) => warn!(guild = %gid, error = %e, "failed to register guild commands"),
        },
        None => {
            match serenity::model::application::Command::set_global_commands(&ctx.http, commands)
                .await
            {
                Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
                Err(e) => warn!(error = %e, "failed to register global slash commands"),
            }
        }
    }
}

/// Dispatch a slash command interaction.
pub async fn handle_interaction(app: &Arc<BotContext>, ctx: &Context, command: CommandInteraction) {
    let name = command.data.name.clone();
    match name.as_str() {
        "history" => {
            let username = command
                .data
                .options
                .iter()
                .find(|o| o.name == "username")
                .and_then(|o| o.value.as_str())
                .map(str::to_string);
            let app = Arc::clone(app);
            let http = Arc::clone(&ctx.http);
            tokio::spawn(async move {
                if let Err(e) = crate::history::run(&app, http, command, username).await {
                    warn!(error = %e, "/history failed");
                }
            });
        }
        other => debug!(command = %other, "unknown slash command"),
    }
}
