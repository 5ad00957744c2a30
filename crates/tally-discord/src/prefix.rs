//! `+prefix`: pick language flags by reacting, in order, and get them as a
//! nickname prefix (`[🇩🇪-🇫🇷] name`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::{CreateMessage, EditMember, EditMessage};
use serenity::http::Http;
use serenity::model::channel::{Message, ReactionType};
use serenity::model::id::{ChannelId, GuildId, MessageId as DiscordMessageId, UserId};
use serenity::prelude::Context;
use tally_collector::{
    start, CollectHandler, CollectorSpec, EndReason, Event, EventKind, FinalizeHandler,
    FinalizeSteps, Flow, HandlerError, SelectionSet,
};
use tally_core::config::LanguageRole;
use tally_core::{ActorId, MessageId};
use tracing::{info, warn};

use crate::context::BotContext;
use crate::embed;
use crate::error::Result;

pub const CONFIRM: &str = "\u{2705}";
const TITLE: &str = "Prefix";
const CHOSEN: &str = "Chosen flags";

/// Flags whose role prefix matches one of `role_names`, in table order.
pub fn flags_for_roles<S: AsRef<str>>(table: &[LanguageRole], role_names: &[S]) -> Vec<String> {
    table
        .iter()
        .filter(|lang| {
            role_names
                .iter()
                .any(|name| name.as_ref().starts_with(&lang.role_prefix))
        })
        .map(|lang| lang.emoji.clone())
        .collect()
}

pub fn nickname(joined: &str, username: &str) -> String {
    format!("[{joined}] {username}")
}

fn instructions(secs: u64, started: bool) -> String {
    let left = if started { "less than " } else { "" };
    format!(
        "React with all flags you want to add to your prefix in order. \
         You have {left}{secs} seconds{}. Hit {CONFIRM} to stop.",
        if started { " left" } else { "" }
    )
}

async fn member_role_names(ctx: &Context, guild_id: GuildId, user: UserId) -> Result<Vec<String>> {
    let member = guild_id.member(&ctx.http, user).await?;
    let roles = guild_id.roles(&ctx.http).await?;
    Ok(member
        .roles
        .iter()
        .filter_map(|id| roles.get(id).map(|r| r.name.clone()))
        .collect())
}

pub async fn run(app: &Arc<BotContext>, ctx: &Context, msg: &Message, guild_id: GuildId) -> Result<()> {
    let tag = msg.author.tag();
    let working = embed::status(embed::WORKING, TITLE, "One second... ", &tag);
    let sent = msg
        .channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(working))
        .await?;

    let role_names = member_role_names(ctx, guild_id, msg.author.id).await?;
    let flags = flags_for_roles(&app.config.language_roles, &role_names);

    if flags.is_empty() {
        let e = embed::status(
            embed::ERROR,
            TITLE,
            "You don't seem to have any language roles! Please contact a staff member if you think this is in error.",
            &tag,
        );
        msg.channel_id
            .edit_message(&ctx.http, sent.id, EditMessage::new().embed(e))
            .await?;
        return Ok(());
    }

    for flag in flags.iter().map(String::as_str).chain([CONFIRM]) {
        if let Err(e) = sent
            .react(&ctx.http, ReactionType::Unicode(flag.to_string()))
            .await
        {
            warn!(flag, error = %e, "could not add prefix reaction");
        }
    }

    let secs = app.config.collectors.prefix_timeout_secs;
    let prompt = embed::status(embed::NEUTRAL, TITLE, &instructions(secs, false), &tag)
        .field(CHOSEN, embed::code_or_none(""), false);
    msg.channel_id
        .edit_message(&ctx.http, sent.id, EditMessage::new().embed(prompt))
        .await?;

    let author = ActorId(msg.author.id.get());
    let allowed = flags.clone();
    let spec = CollectorSpec::new(MessageId(sent.id.get()))
        .filter(move |e: &Event| {
            e.actor_id == author
                && e.kind == EventKind::ReactionAdd
                && (e.payload == CONFIRM || allowed.contains(&e.payload))
        })
        .absolute_timeout(Duration::from_secs(secs))
        .report_failures_to(app.failures.clone());

    let target = Target {
        http: Arc::clone(&ctx.http),
        channel_id: msg.channel_id,
        message_id: sent.id,
        tag,
    };
    let finish = ApplyPrefix {
        app: Arc::clone(app),
        target: target.clone(),
        guild_id,
        user_id: msg.author.id,
        username: msg.author.name.clone(),
    };
    start(
        &app.hub,
        spec,
        SelectionSet::new(CONFIRM),
        ShowChosen { target, secs },
        finish,
    )?;
    Ok(())
}

/// The prompt message and who it was for.
#[derive(Clone)]
struct Target {
    http: Arc<Http>,
    channel_id: ChannelId,
    message_id: DiscordMessageId,
    tag: String,
}

impl Target {
    async fn edit(
        &self,
        colour: u32,
        description: &str,
        chosen: Option<&str>,
    ) -> std::result::Result<(), serenity::Error> {
        let mut e = embed::status(colour, TITLE, description, &self.tag);
        if let Some(chosen) = chosen {
            e = e.field(CHOSEN, embed::code_or_none(chosen), false);
        }
        self.channel_id
            .edit_message(&self.http, self.message_id, EditMessage::new().embed(e))
            .await
            .map(|_| ())
    }
}

struct ShowChosen {
    target: Target,
    secs: u64,
}

#[async_trait]
impl CollectHandler<SelectionSet> for ShowChosen {
    async fn on_collect(
        &mut self,
        event: &Event,
        chosen: &mut SelectionSet,
    ) -> std::result::Result<Flow, HandlerError> {
        let before = chosen.len();
        let flow = chosen.apply(event);
        if flow == Flow::Continue && chosen.len() != before {
            self.target
                .edit(embed::NEUTRAL, &instructions(self.secs, true), Some(&chosen.joined()))
                .await
                .map_err(HandlerError::other)?;
        }
        Ok(flow)
    }
}

/// How a finished selection ends up for the member.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PrefixOutcome {
    NothingChosen,
    Applied,
    RenameFailed(String),
}

impl PrefixOutcome {
    /// Any confirmed flags are recorded, even when Discord refused the rename.
    fn persists(&self) -> bool {
        !matches!(self, PrefixOutcome::NothingChosen)
    }

    fn colour(&self) -> u32 {
        match self {
            PrefixOutcome::Applied => embed::SUCCESS,
            _ => embed::ERROR,
        }
    }

    fn description(&self, joined: &str) -> String {
        match self {
            PrefixOutcome::NothingChosen => {
                "You didn't react to any flags, so your prefix wasn't saved.".to_string()
            }
            PrefixOutcome::Applied => "Your prefix has been saved!".to_string(),
            PrefixOutcome::RenameFailed(reason) => {
                format!("Failed to change nickname to {joined}.\n\nReason:\n> {reason}")
            }
        }
    }
}

struct ApplyPrefix {
    app: Arc<BotContext>,
    target: Target,
    guild_id: GuildId,
    user_id: UserId,
    username: String,
}

#[async_trait]
impl FinalizeHandler<String> for ApplyPrefix {
    async fn on_end(&mut self, joined: String, reason: EndReason) -> std::result::Result<(), HandlerError> {
        let message_id = MessageId(self.target.message_id.get());
        let mut steps = FinalizeSteps::new(message_id);
        let target = &self.target;

        steps
            .run(
                "remove reactions",
                target.channel_id.delete_reactions(&target.http, target.message_id),
            )
            .await;

        let outcome = if joined.is_empty() {
            PrefixOutcome::NothingChosen
        } else {
            let nick = nickname(&joined, &self.username);
            let renamed = self
                .guild_id
                .edit_member(&target.http, self.user_id, EditMember::new().nickname(nick))
                .await;
            match renamed {
                Ok(_) => PrefixOutcome::Applied,
                Err(e) => {
                    steps.record("set nickname", &e);
                    PrefixOutcome::RenameFailed(e.to_string())
                }
            }
        };

        if outcome.persists() {
            let store = &self.app.store;
            let actor = ActorId(self.user_id.get());
            steps
                .run("persist selection", async {
                    store.save_selection(message_id, actor, &joined, reason.as_str())
                })
                .await;
        }

        steps
            .run(
                "edit prompt",
                target.edit(outcome.colour(), &outcome.description(&joined), Some(&joined)),
            )
            .await;
        if outcome == PrefixOutcome::Applied {
            info!(message_id = %message_id, user = %self.user_id, prefix = %joined, "prefix applied");
        }
        steps.finish()
    }
}
