//! `+poll <role|none>/<question>/<emoji>-<text>/<emoji>-<text>[/...]`
//!
//! Posts the poll, reacts with every option and records it. When
//! `collectors.poll_duration_secs` is set, a collector counts the votes and
//! closes the poll with the results once the duration is over.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage};
use serenity::http::Http;
use serenity::model::channel::{Message, ReactionType};
use serenity::model::id::{ChannelId, MessageId as DiscordMessageId};
use serenity::prelude::Context;
use tally_collector::{
    start, Accumulator, CollectHandler, CollectorSpec, EndReason, Event, EventKind,
    FinalizeHandler, FinalizeSteps, Flow, HandlerError,
};
use tally_core::{ActorId, MessageId};
use tally_store::OptionCount;
use tracing::{info, warn};

use crate::context::BotContext;
use crate::embed;
use crate::error::{DiscordError, Result};
use crate::handler::emoji_key;

pub const USAGE: &str =
    "poll <role to ping|none>/<question>/<a1 emoji>-<a1 text>/<a2 emoji>-<a2 text>[/...-...]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    /// As typed, whitespace removed.
    pub emoji: String,
    pub text: String,
}

impl PollOption {
    pub fn reaction(&self) -> Result<ReactionType> {
        ReactionType::try_from(self.emoji.as_str())
            .map_err(|_| DiscordError::InvalidArgs(format!("`{}` is not an emoji", self.emoji)))
    }

    /// The key reactions on this option arrive under.
    pub fn key(&self) -> String {
        self.reaction()
            .map(|r| emoji_key(&r))
            .unwrap_or_else(|_| self.emoji.clone())
    }

    pub fn heading(&self) -> String {
        format!("{} \u{2014} {}", self.emoji, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollArgs {
    /// Role mention to ping, `None` for `none`.
    pub ping: Option<String>,
    pub question: String,
    pub options: Vec<PollOption>,
}

pub fn parse_args(args: &str) -> Result<PollArgs> {
    let mut parts = args.split('/');
    let ping = parts.next().map(str::trim).unwrap_or_default();
    let question = parts.next().map(str::trim).unwrap_or_default();
    if ping.is_empty() || question.is_empty() {
        return Err(DiscordError::InvalidArgs(format!("Usage: `{USAGE}`")));
    }

    let options = parts
        .filter(|p| !p.trim().is_empty())
        .map(|part| {
            let (emoji, text) = part.split_once('-').ok_or_else(|| {
                DiscordError::InvalidArgs(format!(
                    "Option `{}` must look like `<emoji>-<text>`.",
                    part.trim()
                ))
            })?;
            let emoji: String = emoji.chars().filter(|c| !c.is_whitespace()).collect();
            if emoji.is_empty() {
                return Err(DiscordError::InvalidArgs(format!(
                    "Option `{}` has no emoji.",
                    part.trim()
                )));
            }
            Ok(PollOption {
                emoji,
                text: text.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if options.len() < 2 {
        return Err(DiscordError::InvalidArgs(
            "A poll needs at least two options.".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = options.iter().find(|o| !seen.insert(o.key())) {
        return Err(DiscordError::InvalidArgs(format!(
            "`{}` is used for more than one option.",
            dup.emoji
        )));
    }

    Ok(PollArgs {
        ping: (!ping.eq_ignore_ascii_case("none")).then(|| ping.to_string()),
        question: question.to_string(),
        options,
    })
}

/// Voters per option, in option order. One actor may back several options.
#[derive(Debug, Clone)]
pub struct VoteTally {
    keys: Vec<String>,
    voters: Vec<BTreeSet<ActorId>>,
}

impl VoteTally {
    pub fn new(keys: Vec<String>) -> Self {
        let voters = vec![BTreeSet::new(); keys.len()];
        Self { keys, voters }
    }

    pub fn apply(&mut self, event: &Event) {
        let Some(i) = self.keys.iter().position(|k| *k == event.payload) else {
            return;
        };
        match event.kind {
            EventKind::ReactionAdd => {
                self.voters[i].insert(event.actor_id);
            }
            EventKind::ReactionRemove => {
                self.voters[i].remove(&event.actor_id);
            }
            EventKind::ButtonClick => {}
        }
    }

    pub fn votes(&self, key: &str) -> usize {
        self.keys
            .iter()
            .position(|k| k == key)
            .map_or(0, |i| self.voters[i].len())
    }

    pub fn counts(&self) -> Vec<OptionCount> {
        self.keys
            .iter()
            .zip(&self.voters)
            .map(|(emoji, voters)| OptionCount {
                emoji: emoji.clone(),
                votes: voters.len() as u32,
            })
            .collect()
    }
}

impl Accumulator for VoteTally {
    type Output = Vec<OptionCount>;

    fn finish(self) -> Vec<OptionCount> {
        self.counts()
    }
}

fn vote_label(votes: u32) -> String {
    match votes {
        1 => "1 vote".to_string(),
        n => format!("{n} votes"),
    }
}

fn closed_description(persist_failed: bool) -> &'static str {
    if persist_failed {
        "This poll has ended. The results could not be saved."
    } else {
        "This poll has ended."
    }
}

fn poll_embed(
    colour: u32,
    question: &str,
    description: &str,
    footer: &str,
    fields: impl IntoIterator<Item = (String, String)>,
) -> CreateEmbed {
    let mut e = CreateEmbed::new()
        .colour(colour)
        .title(question)
        .description(description)
        .footer(CreateEmbedFooter::new(footer));
    for (name, value) in fields {
        e = e.field(name, value, false);
    }
    e
}

fn option_fields(options: &[PollOption]) -> Vec<(String, String)> {
    options
        .iter()
        .map(|o| (o.heading(), embed::BLANK.to_string()))
        .collect()
}

pub async fn run(app: &Arc<BotContext>, ctx: &Context, msg: &Message, args: &str) -> Result<()> {
    let tag = msg.author.tag();
    let args = match parse_args(args) {
        Ok(a) => a,
        Err(e) => {
            let e = embed::status(embed::ERROR, "Poll", &e.to_string(), &tag);
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(e))
                .await?;
            return Ok(());
        }
    };

    if let Err(e) = msg.delete(&ctx.http).await {
        warn!(error = %e, "could not delete poll invocation");
    }

    let footer = format!(
        "Poll created by {tag} | This message will update to reflect the poll's status."
    );
    let fields = option_fields(&args.options);
    let working = poll_embed(
        embed::WORKING,
        &args.question,
        "One second...",
        &footer,
        fields.clone(),
    );
    let mut create = CreateMessage::new().embed(working);
    if let Some(ping) = &args.ping {
        create = create.content(ping);
    }
    let sent = msg.channel_id.send_message(&ctx.http, create).await?;

    for option in &args.options {
        let reacted = match option.reaction() {
            Ok(r) => sent.react(&ctx.http, r).await.map(|_| ()).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = reacted {
            let text = format!(
                "Couldn't react with `{}`. Make sure to not type the emoji name, but the actual emoji. \
                 The emoji needs to either be a default Discord emoji or it needs to be in this server.\
                 \n\nError message:\n> {reason}",
                option.emoji
            );
            let e = embed::status(embed::ERROR, "Poll", &text, &tag);
            msg.channel_id
                .edit_message(&ctx.http, sent.id, EditMessage::new().embed(e))
                .await?;
            return Ok(());
        }
    }

    let emojis: Vec<String> = args.options.iter().map(|o| o.emoji.clone()).collect();
    let message_id = MessageId(sent.id.get());
    app.store
        .save_poll(message_id, msg.channel_id.get(), &args.question, &emojis)?;

    let open = poll_embed(
        embed::NEUTRAL,
        &args.question,
        "To vote, react to this message.",
        &footer,
        fields,
    );
    msg.channel_id
        .edit_message(&ctx.http, sent.id, EditMessage::new().embed(open))
        .await?;
    info!(message_id = %message_id, options = emojis.len(), "poll opened");

    if let Some(secs) = app.config.collectors.poll_duration_secs {
        start_tally(app, Arc::clone(&ctx.http), msg.channel_id, sent.id, args, footer, secs)?;
    }
    Ok(())
}

fn start_tally(
    app: &Arc<BotContext>,
    http: Arc<Http>,
    channel_id: ChannelId,
    discord_id: DiscordMessageId,
    args: PollArgs,
    footer: String,
    secs: u64,
) -> Result<()> {
    let message_id = MessageId(discord_id.get());
    let keys: Vec<String> = args.options.iter().map(PollOption::key).collect();
    let allowed = keys.clone();
    let me = Arc::clone(app);

    let spec = CollectorSpec::new(message_id)
        .filter(move |e: &Event| {
            !me.is_self(e.actor_id)
                && matches!(e.kind, EventKind::ReactionAdd | EventKind::ReactionRemove)
                && allowed.contains(&e.payload)
        })
        .absolute_timeout(Duration::from_secs(secs))
        .report_failures_to(app.failures.clone());

    let close = ClosePoll {
        app: Arc::clone(app),
        http,
        channel_id,
        discord_id,
        args,
        footer,
    };
    start(&app.hub, spec, VoteTally::new(keys), CountVotes, close)?;
    Ok(())
}

struct CountVotes;

#[async_trait]
impl CollectHandler<VoteTally> for CountVotes {
    async fn on_collect(&mut self, event: &Event, tally: &mut VoteTally) -> std::result::Result<Flow, HandlerError> {
        tally.apply(event);
        Ok(Flow::Continue)
    }
}

struct ClosePoll {
    app: Arc<BotContext>,
    http: Arc<Http>,
    channel_id: ChannelId,
    discord_id: DiscordMessageId,
    args: PollArgs,
    footer: String,
}

#[async_trait]
impl FinalizeHandler<Vec<OptionCount>> for ClosePoll {
    async fn on_end(
        &mut self,
        counts: Vec<OptionCount>,
        reason: EndReason,
    ) -> std::result::Result<(), HandlerError> {
        let message_id = MessageId(self.discord_id.get());
        let mut steps = FinalizeSteps::new(message_id);

        let store = &self.app.store;
        steps
            .run("persist tally", async {
                store.save_poll_result(message_id, &counts, reason.as_str())
            })
            .await;
        let description = closed_description(steps.has_failures());

        let fields = self.args.options.iter().zip(&counts).map(|(option, count)| {
            (option.heading(), vote_label(count.votes))
        });
        let closed = poll_embed(
            embed::SUCCESS,
            &self.args.question,
            description,
            &self.footer,
            fields,
        );
        steps
            .run(
                "edit poll",
                self.channel_id
                    .edit_message(&self.http, self.discord_id, EditMessage::new().embed(closed)),
            )
            .await;

        info!(message_id = %message_id, reason = %reason, "poll closed");
        steps.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_poll() {
        let args = parse_args("none/Best fruit?/\u{1f34e} - Apple/\u{1f34c}-Banana").unwrap();
        assert_eq!(args.ping, None);
        assert_eq!(args.question, "Best fruit?");
        assert_eq!(args.options.len(), 2);
        assert_eq!(args.options[0].emoji, "\u{1f34e}");
        assert_eq!(args.options[0].text, "Apple");
        assert_eq!(args.options[1].heading(), "\u{1f34c} \u{2014} Banana");
    }

    #[test]
    fn keeps_role_ping() {
        let args = parse_args("<@&42>/Q/a-1/b-2").unwrap();
        assert_eq!(args.ping.as_deref(), Some("<@&42>"));
    }

    #[test]
    fn text_may_contain_dashes() {
        let args = parse_args("none/Q/a-x-y/b-z").unwrap();
        assert_eq!(args.options[0].text, "x-y");
    }

    #[test]
    fn rejects_malformed_polls() {
        assert!(parse_args("").is_err());
        assert!(parse_args("none").is_err());
        assert!(parse_args("none/Q/a-1").is_err());
        assert!(parse_args("none/Q/a-1/no dash").is_err());
        assert!(parse_args("none/Q/a-1/a-2").is_err());
        assert!(parse_args("none/Q/ -1/b-2").is_err());
    }

    #[test]
    fn tally_follows_adds_and_removes() {
        let mut tally = VoteTally::new(vec!["a".into(), "b".into()]);
        tally.apply(&Event::reaction_add(ActorId(1), "a"));
        tally.apply(&Event::reaction_add(ActorId(2), "a"));
        tally.apply(&Event::reaction_add(ActorId(1), "a"));
        tally.apply(&Event::reaction_add(ActorId(1), "b"));
        tally.apply(&Event::reaction_remove(ActorId(2), "a"));
        tally.apply(&Event::reaction_add(ActorId(3), "zzz"));

        assert_eq!(tally.votes("a"), 1);
        assert_eq!(tally.votes("b"), 1);
        assert_eq!(
            tally.finish(),
            vec![
                OptionCount { emoji: "a".into(), votes: 1 },
                OptionCount { emoji: "b".into(), votes: 1 },
            ]
        );
    }

    #[test]
    fn closed_poll_mentions_unsaved_results() {
        assert_eq!(closed_description(false), "This poll has ended.");
        assert!(closed_description(true).contains("could not be saved"));
    }

    #[test]
    fn vote_labels() {
        assert_eq!(vote_label(0), "0 votes");
        assert_eq!(vote_label(1), "1 vote");
        assert_eq!(vote_label(7), "7 votes");
    }
}
