use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::CreateInteractionResponse;
use serenity::model::application::{ComponentInteraction, Interaction};
use serenity::model::channel::{Message, Reaction, ReactionType};
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tally_collector::{Event, InboundEvent};
use tally_core::{ActorId, MessageId};
use tracing::{info, trace, warn};

use crate::context::BotContext;

/// Serenity event handler: feeds the event hub and dispatches commands.
pub struct DiscordHandler {
    pub app: Arc<BotContext>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.app.bot_id.set(ActorId(ready.user.id.get())).ok();
        info!(name = %ready.user.name, "Discord bot connected");

        if self.app.config.discord.slash_commands {
            crate::commands::register_commands(&ctx, None).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        crate::commands::dispatch_message(&self.app, ctx, msg).await;
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        if let Some(inbound) = reaction_event(&reaction, true) {
            self.publish(inbound);
        }
    }

    async fn reaction_remove(&self, _ctx: Context, reaction: Reaction) {
        if let Some(inbound) = reaction_event(&reaction, false) {
            self.publish(inbound);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) => {
                // Acknowledge first: collectors edit the message themselves.
                if let Err(e) = component
                    .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                    .await
                {
                    warn!(error = %e, "failed to acknowledge component interaction");
                }
                self.publish(button_event(&component));
            }
            Interaction::Command(command) if self.app.config.discord.slash_commands => {
                crate::commands::handle_interaction(&self.app, &ctx, command).await;
            }
            _ => {}
        }
    }
}

impl DiscordHandler {
    fn publish(&self, inbound: InboundEvent) {
        let message_id = inbound.source_message_id;
        if !self.app.hub.publish(inbound) {
            trace!(message_id = %message_id, "no collector on message, event dropped");
        }
    }
}

/// Collector key of a reaction emoji: the unicode text, or the custom emoji's
/// name (its id when the name is unavailable).
pub fn emoji_key(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Unicode(s) => s.clone(),
        ReactionType::Custom { id, name, .. } => name.clone().unwrap_or_else(|| id.to_string()),
        _ => String::new(),
    }
}

fn reaction_event(reaction: &Reaction, added: bool) -> Option<InboundEvent> {
    let actor = ActorId(reaction.user_id?.get());
    let key = emoji_key(&reaction.emoji);
    if key.is_empty() {
        return None;
    }
    let event = if added {
        Event::reaction_add(actor, key)
    } else {
        Event::reaction_remove(actor, key)
    };
    Some(InboundEvent::new(MessageId(reaction.message_id.get()), event))
}

fn button_event(component: &ComponentInteraction) -> InboundEvent {
    InboundEvent::new(
        MessageId(component.message.id.get()),
        Event::button(
            ActorId(component.user.id.get()),
            component.data.custom_id.clone(),
        ),
    )
}
