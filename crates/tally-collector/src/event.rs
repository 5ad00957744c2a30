use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{ActorId, MessageId};

/// What the user did on the target message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ReactionAdd,
    ReactionRemove,
    ButtonClick,
}

/// A user-generated event as seen by a collector. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub actor_id: ActorId,
    pub kind: EventKind,
    /// Emoji code for reactions, control id for buttons.
    pub payload: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(actor_id: ActorId, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            actor_id,
            kind,
            payload: payload.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn reaction_add(actor_id: ActorId, emoji: impl Into<String>) -> Self {
        Self::new(actor_id, EventKind::ReactionAdd, emoji)
    }

    pub fn reaction_remove(actor_id: ActorId, emoji: impl Into<String>) -> Self {
        Self::new(actor_id, EventKind::ReactionRemove, emoji)
    }

    pub fn button(actor_id: ActorId, control_id: impl Into<String>) -> Self {
        Self::new(actor_id, EventKind::ButtonClick, control_id)
    }
}

/// An event as delivered by the platform gateway, still carrying its routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub source_message_id: MessageId,
    pub event: Event,
}

impl InboundEvent {
    pub fn new(source_message_id: MessageId, event: Event) -> Self {
        Self {
            source_message_id,
            event,
        }
    }
}

/// Why a collector stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Stopped,
    IdleTimeout,
    AbsoluteTimeout,
    MaxEvents,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EndReason::Stopped => "stopped",
            EndReason::IdleTimeout => "idle_timeout",
            EndReason::AbsoluteTimeout => "absolute_timeout",
            EndReason::MaxEvents => "max_events",
        }
    }

    /// True for the two timer-driven endings.
    pub fn is_timeout(self) -> bool {
        matches!(self, EndReason::IdleTimeout | EndReason::AbsoluteTimeout)
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Ended,
}

/// Returned by `on_collect`: keep listening or end with [`EndReason::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
}

/// Which callback a reported failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Collect,
    Finalize,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Collect => "collect",
            Phase::Finalize => "finalize",
        }
    }
}

/// A caught [`HandlerError`](crate::HandlerError), forwarded to the caller's
/// error channel.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    pub message_id: MessageId,
    pub phase: Phase,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_reason_names() {
        assert_eq!(EndReason::IdleTimeout.to_string(), "idle_timeout");
        assert!(EndReason::AbsoluteTimeout.is_timeout());
        assert!(!EndReason::MaxEvents.is_timeout());
    }

    #[test]
    fn constructors_set_kind() {
        let e = Event::button(ActorId(1), "next");
        assert_eq!(e.kind, EventKind::ButtonClick);
        assert_eq!(e.payload, "next");
        assert_eq!(Event::reaction_remove(ActorId(1), "x").kind, EventKind::ReactionRemove);
    }
}
