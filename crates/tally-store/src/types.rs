use serde::{Deserialize, Serialize};
use tally_core::{ActorId, MessageId};

/// A poll as it was opened: its message and option emojis in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRecord {
    pub message_id: MessageId,
    pub channel_id: u64,
    pub question: String,
    pub emojis: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    pub emoji: String,
    pub votes: u32,
}

/// Final tally written when a poll collector ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    pub message_id: MessageId,
    pub counts: Vec<OptionCount>,
    pub reason: String,
    pub closed_at: String,
}

/// The flags a member confirmed for their prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub message_id: MessageId,
    pub actor_id: ActorId,
    pub tokens: String,
    pub reason: String,
    pub created_at: String,
}
