use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use tally_core::{ActorId, MessageId};
use tracing::info;

use crate::{
    db::init_db,
    error::Result,
    types::{OptionCount, PollRecord, PollResult, SelectionRecord},
};

/// Shared handle to the result tables.
///
/// Cloning is cheap; all clones use the same connection.
#[derive(Clone)]
pub struct ResultStore {
    conn: Arc<Mutex<Connection>>,
}

impl ResultStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("result store mutex poisoned")
    }

    /// Record a freshly opened poll. Re-saving the same message overwrites it.
    pub fn save_poll(
        &self,
        message_id: MessageId,
        channel_id: u64,
        question: &str,
        emojis: &[String],
    ) -> Result<PollRecord> {
        let created_at = Utc::now().to_rfc3339();
        let emojis_json = serde_json::to_string(emojis)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO polls (message_id, channel_id, question, emojis, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                message_id.get() as i64,
                channel_id as i64,
                question,
                emojis_json,
                created_at
            ],
        )?;
        info!(message_id = %message_id, options = emojis.len(), "poll saved");
        Ok(PollRecord {
            message_id,
            channel_id,
            question: question.to_string(),
            emojis: emojis.to_vec(),
            created_at,
        })
    }

    pub fn save_poll_result(
        &self,
        message_id: MessageId,
        counts: &[OptionCount],
        reason: &str,
    ) -> Result<PollResult> {
        let closed_at = Utc::now().to_rfc3339();
        let counts_json = serde_json::to_string(counts)?;
        self.lock().execute(
            "INSERT OR REPLACE INTO poll_results (message_id, counts, reason, closed_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![message_id.get() as i64, counts_json, reason, closed_at],
        )?;
        info!(message_id = %message_id, reason, "poll result saved");
        Ok(PollResult {
            message_id,
            counts: counts.to_vec(),
            reason: reason.to_string(),
            closed_at,
        })
    }

    /// Write the `{message, tokens}` outcome of a selection collector.
    pub fn save_selection(
        &self,
        message_id: MessageId,
        actor_id: ActorId,
        tokens: &str,
        reason: &str,
    ) -> Result<SelectionRecord> {
        let created_at = Utc::now().to_rfc3339();
        self.lock().execute(
            "INSERT OR REPLACE INTO selections (message_id, actor_id, tokens, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                message_id.get() as i64,
                actor_id.get() as i64,
                tokens,
                reason,
                created_at
            ],
        )?;
        info!(message_id = %message_id, actor = %actor_id, "selection saved");
        Ok(SelectionRecord {
            message_id,
            actor_id,
            tokens: tokens.to_string(),
            reason: reason.to_string(),
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ResultStore {
        ResultStore::open_in_memory().unwrap()
    }

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    #[test]
    fn poll_row_keeps_option_order() {
        let store = store();
        let emojis = vec!["\u{1f34e}".to_string(), "\u{1f34c}".to_string()];
        let saved = store.save_poll(MessageId(1), 9, "Fruit?", &emojis).unwrap();
        assert_eq!(saved.emojis, emojis);

        let (channel_id, question, stored): (i64, String, String) = store
            .lock()
            .query_row(
                "SELECT channel_id, question, emojis FROM polls WHERE message_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(channel_id, 9);
        assert_eq!(question, "Fruit?");
        assert_eq!(serde_json::from_str::<Vec<String>>(&stored).unwrap(), emojis);
    }

    #[test]
    fn poll_result_overwrites() {
        let store = store();
        let first = [OptionCount { emoji: "a".into(), votes: 1 }];
        let second = [OptionCount { emoji: "a".into(), votes: 3 }];
        store.save_poll_result(MessageId(1), &first, "absolute_timeout").unwrap();
        store.save_poll_result(MessageId(1), &second, "stopped").unwrap();

        let (counts, reason): (String, String) = store
            .lock()
            .query_row(
                "SELECT counts, reason FROM poll_results WHERE message_id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        let counts: Vec<OptionCount> = serde_json::from_str(&counts).unwrap();
        assert_eq!(counts[0].votes, 3);
        assert_eq!(reason, "stopped");
    }

    #[test]
    fn selection_overwrites_per_message() {
        let store = store();
        store.save_selection(MessageId(1), ActorId(5), "A-B", "stopped").unwrap();
        store.save_selection(MessageId(1), ActorId(5), "C", "absolute_timeout").unwrap();
        store.save_selection(MessageId(2), ActorId(6), "D", "stopped").unwrap();

        let rows: i64 = store
            .lock()
            .query_row("SELECT COUNT(*) FROM selections", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
        let tokens: String = store
            .lock()
            .query_row(
                "SELECT tokens FROM selections WHERE message_id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tokens, "C");
    }

    #[test]
    fn large_snowflakes_survive() {
        let store = store();
        let id = MessageId(1_130_000_000_000_000_000);
        let actor = ActorId(722_738_307_477_536_778);
        store.save_selection(id, actor, "x", "stopped").unwrap();
        let stored: i64 = store
            .lock()
            .query_row(
                "SELECT message_id FROM selections WHERE actor_id = ?1",
                [actor.get() as i64],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(MessageId(stored as u64), id);
    }
}
