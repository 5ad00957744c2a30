use rusqlite::Connection;

use crate::error::Result;

/// Initialise the result tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS polls (
            message_id  INTEGER NOT NULL PRIMARY KEY,
            channel_id  INTEGER NOT NULL,
            question    TEXT    NOT NULL,
            emojis      TEXT    NOT NULL,   -- JSON array, option order
            created_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS poll_results (
            message_id  INTEGER NOT NULL PRIMARY KEY,
            counts      TEXT    NOT NULL,   -- JSON array of {emoji, votes}
            reason      TEXT    NOT NULL,
            closed_at   TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS selections (
            message_id  INTEGER NOT NULL PRIMARY KEY,
            actor_id    INTEGER NOT NULL,
            tokens      TEXT    NOT NULL,   -- joined in choice order
            reason      TEXT    NOT NULL,
            created_at  TEXT    NOT NULL
        );
        ",
    )?;
    Ok(())
}
