use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_a    INTEGER NOT NULL,
            participant_b    INTEGER NOT NULL,
            pair_low         INTEGER NOT NULL,
            pair_high        INTEGER NOT NULL,
            last_message_at  TEXT NOT NULL,
            UNIQUE(pair_low, pair_high)
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_a ON conversations(participant_a);
        CREATE INDEX IF NOT EXISTS idx_conversations_b ON conversations(participant_b);

        CREATE TABLE IF NOT EXISTS messages (
            seq              INTEGER PRIMARY KEY AUTOINCREMENT,
            id               TEXT UNIQUE,
            conversation_id  INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            sender_id        INTEGER NOT NULL,
            text             TEXT NOT NULL,
            created_at       TEXT NOT NULL,
            is_read          INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, seq);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
