use crate::Database;
use crate::models::{ConversationRow, MessageRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Conversations --

    /// Returns the conversation for the unordered pair, inserting it if absent.
    /// The flag is `true` when a row was inserted.
    pub fn find_or_create_conversation(
        &self,
        a: i64,
        b: i64,
        now: &str,
    ) -> Result<(ConversationRow, bool)> {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let existing = query_conversation_by_pair(&tx, low, high)?;
            if let Some(row) = existing {
                return Ok((row, false));
            }

            tx.execute(
                "INSERT INTO conversations (participant_a, participant_b, pair_low, pair_high, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![a, b, low, high, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok((
                ConversationRow {
                    id,
                    participant_a: a,
                    participant_b: b,
                    last_message_at: now.to_string(),
                },
                true,
            ))
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation_by_id(conn, id))
    }

    pub fn get_conversations_for_user(&self, user: i64) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, participant_a, participant_b, last_message_at
                 FROM conversations
                 WHERE participant_a = ?1 OR participant_b = ?1
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([user], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_conversation(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM conversations WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Messages --

    pub fn get_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, conversation_id))
    }

    /// Inserts a message and bumps the conversation's `last_message_at`.
    /// Returns `None` if the conversation does not exist.
    /// `created_at` is raised to the previous message's timestamp if the clock went backwards.
    /// Timestamps must share one fixed-width RFC 3339 format so text order is time order.
    pub fn insert_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        text: &str,
        created_at: &str,
    ) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            if query_conversation_by_id(&tx, conversation_id)?.is_none() {
                return Ok(None);
            }

            let last: Option<String> = tx
                .query_row(
                    "SELECT created_at FROM messages WHERE conversation_id = ?1 ORDER BY seq DESC LIMIT 1",
                    [conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            let created_at = match last {
                Some(last) if last.as_str() > created_at => last,
                _ => created_at.to_string(),
            };

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![conversation_id, sender_id, text, created_at],
            )?;
            let seq = tx.last_insert_rowid();
            let id = format!("msg{}", seq);
            tx.execute("UPDATE messages SET id = ?1 WHERE seq = ?2", rusqlite::params![id, seq])?;
            tx.execute(
                "UPDATE conversations SET last_message_at = ?1 WHERE id = ?2",
                rusqlite::params![created_at, conversation_id],
            )?;
            tx.commit()?;

            Ok(Some(MessageRow {
                id,
                conversation_id,
                sender_id,
                text: text.to_string(),
                created_at,
                is_read: false,
            }))
        })
    }

    /// Marks every unread message not sent by `reader` as read. Returns the flipped ids.
    pub fn mark_read_for(&self, conversation_id: i64, reader: i64) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM messages
                     WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0
                     ORDER BY seq",
                )?;
                let ids = stmt
                    .query_map([conversation_id, reader], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };
            tx.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                [conversation_id, reader],
            )?;
            tx.commit()?;
            Ok(ids)
        })
    }

    pub fn mark_message_read(&self, conversation_id: i64, message_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE messages SET is_read = 1 WHERE conversation_id = ?1 AND id = ?2 AND is_read = 0",
                rusqlite::params![conversation_id, message_id],
            )?;
            Ok(updated > 0)
        })
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        participant_a: row.get(1)?,
        participant_b: row.get(2)?,
        last_message_at: row.get(3)?,
    })
}

fn query_conversation_by_id(conn: &Connection, id: i64) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, participant_a, participant_b, last_message_at FROM conversations WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], conversation_from_row).optional()?;
    Ok(row)
}

fn query_conversation_by_pair(
    conn: &Connection,
    low: i64,
    high: i64,
) -> Result<Option<ConversationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, participant_a, participant_b, last_message_at
         FROM conversations WHERE pair_low = ?1 AND pair_high = ?2",
    )?;
    let row = stmt.query_row([low, high], conversation_from_row).optional()?;
    Ok(row)
}

fn query_messages(conn: &Connection, conversation_id: i64) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, text, created_at, is_read
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY seq",
    )?;

    let rows = stmt
        .query_map([conversation_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sender_id: row.get(2)?,
                text: row.get(3)?,
                created_at: row.get(4)?,
                is_read: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
