// Raw SQLite rows. Timestamps stay RFC 3339 text until the store converts them.

pub struct ConversationRow {
    pub id: i64,
    pub participant_a: i64,
    pub participant_b: i64,
    pub last_message_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub created_at: String,
    pub is_read: bool,
}
