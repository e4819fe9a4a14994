use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageRow {
    pub message_id: i32,
    pub message_content: String,
    pub message_sender: Option<String>,
    pub message_conversation_id: i32,
    pub message_user_id: i32,
}
