use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationRow {
    pub conversation_id: i32,
    pub conversation_title: String,
    pub conversation_description: Option<String>,
    pub conversation_project_id: i32,
    pub conversation_user_id: i32,
}
