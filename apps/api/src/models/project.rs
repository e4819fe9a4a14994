use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

pub const VISIBILITY_PRIVATE: &str = "private";
pub const VISIBILITY_PUBLIC: &str = "public";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectRow {
    pub project_id: i32,
    pub project_uuid: Uuid,
    pub nom_projet: Option<String>,
    pub description_projet: Option<String>,
    pub visibility: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProjectRow {
    pub fn is_public(&self) -> bool {
        self.visibility == VISIBILITY_PUBLIC
    }
}
