use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Asset type for uploaded project files.
pub const ASSET_TYPE_FILE: &str = "file";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssetRow {
    pub asset_id: i32,
    pub asset_uuid: Uuid,
    pub asset_type: String,
    pub asset_name: String,
    pub asset_size: i64,
    pub asset_config: Option<Value>,
    pub asset_project_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}
