use serde_json::Value;

/// A chunk ready to be inserted; ids and timestamps come from the database.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub text: String,
    pub metadata: Value,
    pub order: i32,
    pub project_id: i32,
    pub asset_id: i32,
}
