use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    User,
    Moderator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
            UserRole::Moderator => "MODERATOR",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    /// Accepts `ADMIN` / `admin` and friends.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            "MODERATOR" => Ok(UserRole::Moderator),
            other => Err(format!("unknown user role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub user_role: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub password_reset_expires: Option<DateTime<Utc>>,
}

impl UserRow {
    /// Rows are constrained by a CHECK, so an unknown value means a manual edit.
    pub fn role(&self) -> UserRole {
        self.user_role.parse().unwrap_or(UserRole::User)
    }
}

/// Public view of a user. Never exposes hashes or tokens.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub user_role: UserRole,
}

impl From<UserRow> for UserView {
    fn from(row: UserRow) -> Self {
        UserView {
            user_role: row.role(),
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
        }
    }
}
