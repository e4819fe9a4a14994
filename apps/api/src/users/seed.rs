use anyhow::Result;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::models::user::UserRole;
use crate::users::store::{self, NewUser};

/// Creates the default administrator at startup when none exists yet.
pub async fn ensure_default_admin(pool: &PgPool, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (
        config.default_admin_email.as_deref(),
        config.default_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    if store::admin_exists(pool).await? {
        return Ok(());
    }
    if store::find_by_email(pool, email).await?.is_some() {
        warn!("Default admin email {email} is taken by a non-admin account, skipping seed");
        return Ok(());
    }

    let password_hash = hash_password(password).await?;
    let admin = store::insert(
        pool,
        NewUser {
            first_name: "Admin",
            last_name: "Default",
            email,
            password_hash: &password_hash,
            role: UserRole::Admin,
            email_verified: true,
            verification_token: None,
        },
    )
    .await?;

    info!("Created default admin user {} ({email})", admin.user_id);
    Ok(())
}
