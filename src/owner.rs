//! The default/system owner: the account pre-existing rows are assigned to.

use sha2::{Digest, Sha256};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::MigrationError;
use crate::time::now_ms;

pub const DEFAULT_OWNER_EMAIL: &str = "system@pennybook.local";

/// Hash of a throwaway random secret. The system account is never logged
/// into; it only needs a credential column that satisfies the schema.
pub fn seeded_credential() -> String {
    let seed = Uuid::new_v4();
    format!("{:x}", Sha256::digest(seed.as_bytes()))
}

/// Upsert keyed on the unique email. Identity (id, email) is stable across
/// reruns; the stored credential is refreshed to the supplied value.
pub async fn ensure_default_owner(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
) -> Result<i64, MigrationError> {
    sqlx::query(
        "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)\
         ON CONFLICT(email) DO UPDATE SET password_hash = excluded.password_hash",
    )
    .bind(email)
    .bind(password_hash)
    .bind(now_ms())
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = ?1")
        .bind(email)
        .fetch_one(pool)
        .await?;

    info!(target: "pennybook", event = "default_owner_ensured", id = id);
    Ok(id)
}

/// Id of the default owner, `None` when it has not been seeded yet.
pub async fn default_owner_id<'e, E>(executor: E) -> Result<Option<i64>, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?1")
        .bind(DEFAULT_OWNER_EMAIL)
        .fetch_optional(executor)
        .await?;
    Ok(id)
}
