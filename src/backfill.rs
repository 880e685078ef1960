//! Bulk ownership backfill: one set-based update per table, touching only
//! rows whose owner column is still NULL.

use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;

use crate::error::MigrationError;
use crate::schema::{BusinessTable, OWNER_COLUMN};

/// Assign `owner_id` to every unowned row. Rows that already carry an owner
/// are left untouched. Returns the number of rows updated.
pub async fn backfill_owner(
    pool: &SqlitePool,
    table: &BusinessTable,
    owner_id: i64,
) -> Result<u64, MigrationError> {
    let sql = format!(
        "UPDATE {t} SET {c} = ?1 WHERE {c} IS NULL",
        t = table.name,
        c = OWNER_COLUMN
    );
    let result = sqlx::query(&sql).bind(owner_id).execute(pool).await?;
    info!(
        target: "pennybook",
        event = "backfill_applied",
        table = table.name,
        rows = result.rows_affected()
    );
    Ok(result.rows_affected())
}

/// Rows whose owner column is still NULL.
pub async fn remaining_unowned<'e, E>(
    executor: E,
    table: &BusinessTable,
) -> Result<i64, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {t} WHERE {c} IS NULL",
        t = table.name,
        c = OWNER_COLUMN
    ))
    .fetch_one(executor)
    .await?;
    Ok(count)
}
