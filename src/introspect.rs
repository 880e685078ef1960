//! Read-only catalog queries. Absence of metadata reads as `false`; a store
//! failure is returned as an error, never folded into the boolean.

use sqlx::{Executor, Sqlite};

use crate::error::MigrationError;

pub async fn table_exists<'e, E>(executor: E, table: &str) -> Result<bool, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?1")
            .bind(table)
            .fetch_optional(executor)
            .await?;
    Ok(row.is_some())
}

pub async fn column_exists<'e, E>(
    executor: E,
    table: &str,
    column: &str,
) -> Result<bool, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table)
            .bind(column)
            .fetch_optional(executor)
            .await?;
    Ok(row.is_some())
}

/// Declared type of a column, e.g. `INTEGER`. `None` when the column (or the
/// whole table) is absent.
pub async fn column_decl_type<'e, E>(
    executor: E,
    table: &str,
    column: &str,
) -> Result<Option<String>, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let decl: Option<String> =
        sqlx::query_scalar("SELECT type FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table)
            .bind(column)
            .fetch_optional(executor)
            .await?;
    Ok(decl)
}

pub async fn column_is_not_null<'e, E>(
    executor: E,
    table: &str,
    column: &str,
) -> Result<bool, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let notnull: Option<i64> =
        sqlx::query_scalar("SELECT \"notnull\" FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table)
            .bind(column)
            .fetch_optional(executor)
            .await?;
    Ok(notnull.unwrap_or(0) != 0)
}

pub async fn foreign_key_exists<'e, E>(
    executor: E,
    table: &str,
    column: &str,
    referenced_table: &str,
) -> Result<bool, MigrationError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM pragma_foreign_key_list(?1) WHERE \"from\" = ?2 AND \"table\" = ?3",
    )
    .bind(table)
    .bind(column)
    .bind(referenced_table)
    .fetch_optional(executor)
    .await?;
    Ok(row.is_some())
}
