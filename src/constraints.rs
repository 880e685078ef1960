//! Constraint tightening for the owner column. SQLite cannot tighten
//! nullability or add a foreign key in place, so both operations are a
//! shadow-table rebuild: create the tightened shape under a scratch name,
//! copy rows, drop the original, rename. The rebuild re-checks its guard
//! inside the write transaction, so a racer that lost the check-then-act
//! window rolls back to a no-op instead of rebuilding twice.

use sqlx::SqlitePool;
use tracing::info;

use crate::backfill;
use crate::error::{classify_store_error, MigrationError};
use crate::introspect;
use crate::schema::{self, BusinessTable, OwnerShape, OWNER_COLUMN};

/// Tighten the owner column to NOT NULL. Returns `false` when the column was
/// already NOT NULL (or a concurrent run got there first).
pub async fn enforce_not_null(
    pool: &SqlitePool,
    table: &BusinessTable,
) -> Result<bool, MigrationError> {
    match rebuild_owner_column(pool, table, OwnerShape::Required).await {
        Ok(applied) => {
            if applied {
                info!(target: "pennybook", event = "not_null_enforced", table = table.name);
            }
            Ok(applied)
        }
        Err(MigrationError::AlreadyApplied { object }) => {
            info!(target: "pennybook", event = "constraint_race_tolerated", object = %object);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Add the owner foreign key. Returns `false` when it was already present.
pub async fn add_foreign_key(
    pool: &SqlitePool,
    table: &BusinessTable,
    referenced_table: &str,
    referenced_column: &str,
) -> Result<bool, MigrationError> {
    let shape = OwnerShape::RequiredWithFk {
        referenced_table,
        referenced_column,
    };
    match rebuild_owner_column(pool, table, shape).await {
        Ok(applied) => {
            if applied {
                info!(
                    target: "pennybook",
                    event = "foreign_key_added",
                    table = table.name,
                    referenced = referenced_table
                );
            }
            Ok(applied)
        }
        Err(MigrationError::AlreadyApplied { object }) => {
            info!(target: "pennybook", event = "constraint_race_tolerated", object = %object);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

async fn rebuild_owner_column(
    pool: &SqlitePool,
    table: &BusinessTable,
    shape: OwnerShape<'_>,
) -> Result<bool, MigrationError> {
    let shadow = format!("{}_retrofit", table.name);
    let object = format!("{}.{}", table.name, OWNER_COLUMN);

    let mut tx = pool.begin().await.map_err(MigrationError::from)?;

    // Creating the scratch table is the transaction's first statement, so it
    // takes the write lock up front and the guard re-check below reads the
    // latest committed schema rather than a stale snapshot while a
    // concurrent rebuild commits. The scratch name can never survive a
    // committed rebuild (the rename consumes it), so a collision here means
    // a racer owns it and the step degrades to a skip.
    sqlx::query(&schema::rebuild_create_sql(table, &shadow, &shape))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_store_error(e, &object))?;

    let satisfied = match &shape {
        OwnerShape::Nullable => false,
        OwnerShape::Required => {
            introspect::column_is_not_null(&mut *tx, table.name, OWNER_COLUMN).await?
        }
        OwnerShape::RequiredWithFk {
            referenced_table, ..
        } => {
            introspect::foreign_key_exists(&mut *tx, table.name, OWNER_COLUMN, referenced_table)
                .await?
        }
    };
    if satisfied {
        tx.rollback().await.map_err(MigrationError::from)?;
        return Ok(false);
    }

    // Tightening must come strictly after backfill; rows the executor missed
    // would make the copy below fail anyway, so surface them as data.
    let unowned = backfill::remaining_unowned(&mut *tx, table).await?;
    if unowned > 0 {
        return Err(MigrationError::DataIntegrity {
            table: table.name.to_string(),
            detail: format!("{unowned} row(s) still have NULL {OWNER_COLUMN} after backfill"),
        });
    }

    let columns = schema::owned_column_list(table);
    sqlx::query(&format!(
        "INSERT INTO {shadow} ({columns}) SELECT {columns} FROM {}",
        table.name
    ))
    .execute(&mut *tx)
    .await
    .map_err(|e| classify_store_error(e, &object))?;
    sqlx::query(&format!("DROP TABLE {}", table.name))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_store_error(e, &object))?;
    sqlx::query(&format!("ALTER TABLE {shadow} RENAME TO {}", table.name))
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_store_error(e, &object))?;

    tx.commit().await.map_err(MigrationError::from)?;
    Ok(true)
}
