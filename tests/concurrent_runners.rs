#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use pennybook::{backfill, db, runner, schema, verify};
use tempfile::tempdir;

#[tokio::test]
async fn concurrent_runners_converge_to_one_schema() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("racing.sqlite");

    // Seed a legacy single-tenant store with unowned rows.
    let pool_a = db::open_file_pool(&db_path, true).await?;
    schema::ensure_baseline_schema(&pool_a).await?;
    for id in ["a", "b", "c"] {
        sqlx::query(
            "INSERT INTO income (id, source, amount_cents, received_on, created_at, updated_at)
             VALUES (?1, 'salary', 100000, '2026-06-01', 0, 0)",
        )
        .bind(id)
        .execute(&pool_a)
        .await?;
    }
    sqlx::query(
        "INSERT INTO bills (id, payee, amount_cents, due_on, created_at, updated_at)
         VALUES ('b1', 'electric', 4200, '2026-08-01', 0, 0)",
    )
    .execute(&pool_a)
    .await?;

    let pool_b = db::open_file_pool(&db_path, true).await?;

    let (first, second) = tokio::join!(
        runner::run_ownership_migration(&pool_a),
        runner::run_ownership_migration(&pool_b),
    );
    first.expect("first runner must converge without unrecoverable error");
    second.expect("second runner must converge without unrecoverable error");

    let findings = verify::audit_ownership_schema(&pool_a).await?;
    assert!(
        verify::discrepancies(&findings).is_empty(),
        "both runners must leave the target schema in place"
    );

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool_a)
        .await?;
    assert_eq!(users, 1, "racing upserts must not duplicate the owner");

    for table in schema::BUSINESS_TABLES {
        let fk_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_foreign_key_list(?1)")
                .bind(table.name)
                .fetch_one(&pool_a)
                .await?;
        assert_eq!(fk_count, 1, "no duplicate constraints on {}", table.name);
        assert_eq!(backfill::remaining_unowned(&pool_a, table).await?, 0);
    }

    let fk_rows = sqlx::query("PRAGMA foreign_key_check;")
        .fetch_all(&pool_a)
        .await?;
    assert!(fk_rows.is_empty());
    Ok(())
}
