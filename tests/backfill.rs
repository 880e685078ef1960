#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use pennybook::schema::BusinessTable;
use pennybook::{backfill, introspect, owner, runner, schema};
use sqlx::SqlitePool;

mod util;

fn income() -> &'static BusinessTable {
    schema::business_table("income").expect("income registered")
}

/// Legacy store with the users table seeded and a nullable owner column on
/// income, i.e. the state just before the backfill step runs.
async fn pre_backfill_pool() -> Result<(SqlitePool, i64)> {
    let pool = util::temp_pool().await;
    schema::ensure_baseline_schema(&pool).await?;
    sqlx::query(schema::CREATE_USERS_SQL).execute(&pool).await?;
    let owner_id =
        owner::ensure_default_owner(&pool, owner::DEFAULT_OWNER_EMAIL, "seed-hash").await?;
    sqlx::query("ALTER TABLE income ADD COLUMN user_id INTEGER")
        .execute(&pool)
        .await?;
    Ok((pool, owner_id))
}

async fn insert_unowned(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO income (id, source, amount_cents, received_on, created_at, updated_at)
         VALUES (?1, 'salary', 250000, '2026-07-01', 0, 0)",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_owned(pool: &SqlitePool, id: &str, user_id: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO income (id, source, amount_cents, received_on, created_at, updated_at, user_id)
         VALUES (?1, 'freelance', 90000, '2026-07-02', 0, 0, ?2)",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn count_owned_by(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM income WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[tokio::test]
async fn backfill_assigns_default_owner_to_every_null_row() -> Result<()> {
    let (pool, owner_id) = pre_backfill_pool().await?;
    for id in ["a", "b", "c"] {
        insert_unowned(&pool, id).await?;
    }

    let updated = backfill::backfill_owner(&pool, income(), owner_id).await?;
    assert_eq!(updated, 3);
    assert_eq!(count_owned_by(&pool, owner_id).await?, 3);
    assert_eq!(backfill::remaining_unowned(&pool, income()).await?, 0);
    Ok(())
}

#[tokio::test]
async fn backfill_leaves_owned_rows_untouched() -> Result<()> {
    let (pool, owner_id) = pre_backfill_pool().await?;
    sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES ('ana@example.com', 'h', 0)")
        .execute(&pool)
        .await?;
    let ana_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = 'ana@example.com'")
        .fetch_one(&pool)
        .await?;

    insert_unowned(&pool, "a").await?;
    insert_unowned(&pool, "b").await?;
    insert_owned(&pool, "c", ana_id).await?;

    let updated = backfill::backfill_owner(&pool, income(), owner_id).await?;
    assert_eq!(updated, 2, "only the null rows are touched");
    assert_eq!(count_owned_by(&pool, owner_id).await?, 2);
    assert_eq!(count_owned_by(&pool, ana_id).await?, 1);
    Ok(())
}

#[tokio::test]
async fn full_pipeline_preserves_existing_ownership() -> Result<()> {
    let (pool, owner_id) = pre_backfill_pool().await?;
    sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES ('ana@example.com', 'h', 0)")
        .execute(&pool)
        .await?;
    let ana_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = 'ana@example.com'")
        .fetch_one(&pool)
        .await?;

    insert_unowned(&pool, "a").await?;
    insert_owned(&pool, "b", ana_id).await?;

    runner::run_ownership_migration(&pool).await?;

    assert!(introspect::column_is_not_null(&pool, "income", schema::OWNER_COLUMN).await?);
    assert_eq!(count_owned_by(&pool, ana_id).await?, 1);
    assert_eq!(count_owned_by(&pool, owner_id).await?, 1);
    Ok(())
}
